use std::path::PathBuf;
use std::time::Duration;

use fleetcheck::checker::{self, CheckOptions};
use fleetcheck::hosts;
use fleetcheck::types::CheckSummary;
use std::fs::File;

use anyhow::Result;
use clap::Parser;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Delay between passes in `--loop` mode.
const LOOP_INTERVAL: Duration = Duration::from_secs(10);

/// fleetcheck — answer "is anything in this host pool up?" over ICMP.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fleetcheck",
    version,
    about = "Concurrent ICMP liveness check: is at least one host in the pool up?",
    long_about = None
)]
struct Cli {
    /// Comma-separated list of hosts to ping (e.g., host1,host2).
    #[arg(long)]
    servers: Option<String>,

    /// Single host to ping; may be repeated.
    #[arg(long = "server")]
    server: Vec<String>,

    /// Echo requests to send per host.
    #[arg(long, default_value_t = 5)]
    count: u16,

    /// Budget per echo request in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    timeout_ms: u64,

    /// Re-run the whole check every 10 seconds until interrupted.
    #[arg(long = "loop", default_value_t = false)]
    loop_mode: bool,

    /// Write the aggregate result as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fleetcheck=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut fleet = Vec::new();
    if let Some(list) = cli.servers.as_deref() {
        fleet.extend(hosts::parse_host_list(list));
    }
    fleet.extend(hosts::normalize_hosts(&cli.server));

    // Nothing left to probe after normalization is a usage error, not a
    // "false" result.
    if fleet.is_empty() {
        eprintln!("Usage: fleetcheck --servers=host1,host2,... [--server HOST]...");
        std::process::exit(1);
    }

    let opts = CheckOptions {
        count: cli.count,
        per_probe_timeout: Duration::from_millis(cli.timeout_ms),
        ..CheckOptions::default()
    };

    // Ctrl-C stops in-flight probes cooperatively and ends loop mode.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    println!("Checking {} hosts...", fleet.len());

    loop {
        let start = Instant::now();
        let any_up = checker::check_fleet_with(&fleet, opts.clone(), cancel.child_token()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        println!("Any successful pings: {any_up}");

        if let Some(path) = cli.output.as_deref() {
            let summary = CheckSummary::new(fleet.len(), any_up, duration_ms);
            if let Err(e) = write_summary_json(path, &summary) {
                eprintln!("Failed to write JSON to {}: {}", path.display(), e);
            } else {
                println!("Wrote JSON summary to {}", path.display());
            }
        }

        if !cli.loop_mode || cancel.is_cancelled() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(LOOP_INTERVAL) => {}
        }
    }

    Ok(())
}

fn write_summary_json(path: &std::path::Path, summary: &CheckSummary) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
