use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};
use tokio_util::sync::CancellationToken;

/// Budget for each individual echo request (one second per request).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Echo requests sent per host unless overridden.
pub const DEFAULT_PROBE_COUNT: u16 = 5;

/// Resolve a host string to an IP address. IP literals parse directly;
/// anything else goes through DNS and the first returned address wins.
pub async fn resolve_host(host: &str) -> Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = tokio::net::lookup_host(format!("{host}:0"))
        .await
        .with_context(|| format!("failed to resolve host: {host}"))?;
    addrs
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| anyhow::anyhow!("no addresses found for host: {host}"))
}

/// Run one ICMP probe session against `host`.
///
/// Sends up to `count` echo requests, each with its own `timeout` budget,
/// and returns `Ok(true)` as soon as the first reply arrives — remaining
/// requests are skipped. A request that times out is not an error;
/// `Ok(false)` means the session completed (or was cancelled) without a
/// single reply. Transport-level failures (resolution, ICMP socket
/// construction, send) surface as `Err` and are the caller's to log.
///
/// Requires raw-socket or unprivileged-ICMP capability from the OS.
pub async fn probe_host(
    host: &str,
    count: u16,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<bool> {
    let ip = resolve_host(host).await?;

    let config = match ip {
        IpAddr::V4(_) => Config::default(),
        IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
    };
    let client = Client::new(&config)
        .with_context(|| format!("failed to create ICMP client for {host}"))?;

    let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
    pinger.timeout(timeout);

    for seq in 0..count {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let attempt = tokio::select! {
            _ = cancel.cancelled() => return Ok(false),
            res = pinger.ping(PingSequence(seq), &[]) => res,
        };
        match attempt {
            Ok(_) => return Ok(true),
            // No reply within budget; move on to the next sequence number.
            Err(SurgeError::Timeout { .. }) => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("icmp exchange with {host} failed"))
            }
        }
    }

    Ok(false)
}
