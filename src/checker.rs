use crate::hosts::normalize_hosts;
use crate::prober::{self, DEFAULT_PROBE_COUNT, DEFAULT_PROBE_TIMEOUT};
use crate::types::ProbeOutcome;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Tuning knobs for one fleet check.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Echo requests per host.
    pub count: u16,
    /// Budget for each individual echo request.
    pub per_probe_timeout: Duration,
    /// Cap on concurrently running probe sessions.
    pub concurrency: usize,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_PROBE_COUNT,
            per_probe_timeout: DEFAULT_PROBE_TIMEOUT,
            concurrency: 128,
        }
    }
}

/// Check a fleet with default options and no external cancellation.
pub async fn check_fleet(hosts: &[String]) -> bool {
    check_fleet_with(hosts, CheckOptions::default(), CancellationToken::new()).await
}

/// Check whether at least one host in `hosts` answers ICMP echo.
///
/// Blank and whitespace-only entries are skipped; duplicates are probed
/// independently. Returns `true` the moment any probe reports a reply,
/// cancelling the probes still in flight, and `false` once every probe
/// has finished without one. A list that is empty after normalization is
/// `false` without any probing. Cancelling `cancel` aborts the whole
/// check cooperatively.
pub async fn check_fleet_with(
    hosts: &[String],
    opts: CheckOptions,
    cancel: CancellationToken,
) -> bool {
    let count = opts.count;
    let timeout = opts.per_probe_timeout;
    check_fleet_inner(hosts, opts.concurrency, cancel, move |host, cancel| {
        async move { prober::probe_host(&host, count, timeout, cancel).await }
    })
    .await
}

/// Engine shared by the public entry points and the tests: fan out one
/// task per host, funnel exactly one outcome per task through a channel
/// sized to hold all of them, and short-circuit on the first success.
async fn check_fleet_inner<P, F>(
    hosts: &[String],
    concurrency: usize,
    cancel: CancellationToken,
    probe: P,
) -> bool
where
    P: Fn(String, CancellationToken) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    let fleet = normalize_hosts(hosts);
    if fleet.is_empty() {
        return false;
    }

    // Child token: the early-success cancel below must not fire the
    // caller's token, while the caller's Ctrl-C still reaches every probe.
    let cancel = cancel.child_token();

    // Capacity equal to the number of launched probes is the load-bearing
    // sizing: after an early return the consumer is gone, and producers
    // must still be able to part with their outcome without blocking.
    let (tx, mut rx) = mpsc::channel::<ProbeOutcome>(fleet.len());
    let sem = Arc::new(Semaphore::new(concurrency.clamp(1, 1024)));

    for host in fleet {
        let tx = tx.clone();
        let sem = sem.clone();
        let cancel = cancel.clone();
        let probe = probe.clone();
        tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore in scope");
            let success = match probe(host.clone(), cancel.child_token()).await {
                Ok(got_reply) => got_reply,
                Err(e) => {
                    // Transport trouble must never pass for liveness.
                    tracing::warn!(host = %host, error = %e, "probe failed");
                    false
                }
            };
            // Send fails only when the consumer already returned early.
            let _ = tx.send(ProbeOutcome { host, success }).await;
        });
    }
    // The spawned tasks hold the remaining senders; when the last one
    // finishes, the channel closes and the loop below terminates even
    // when no success ever arrives.
    drop(tx);

    while let Some(outcome) = rx.recv().await {
        if outcome.success {
            tracing::debug!(host = %outcome.host, "got reply, short-circuiting");
            cancel.cancel();
            return true;
        }
        tracing::debug!(host = %outcome.host, "no reply");
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::{sleep, Instant};

    fn fleet(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_list_is_false_without_probing() {
        let launched = Arc::new(AtomicUsize::new(0));
        let counter = launched.clone();
        let raw: Vec<String> = Vec::new();
        let up = check_fleet_inner(&raw, 8, CancellationToken::new(), move |_host, _cancel| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(false)
            }
        })
        .await;
        assert!(!up);
        assert_eq!(launched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_entries_are_never_probed() {
        let launched = Arc::new(AtomicUsize::new(0));
        let counter = launched.clone();
        let raw = fleet(&["", "   ", "10.0.0.1", " 10.0.0.2 "]);
        let up = check_fleet_inner(&raw, 8, CancellationToken::new(), move |_host, _cancel| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(false)
            }
        })
        .await;
        assert!(!up);
        // One outcome per launched prober, all of them consumed.
        assert_eq!(launched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn duplicates_are_probed_independently() {
        let launched = Arc::new(AtomicUsize::new(0));
        let counter = launched.clone();
        let raw = fleet(&["twin", "twin"]);
        let up = check_fleet_inner(&raw, 8, CancellationToken::new(), move |_host, _cancel| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(false)
            }
        })
        .await;
        assert!(!up);
        assert_eq!(launched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_success_wins_over_slow_failures() {
        let raw = fleet(&["fast", "slow"]);
        let up = check_fleet_inner(&raw, 8, CancellationToken::new(), |host, _cancel| {
            async move {
                if host == "fast" {
                    anyhow::Ok(true)
                } else {
                    sleep(Duration::from_secs(30)).await;
                    anyhow::Ok(false)
                }
            }
        })
        .await;
        assert!(up);
    }

    #[tokio::test]
    async fn probe_errors_downgrade_to_non_success() {
        let raw = fleet(&["broken", "down"]);
        let up = check_fleet_inner(&raw, 8, CancellationToken::new(), |host, _cancel| {
            async move {
                if host == "broken" {
                    Err(anyhow::anyhow!("raw socket: permission denied"))
                } else {
                    Ok(false)
                }
            }
        })
        .await;
        assert!(!up);
    }

    #[tokio::test]
    async fn early_success_cancels_probes_in_flight() {
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let flag = saw_cancel.clone();
        let raw = fleet(&["up", "stuck"]);
        let up = check_fleet_inner(&raw, 8, CancellationToken::new(), move |host, cancel| {
            let flag = flag.clone();
            async move {
                if host == "up" {
                    sleep(Duration::from_millis(10)).await;
                    return anyhow::Ok(true);
                }
                cancel.cancelled().await;
                flag.store(true, Ordering::SeqCst);
                Ok(false)
            }
        })
        .await;
        assert!(up);
        // The straggler should observe the cancel shortly after the
        // early return, not run out a full probe budget.
        for _ in 0..100 {
            if saw_cancel.load(Ordering::SeqCst) {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("in-flight probe never observed the cancellation");
    }

    #[tokio::test]
    async fn external_cancel_ends_the_check() {
        let cancel = CancellationToken::new();
        let outer = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            outer.cancel();
        });
        let raw = fleet(&["a", "b", "c"]);
        let up = check_fleet_inner(&raw, 8, cancel, |_host, cancel| {
            async move {
                cancel.cancelled().await;
                anyhow::Ok(false)
            }
        })
        .await;
        assert!(!up);
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_bounded_by_slowest_probe_not_sum() {
        let raw: Vec<String> = (0..16).map(|i| format!("10.0.0.{i}")).collect();
        let start = Instant::now();
        let up = check_fleet_inner(&raw, 64, CancellationToken::new(), |_host, _cancel| {
            async {
                sleep(Duration::from_secs(5)).await;
                anyhow::Ok(false)
            }
        })
        .await;
        assert!(!up);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(
            elapsed < Duration::from_secs(10),
            "probes ran sequentially: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn public_entry_point_handles_empty_fleet() {
        assert!(!check_fleet(&[]).await);
    }
}
