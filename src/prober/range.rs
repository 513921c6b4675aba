//! Port-range scanning with a fixed-size worker pool.
//!
//! Workers pull `(offset, port)` items from a bounded queue and feed an
//! offset-tagged result channel, so completion order never affects the
//! ordering of the exported per-port slots.

use crate::error::ProbeError;
use crate::prober::Prober;
use crate::types::{ErrorKind, PortRangeResult, Protocol, Target};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl Prober {
    /// Scan every port in `[start_port, end_port]` (inclusive, swapped if
    /// inverted) on one host with `worker_count` concurrent workers.
    ///
    /// A failing port never aborts the scan; its error lands in the result's
    /// `errors` list. Cancellation short-circuits the remaining queue:
    /// ports never probed keep a `None` slot, probes interrupted mid-retry
    /// keep their partial result but count as neither open nor closed, and
    /// only then is `success_count + failure_count < total_ports`.
    pub async fn scan_range(
        &self,
        cancel: &CancellationToken,
        host: &str,
        start_port: u16,
        end_port: u16,
        protocol: Protocol,
    ) -> PortRangeResult {
        let (start_port, end_port) = if start_port <= end_port {
            (start_port, end_port)
        } else {
            (end_port, start_port)
        };
        // usize math: a 0-65535 scan overflows u16.
        let total_ports = end_port as usize - start_port as usize + 1;
        let started = Instant::now();

        info!(
            host,
            start_port, end_port, total_ports, protocol = %protocol,
            workers = self.policy.worker_count,
            "starting range scan"
        );

        // Bounded work queue; workers share the receiving end.
        let (work_tx, work_rx) = mpsc::channel::<(usize, u16)>(self.policy.worker_count.max(1));
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) =
            mpsc::channel::<(usize, Result<crate::types::ConnectionResult, ProbeError>)>(
                self.policy.worker_count.max(1),
            );

        let producer = {
            let cancel = cancel.clone();
            async move {
                for (offset, port) in (start_port..=end_port).enumerate() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if work_tx.send((offset, port)).await.is_err() {
                        break;
                    }
                }
                // Closing the queue lets idle workers drain out.
            }
        };

        // Materialized up front so every worker holds its own sender clone
        // before the original is dropped below.
        let workers: Vec<_> = (0..self.policy.worker_count)
            .map(|_| {
                let work_rx = Arc::clone(&work_rx);
                let result_tx = result_tx.clone();
                let cancel = cancel.clone();
                async move {
                    loop {
                        let item = { work_rx.lock().await.recv().await };
                        let Some((offset, port)) = item else { break };
                        if cancel.is_cancelled() {
                            break;
                        }
                        let target = Target::with_protocol(host, port, protocol);
                        let outcome = self.probe(&cancel, &target).await;
                        if result_tx.send((offset, outcome)).await.is_err() {
                            break;
                        }
                    }
                }
            })
            .collect();
        // Workers hold the remaining clones; the collector stops once the
        // last worker exits.
        drop(result_tx);

        let collector = async {
            let mut per_port: Vec<Option<crate::types::ConnectionResult>> = vec![None; total_ports];
            let mut open_ports = Vec::new();
            let mut closed_ports = Vec::new();
            let mut errors = Vec::new();
            while let Some((offset, outcome)) = result_rx.recv().await {
                let port = start_port + offset as u16;
                match outcome {
                    Ok(result) => {
                        if result.error_kind == Some(ErrorKind::Cancelled) {
                            // Interrupted mid-retry: counts as neither open
                            // nor closed.
                            errors.push(format!("port {}: cancelled mid-probe", port));
                        } else if result.open {
                            open_ports.push(port);
                        } else {
                            closed_ports.push(port);
                        }
                        per_port[offset] = Some(result);
                    }
                    Err(e) => errors.push(format!("port {}: {}", port, e)),
                }
            }
            (per_port, open_ports, closed_ports, errors)
        };

        let ((), _, (per_port, open_ports, closed_ports, errors)) =
            tokio::join!(producer, join_all(workers), collector);

        let success_count = open_ports.len();
        let failure_count = closed_ports.len();
        let duration = started.elapsed();
        debug!(
            host,
            open = success_count,
            closed = failure_count,
            errors = errors.len(),
            elapsed = ?duration,
            "range scan finished"
        );

        PortRangeResult {
            host: host.to_string(),
            start_port,
            end_port,
            protocol,
            ip_version: protocol.pinned_version(),
            total_ports,
            open_ports,
            closed_ports,
            success_count,
            failure_count,
            duration,
            per_port,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RetryPolicy;
    use std::time::Duration;

    fn scan_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            dial_timeout: Duration::from_millis(300),
            worker_count: 4,
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_scan_finds_the_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        // A window around the listener; neighbours are almost surely closed.
        let (start, end) = (open_port.saturating_sub(2), open_port.saturating_add(2));

        let prober = Prober::new(scan_policy());
        let result = prober
            .scan_range(
                &CancellationToken::new(),
                "127.0.0.1",
                start,
                end,
                Protocol::Tcp,
            )
            .await;

        assert_eq!(result.total_ports, (end - start + 1) as usize);
        assert!(result.open_ports.contains(&open_port));
        assert_eq!(
            result.success_count + result.failure_count,
            result.total_ports
        );
        // Slot ordering follows port offsets regardless of completion order.
        let offset = (open_port - start) as usize;
        let slot = result.per_port[offset].as_ref().unwrap();
        assert_eq!(slot.port, open_port);
        assert!(slot.open);
    }

    #[tokio::test]
    async fn test_inverted_bounds_are_swapped() {
        let prober = Prober::new(scan_policy());
        let result = prober
            .scan_range(
                &CancellationToken::new(),
                "127.0.0.1",
                47005,
                47001,
                Protocol::Tcp,
            )
            .await;
        assert_eq!(result.start_port, 47001);
        assert_eq!(result.end_port, 47005);
        assert_eq!(result.total_ports, 5);
        assert_eq!(result.per_port.len(), 5);
    }

    #[tokio::test]
    async fn test_full_port_range_does_not_overflow() {
        // 0-65535 is 65536 ports, one more than u16 can count.
        let prober = Prober::new(scan_policy());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = prober
            .scan_range(&cancel, "127.0.0.1", 0, 65535, Protocol::Tcp)
            .await;
        assert_eq!(result.total_ports, 65536);
        assert_eq!(result.per_port.len(), 65536);
        assert_eq!(result.success_count + result.failure_count, 0);
    }

    #[tokio::test]
    async fn test_more_workers_than_ports() {
        // Idle workers must drain out and release their result senders so
        // the collector terminates.
        let prober = Prober::new(RetryPolicy {
            worker_count: 8,
            ..scan_policy()
        });
        let result = prober
            .scan_range(
                &CancellationToken::new(),
                "127.0.0.1",
                47301,
                47302,
                Protocol::Tcp,
            )
            .await;
        assert_eq!(result.total_ports, 2);
        assert_eq!(
            result.success_count + result.failure_count,
            result.total_ports
        );
    }

    #[tokio::test]
    async fn test_cancelled_scan_is_partial_not_fatal() {
        let prober = Prober::new(RetryPolicy {
            worker_count: 1,
            ..scan_policy()
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = prober
            .scan_range(&cancel, "127.0.0.1", 47101, 47110, Protocol::Tcp)
            .await;
        assert!(result.success_count + result.failure_count < result.total_ports);
    }
}
