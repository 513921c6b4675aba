//! Bulk checking of heterogeneous targets.
//!
//! Fan-out over an arbitrary target list, bounded by the prober's counting
//! semaphore so the number of in-flight probes never exceeds
//! `max_concurrency` no matter how many targets are supplied.

use crate::error::{ProbeError, ProbeResult};
use crate::prober::Prober;
use crate::types::{BulkReport, Target};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Buffering for the fan-out stream; the semaphore controls the actual
/// probe concurrency.
const BULK_BUFFER: usize = 1000;

impl Prober {
    /// Probe every target, collecting one result per target plus an
    /// aggregate of all failure messages.
    ///
    /// Semaphore acquisition is raced against the token: cancellation while
    /// any probe is still queued fails the whole call with
    /// [`ProbeError::Cancelled`]. Individual failures never do; they are
    /// folded into [`BulkReport::errors`] alongside the full result list.
    pub async fn check_many(
        &self,
        cancel: &CancellationToken,
        targets: &[Target],
    ) -> ProbeResult<BulkReport> {
        info!(targets = targets.len(), "bulk check started");

        let outcomes: Vec<(usize, ProbeResult<crate::types::ConnectionResult>)> =
            stream::iter(targets.iter().enumerate())
                .map(|(idx, target)| {
                    let limiter = Arc::clone(&self.limiter);
                    async move {
                        let outcome = tokio::select! {
                            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
                            permit = limiter.acquire() => {
                                let _permit = permit.expect("limiter is never closed");
                                self.probe(cancel, target).await
                            }
                        };
                        (idx, outcome)
                    }
                })
                .buffer_unordered(BULK_BUFFER)
                .collect()
                .await;

        let mut report = BulkReport::default();
        let mut ordered = outcomes;
        ordered.sort_by_key(|(idx, _)| *idx);

        for (idx, outcome) in ordered {
            match outcome {
                Ok(result) => {
                    if !result.open {
                        let reason = result.error.as_deref().unwrap_or("connection failed");
                        report
                            .errors
                            .push(format!("{}:{}: {}", result.host, result.port, reason));
                    }
                    report.results.push(result);
                }
                Err(ProbeError::Cancelled) => return Err(ProbeError::Cancelled),
                Err(e) => {
                    let target = &targets[idx];
                    report
                        .errors
                        .push(format!("{}:{}: {}", target.host, target.port, e));
                }
            }
        }

        info!(
            results = report.results.len(),
            failures = report.errors.len(),
            "bulk check finished"
        );
        Ok(report)
    }
}
