//! Prober module - the reachability engine.
//!
//! [`Prober`] owns the resolved policy, the statistics aggregator and the
//! bulk-check concurrency limiter for its whole lifetime. The single-target
//! [`Prober::probe`] is the leaf every other operation (range scans, bulk
//! checks, waiters) is built on, so all completed probes feed the one
//! statistics aggregator.

pub mod bulk;
pub mod dialer;
pub mod range;
pub mod wait;

use crate::backoff::backoff_delay;
use crate::error::{ProbeError, ProbeResult};
use crate::policy::RetryPolicy;
use crate::stats::{Statistics, StatsTracker};
use crate::types::{validate_port_in, ConnectionResult, ErrorKind, IpVersion, Target};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::lookup_host;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use dialer::{DialFailure, DialInfo, Dialer, NetDialer};

/// Retry loop phases. One probe walks `Attempting -> (BackingOff ->
/// Attempting)* -> {Succeeded, Exhausted, Cancelled}`; a backoff sleep is
/// never an attempt.
enum ProbeState {
    Attempting { attempt: u32 },
    BackingOff { attempt: u32 },
    Succeeded,
    Exhausted,
    Cancelled,
}

/// Concurrent network-reachability prober.
pub struct Prober {
    pub(crate) policy: RetryPolicy,
    pub(crate) dialer: Arc<dyn Dialer>,
    pub(crate) stats: StatsTracker,
    pub(crate) limiter: Arc<Semaphore>,
}

impl Prober {
    /// Create a prober using the OS socket dialer. The policy is normalized
    /// once here and immutable afterwards.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_dialer(policy, Arc::new(NetDialer))
    }

    /// Create a prober with a custom dial implementation (used by tests to
    /// instrument connection attempts).
    pub fn with_dialer(policy: RetryPolicy, dialer: Arc<dyn Dialer>) -> Self {
        let policy = policy.normalized();
        let limiter = Arc::new(Semaphore::new(policy.max_concurrency));
        Self {
            policy,
            dialer,
            stats: StatsTracker::new(),
            limiter,
        }
    }

    /// The resolved policy this prober runs under.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Snapshot of the aggregate statistics.
    pub fn stats(&self) -> Statistics {
        self.stats.snapshot()
    }

    /// Zero the aggregate statistics.
    pub fn reset_stats(&self) {
        self.stats.reset()
    }

    /// Probe a single target, retrying per the policy.
    ///
    /// Fails fast with [`ProbeError::InvalidPort`] (no I/O) when validation
    /// is enabled and the port falls outside the policy window, and with
    /// [`ProbeError::Cancelled`] when the token fires before the first
    /// attempt. Cancellation mid-retry (during a backoff sleep or before a
    /// later attempt) is terminal too, but at least one attempt has
    /// completed by then, so the result comes back with its attempt count
    /// and `error_kind == Cancelled` instead of throwing that work away.
    /// Connection failures are not errors: after exhausting
    /// `max_retries + 1` attempts the result comes back with
    /// `open == false` and the last failure classified in `error_kind`.
    /// Every completed probe is recorded into the statistics exactly once;
    /// cancelled probes are not.
    pub async fn probe(
        &self,
        cancel: &CancellationToken,
        target: &Target,
    ) -> ProbeResult<ConnectionResult> {
        if self.policy.validate_ports {
            validate_port_in(target.port as u32, self.policy.min_port, self.policy.max_port)?;
        }

        let total_attempts = self.policy.max_retries + 1;
        let mut result = ConnectionResult::new(
            &target.host,
            target.port,
            target.protocol,
            target.effective_version(),
        );

        let mut state = ProbeState::Attempting { attempt: 1 };
        loop {
            state = match state {
                ProbeState::Attempting { attempt } => {
                    if cancel.is_cancelled() {
                        ProbeState::Cancelled
                    } else {
                        result.attempts = attempt;
                        let started = Instant::now();
                        match self.attempt(target).await {
                            Ok((addr, info)) => {
                                result.latency = started.elapsed();
                                result.open = true;
                                result.error = None;
                                result.error_kind = None;
                                result.resolved_address = Some(addr.to_string());
                                result.local_addr = Some(info.local_addr.to_string());
                                result.remote_addr = Some(info.remote_addr.to_string());
                                result.connected_at = Some(chrono::Utc::now());
                                ProbeState::Succeeded
                            }
                            Err((kind, message)) => {
                                result.latency = started.elapsed();
                                debug!(
                                    host = %target.host,
                                    port = target.port,
                                    attempt,
                                    kind = %kind,
                                    error = %message,
                                    "probe attempt failed"
                                );
                                result = result.with_error(kind, message);
                                if attempt >= total_attempts {
                                    ProbeState::Exhausted
                                } else {
                                    ProbeState::BackingOff { attempt }
                                }
                            }
                        }
                    }
                }
                ProbeState::BackingOff { attempt } => {
                    let delay = backoff_delay(
                        attempt - 1,
                        self.policy.retry_interval,
                        self.policy.backoff_factor,
                        self.policy.jitter,
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => ProbeState::Cancelled,
                        _ = sleep(delay) => ProbeState::Attempting { attempt: attempt + 1 },
                    }
                }
                ProbeState::Succeeded => {
                    debug!(
                        host = %target.host,
                        port = target.port,
                        attempts = result.attempts,
                        latency = ?result.latency,
                        "target reachable"
                    );
                    self.stats.record(&result);
                    return Ok(result);
                }
                ProbeState::Exhausted => {
                    debug!(
                        host = %target.host,
                        port = target.port,
                        attempts = result.attempts,
                        "target unreachable after all retries"
                    );
                    self.stats.record(&result);
                    return Ok(result);
                }
                ProbeState::Cancelled => {
                    debug!(
                        host = %target.host,
                        port = target.port,
                        attempts = result.attempts,
                        "probe cancelled"
                    );
                    if result.attempts == 0 {
                        return Err(ProbeError::Cancelled);
                    }
                    // Mid-retry: keep the attempts already made, classify,
                    // and skip the statistics (the probe never completed).
                    return Ok(result.with_error(ErrorKind::Cancelled, "cancelled while retrying"));
                }
            };
        }
    }

    /// One resolve-and-dial attempt. Resolution failures are retryable and
    /// classified as connection errors.
    async fn attempt(
        &self,
        target: &Target,
    ) -> Result<(SocketAddr, DialInfo), (ErrorKind, String)> {
        let addr = self
            .resolve(target)
            .await
            .map_err(|e| (ErrorKind::ConnectionError, e.to_string()))?;
        match self
            .dialer
            .dial(addr, target.protocol, self.policy.dial_timeout)
            .await
        {
            Ok(info) => Ok((addr, info)),
            Err(failure) => Err((failure.kind, failure.message)),
        }
    }

    /// Resolve the target's `host:port` through the platform resolver,
    /// honoring the IP version the target prefers or its protocol pins.
    async fn resolve(&self, target: &Target) -> ProbeResult<SocketAddr> {
        let address = target.address();
        let candidates = lookup_host(&address)
            .await
            .map_err(|e| ProbeError::Resolution {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        let want = target.effective_version();
        for addr in candidates {
            let matches = match want {
                IpVersion::Any => true,
                IpVersion::V4 => addr.is_ipv4(),
                IpVersion::V6 => addr.is_ipv6(),
            };
            if matches {
                return Ok(addr);
            }
        }
        Err(ProbeError::NoMatchingAddress {
            address,
            family: match want {
                IpVersion::Any => "any",
                IpVersion::V4 => "ipv4",
                IpVersion::V6 => "ipv6",
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;
    use std::time::Duration;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 1,
            retry_interval: Duration::from_millis(10),
            dial_timeout: Duration::from_millis(200),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_port_fails_fast() {
        let prober = Prober::new(RetryPolicy {
            min_port: 1000,
            max_port: 2000,
            ..quick_policy()
        });
        let target = Target::new("127.0.0.1", 80);
        let err = prober
            .probe(&CancellationToken::new(), &target)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidPort { port: 80, .. }));
        // Nothing was dialed, nothing recorded.
        assert_eq!(prober.stats().checks_completed, 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_probe_consumes_no_attempt() {
        let prober = Prober::new(quick_policy());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let target = Target::new("127.0.0.1", 80);
        let err = prober.probe(&cancel, &target).await.unwrap_err();
        assert!(matches!(err, ProbeError::Cancelled));
        assert_eq!(prober.stats().checks_completed, 0);
    }

    #[tokio::test]
    async fn test_cancellation_mid_retry_returns_terminal_result() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        // Long backoff so the cancel fires during the first sleep.
        let prober = Prober::new(RetryPolicy {
            max_retries: 5,
            retry_interval: Duration::from_secs(10),
            dial_timeout: Duration::from_millis(200),
            ..RetryPolicy::default()
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let target = Target::new("127.0.0.1", port);
        let result = prober.probe(&cancel, &target).await.unwrap();

        assert!(!result.open);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
        // Interrupted probes never reach the statistics.
        assert_eq!(prober.stats().checks_completed, 0);
    }

    #[tokio::test]
    async fn test_probe_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober = Prober::new(quick_policy());
        let target = Target::new("127.0.0.1", port);
        let result = prober
            .probe(&CancellationToken::new(), &target)
            .await
            .unwrap();

        assert!(result.open);
        assert_eq!(result.attempts, 1);
        assert!(result.connected_at.is_some());
        assert!(result.local_addr.is_some());
        assert_eq!(
            result.remote_addr.as_deref(),
            Some(format!("127.0.0.1:{}", port).as_str())
        );

        let stats = prober.stats();
        assert_eq!(stats.checks_completed, 1);
        assert_eq!(stats.checks_succeeded, 1);
    }

    #[tokio::test]
    async fn test_probe_closed_port_exhausts_retries() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = Prober::new(quick_policy());
        let target = Target::new("127.0.0.1", port);
        let result = prober
            .probe(&CancellationToken::new(), &target)
            .await
            .unwrap();

        assert!(!result.open);
        assert_eq!(result.attempts, 2); // max_retries 1 -> 2 attempts
        assert!(result.error.is_some());
        assert!(result.error_kind.is_some());

        let stats = prober.stats();
        assert_eq!(stats.checks_completed, 1);
        assert_eq!(stats.checks_failed, 1);
    }

    #[tokio::test]
    async fn test_udp_probe_reports_open_on_bind_connect() {
        let prober = Prober::new(quick_policy());
        let target = Target::with_protocol("127.0.0.1", 9, Protocol::Udp);
        let result = prober
            .probe(&CancellationToken::new(), &target)
            .await
            .unwrap();
        // UDP has no handshake; bind+connect succeeding counts as open.
        assert!(result.open);
    }
}
