//! Waiters: polling loops that block until a target becomes reachable or an
//! overall deadline elapses.

use crate::backoff::backoff_delay;
use crate::error::{ProbeError, ProbeResult};
use crate::prober::Prober;
use crate::types::{Protocol, Target, WaitResult};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

impl Prober {
    /// Poll a single target until it opens or `wait_timeout` (derived once,
    /// at call start) elapses. Failed polls back off per the policy and
    /// their errors accumulate in the returned [`WaitResult`]. Cancellation
    /// propagates as [`ProbeError::Cancelled`].
    pub async fn wait_for_port(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        protocol: Protocol,
    ) -> ProbeResult<WaitResult> {
        let started = Instant::now();
        let deadline = started + self.policy.wait_timeout;
        let target = Target::with_protocol(host, port, protocol);
        let mut attempts: u32 = 0;
        let mut errors = Vec::new();

        info!(host, port, protocol = %protocol, timeout = ?self.policy.wait_timeout, "waiting for port");

        loop {
            if cancel.is_cancelled() {
                return Err(ProbeError::Cancelled);
            }
            attempts += 1;
            match self.probe(cancel, &target).await {
                Ok(result) if result.open => {
                    debug!(host, port, attempts, elapsed = ?started.elapsed(), "port became reachable");
                    return Ok(WaitResult {
                        host: host.to_string(),
                        port: port as i32,
                        protocol,
                        success: true,
                        duration: started.elapsed(),
                        attempts,
                        errors,
                        found: Some(result),
                    });
                }
                Ok(result) => {
                    if let Some(e) = result.error {
                        errors.push(e);
                    }
                }
                Err(e) => return Err(e),
            }

            if !self.sleep_until_next_round(cancel, attempts - 1, deadline).await? {
                break;
            }
        }

        debug!(host, port, attempts, "wait timed out");
        Ok(WaitResult {
            host: host.to_string(),
            port: port as i32,
            protocol,
            success: false,
            duration: started.elapsed(),
            attempts,
            errors,
            found: None,
        })
    }

    /// Poll a port range until any port opens, scanning the range
    /// sequentially in ascending order inside each round. Returns
    /// `port == -1` when the deadline passes with nothing open.
    pub async fn wait_for_any_port(
        &self,
        cancel: &CancellationToken,
        host: &str,
        start_port: u16,
        end_port: u16,
        protocol: Protocol,
    ) -> ProbeResult<WaitResult> {
        let (start_port, end_port) = if start_port <= end_port {
            (start_port, end_port)
        } else {
            (end_port, start_port)
        };
        let started = Instant::now();
        let deadline = started + self.policy.wait_timeout;
        let mut attempts: u32 = 0;
        let mut errors = Vec::new();
        let mut round: u32 = 0;

        info!(host, start_port, end_port, protocol = %protocol, "waiting for any port in range");

        loop {
            for port in start_port..=end_port {
                if cancel.is_cancelled() {
                    return Err(ProbeError::Cancelled);
                }
                attempts += 1;
                let target = Target::with_protocol(host, port, protocol);
                match self.probe(cancel, &target).await {
                    Ok(result) if result.open => {
                        return Ok(WaitResult {
                            host: host.to_string(),
                            port: port as i32,
                            protocol,
                            success: true,
                            duration: started.elapsed(),
                            attempts,
                            errors,
                            found: Some(result),
                        });
                    }
                    Ok(result) => {
                        if let Some(e) = result.error {
                            errors.push(e);
                        }
                    }
                    Err(e) => return Err(e),
                }
            }

            if !self.sleep_until_next_round(cancel, round, deadline).await? {
                break;
            }
            round += 1;
        }

        debug!(host, start_port, end_port, attempts, "wait for any port timed out");
        Ok(WaitResult {
            host: host.to_string(),
            port: -1,
            protocol,
            success: false,
            duration: started.elapsed(),
            attempts,
            errors,
            found: None,
        })
    }

    /// Back off before the next polling round, clamped to the remaining
    /// time. Returns `Ok(false)` once the deadline is reached.
    async fn sleep_until_next_round(
        &self,
        cancel: &CancellationToken,
        backoff_index: u32,
        deadline: Instant,
    ) -> ProbeResult<bool> {
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        let delay = backoff_delay(
            backoff_index,
            self.policy.retry_interval,
            self.policy.backoff_factor,
            self.policy.jitter,
        )
        .min(deadline - now);
        if delay > Duration::ZERO {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
        Ok(Instant::now() < deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RetryPolicy;
    use std::time::Duration;

    fn wait_policy(timeout_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            dial_timeout: Duration::from_millis(100),
            retry_interval: Duration::from_millis(20),
            wait_timeout: Duration::from_millis(timeout_ms),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_wait_succeeds_immediately_on_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober = Prober::new(wait_policy(2_000));
        let result = prober
            .wait_for_port(&CancellationToken::new(), "127.0.0.1", port, Protocol::Tcp)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.port, port as i32);
        assert_eq!(result.attempts, 1);
        assert!(result.found.is_some());
    }

    #[tokio::test]
    async fn test_wait_times_out_with_errors() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = Prober::new(wait_policy(200));
        let started = std::time::Instant::now();
        let result = prober
            .wait_for_port(&CancellationToken::new(), "127.0.0.1", port, Protocol::Tcp)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.attempts >= 1);
        assert!(!result.errors.is_empty());
        // Bounded overshoot: well under the timeout plus one polling round.
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_wait_any_reports_minus_one_on_timeout() {
        let prober = Prober::new(wait_policy(150));
        let result = prober
            .wait_for_any_port(
                &CancellationToken::new(),
                "127.0.0.1",
                47201,
                47203,
                Protocol::Tcp,
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.port, -1);
        assert!(result.found.is_none());
    }

    #[tokio::test]
    async fn test_wait_any_finds_open_port_in_ascending_order() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (start, end) = (port.saturating_sub(1), port.saturating_add(1));

        let prober = Prober::new(wait_policy(2_000));
        let result = prober
            .wait_for_any_port(&CancellationToken::new(), "127.0.0.1", start, end, Protocol::Tcp)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.port, port as i32);
    }

    #[tokio::test]
    async fn test_wait_propagates_cancellation() {
        let prober = Prober::new(wait_policy(5_000));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = prober
            .wait_for_port(&cancel, "127.0.0.1", 47210, Protocol::Tcp)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Cancelled));
    }
}
