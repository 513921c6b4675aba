//! Retry and concurrency policy.
//!
//! A `RetryPolicy` is resolved exactly once, at `Prober` construction, by
//! [`RetryPolicy::normalized`]: every zero or out-of-range field is replaced
//! with its default and the value is immutable from then on.

use crate::types::{Protocol, PORT_MAX, PORT_MIN};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for probing: timeouts, retries, backoff and concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Protocol used when a target does not specify one.
    pub default_protocol: Protocol,
    /// Retries after the first attempt; a probe makes `max_retries + 1`
    /// attempts in total.
    pub max_retries: u32,
    /// Base delay between attempts.
    pub retry_interval: Duration,
    /// Multiplier applied per attempt; clamped to at least 1.0.
    pub backoff_factor: f64,
    /// Randomize each delay by up to ±25%.
    pub jitter: bool,
    /// Per-attempt connect deadline.
    pub dial_timeout: Duration,
    /// Post-connect read deadline (kept for datagram probes; tokio streams
    /// carry no socket deadlines).
    pub read_timeout: Duration,
    /// Post-connect write deadline.
    pub write_timeout: Duration,
    /// Overall deadline for the waiters.
    pub wait_timeout: Duration,
    /// Simultaneous in-flight probes in `check_many`.
    pub max_concurrency: usize,
    /// Worker tasks in `scan_range`.
    pub worker_count: usize,
    /// Lower bound for port validation.
    pub min_port: u16,
    /// Upper bound for port validation.
    pub max_port: u16,
    /// Whether `probe` validates ports against `[min_port, max_port]`.
    pub validate_ports: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            default_protocol: Protocol::Tcp,
            max_retries: 3,
            retry_interval: Duration::from_millis(500),
            backoff_factor: 1.5,
            jitter: false,
            dial_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(300),
            max_concurrency: 100,
            worker_count: 10,
            min_port: PORT_MIN,
            max_port: PORT_MAX,
            validate_ports: true,
        }
    }
}

impl RetryPolicy {
    /// Return a fully-populated copy: zero durations and counts fall back to
    /// the defaults, the backoff factor is clamped to ≥ 1.0 and the port
    /// window is forced into a valid ascending range.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.retry_interval.is_zero() {
            self.retry_interval = defaults.retry_interval;
        }
        if !(self.backoff_factor >= 1.0) {
            // also catches NaN
            self.backoff_factor = defaults.backoff_factor;
        }
        if self.dial_timeout.is_zero() {
            self.dial_timeout = defaults.dial_timeout;
        }
        if self.read_timeout.is_zero() {
            self.read_timeout = defaults.read_timeout;
        }
        if self.write_timeout.is_zero() {
            self.write_timeout = defaults.write_timeout;
        }
        if self.wait_timeout.is_zero() {
            self.wait_timeout = defaults.wait_timeout;
        }
        if self.max_concurrency == 0 {
            self.max_concurrency = defaults.max_concurrency;
        }
        if self.worker_count == 0 {
            self.worker_count = defaults.worker_count;
        }
        if self.min_port == 0 {
            self.min_port = defaults.min_port;
        }
        if self.max_port == 0 {
            self.max_port = defaults.max_port;
        }
        if self.min_port > self.max_port {
            std::mem::swap(&mut self.min_port, &mut self.max_port);
        }
        self
    }
}
