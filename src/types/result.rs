//! Probe outcome value types.
//!
//! All of these are plain serde-enabled records created once per completed
//! operation and never mutated afterwards; callers own them outright.

use crate::types::{IpVersion, Protocol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classification of a failed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The per-attempt dial deadline elapsed.
    Timeout,
    /// The caller's context was cancelled.
    Cancelled,
    /// The transport itself reported a timeout.
    NetworkTimeout,
    /// Any other connection failure (refused, unreachable, ...).
    ConnectionError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::NetworkTimeout => write!(f, "network_timeout"),
            Self::ConnectionError => write!(f, "connection_error"),
        }
    }
}

/// Outcome of probing a single target, after all retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionResult {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    /// The socket address the dial actually went to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_address: Option<String>,
    /// Whether the connect call succeeded.
    pub open: bool,
    /// Time spent on the attempt that settled the probe.
    pub latency: Duration,
    /// Last failure message, if the probe did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    /// When the successful connection was established.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    /// Attempts consumed (1 on first-try success).
    pub attempts: u32,
    pub ip_version: IpVersion,
}

impl ConnectionResult {
    /// Start a result record for a target; filled in as the probe settles.
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol, ip_version: IpVersion) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            resolved_address: None,
            open: false,
            latency: Duration::ZERO,
            error: None,
            error_kind: None,
            local_addr: None,
            remote_addr: None,
            connected_at: None,
            attempts: 0,
            ip_version,
        }
    }

    /// Record a failure classification.
    pub fn with_error(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self.error_kind = Some(kind);
        self.open = false;
        self
    }
}

impl fmt::Display for ConnectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.open { "open" } else { "closed" };
        write!(
            f,
            "{}://{}:{} {} ({} attempts, {:?})",
            self.protocol, self.host, self.port, state, self.attempts, self.latency
        )
    }
}

/// Outcome of scanning a contiguous port range on one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortRangeResult {
    pub host: String,
    pub start_port: u16,
    pub end_port: u16,
    pub protocol: Protocol,
    pub ip_version: IpVersion,
    pub total_ports: usize,
    /// Open ports in completion order (not sorted).
    pub open_ports: Vec<u16>,
    /// Closed ports in completion order (not sorted).
    pub closed_ports: Vec<u16>,
    pub success_count: usize,
    pub failure_count: usize,
    pub duration: Duration,
    /// Full per-port results, indexed by offset from `start_port`. A slot is
    /// `None` only when its probe was cancelled before completing.
    pub per_port: Vec<Option<ConnectionResult>>,
    /// Per-port error strings; a failing port never aborts the scan.
    pub errors: Vec<String>,
}

/// Outcome of waiting for a port (or any port in a range) to open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitResult {
    pub host: String,
    /// The port that opened; `-1` in any-port mode when none did.
    pub port: i32,
    pub protocol: Protocol,
    pub success: bool,
    /// Wall-clock time the wait consumed.
    pub duration: Duration,
    /// Polling attempts performed.
    pub attempts: u32,
    /// Every failure observed along the way.
    pub errors: Vec<String>,
    /// The successful probe, when `success` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<ConnectionResult>,
}

/// Outcome of a bulk check: one result per input target plus the aggregated
/// failure messages. Empty `errors` means every target was reachable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkReport {
    pub results: Vec<ConnectionResult>,
    pub errors: Vec<String>,
}

impl BulkReport {
    /// True when no target failed.
    pub fn all_open(&self) -> bool {
        self.errors.is_empty()
    }
}
