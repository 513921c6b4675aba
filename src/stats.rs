//! Running probe statistics.
//!
//! One aggregator per `Prober`, mutated by every completed probe from any
//! worker. All mutation goes through a single mutex so the count/sum
//! invariants stay atomic; readers take a full snapshot under the same lock.

use crate::types::{ConnectionResult, Protocol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Snapshot of aggregate probe counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub checks_completed: u64,
    pub checks_succeeded: u64,
    pub checks_failed: u64,
    pub total_latency: Duration,
    /// `total_latency / checks_completed`; zero before any probe completes.
    pub average_latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<DateTime<Utc>>,
    pub counts_by_protocol: HashMap<Protocol, u64>,
}

/// Thread-safe aggregator wrapping [`Statistics`].
#[derive(Debug, Default)]
pub struct StatsTracker {
    inner: Mutex<Statistics>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed probe into the counters.
    pub fn record(&self, result: &ConnectionResult) {
        let mut stats = self.inner.lock().expect("stats lock poisoned");
        stats.checks_completed += 1;
        if result.open {
            stats.checks_succeeded += 1;
        } else {
            stats.checks_failed += 1;
        }
        stats.total_latency += result.latency;
        stats.average_latency = stats.total_latency / stats.checks_completed as u32;
        stats.last_check_time = Some(Utc::now());
        *stats.counts_by_protocol.entry(result.protocol).or_insert(0) += 1;
    }

    /// Zero every counter atomically.
    pub fn reset(&self) {
        let mut stats = self.inner.lock().expect("stats lock poisoned");
        *stats = Statistics::default();
    }

    /// Consistent copy of the current counters.
    pub fn snapshot(&self) -> Statistics {
        self.inner.lock().expect("stats lock poisoned").clone()
    }
}
