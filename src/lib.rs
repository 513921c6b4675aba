//! # portprobe - Concurrent Network Reachability Probing
//!
//! portprobe determines whether host/port/protocol targets are connectable,
//! with configurable retries, exponential backoff with jitter, bounded
//! concurrency and aggregate statistics.
//!
//! ## Features
//!
//! - **Single-target probes**: TCP connect / UDP bind-connect attempts with
//!   per-attempt timeouts and a retry state machine
//! - **Range scanning**: fixed-size worker pool over a port range with
//!   ordered per-port results
//! - **Bulk checks**: semaphore-bounded fan-out across heterogeneous targets
//! - **Waiters**: polling loops that block until a port (or any port in a
//!   range) opens or a deadline passes
//! - **Statistics**: thread-safe running counters and latency averages
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portprobe::{Prober, RetryPolicy, Target};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let prober = Prober::new(RetryPolicy::default());
//!     let target = Target::new("example.com", 443);
//!     let result = prober.probe(&CancellationToken::new(), &target).await.unwrap();
//!     println!("{} open={}", target, result.open);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Target and result value types
//! - [`policy`] - `RetryPolicy` with explicit defaults resolution
//! - [`backoff`] - Pure backoff calculator
//! - [`stats`] - Thread-safe statistics aggregator
//! - [`prober`] - The probing engine: single-target prober, range scanner,
//!   bulk checker and waiters
//! - [`error`] - Error types

pub mod backoff;
pub mod cli;
pub mod error;
pub mod policy;
pub mod prober;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{ProbeError, ProbeResult};
pub use policy::RetryPolicy;
pub use prober::{Dialer, NetDialer, Prober};
pub use stats::Statistics;
pub use types::{
    string_to_protocol, validate_port, BulkReport, ConnectionResult, ErrorKind, IpVersion,
    PortRangeResult, Protocol, Target, WaitResult,
};
