//! Error types for portprobe.
//!
//! Uses `thiserror` for ergonomic error definitions. Connection failures are
//! not represented here: a probe that exhausts its retries still returns a
//! `ConnectionResult`, with the failure classified on the result itself.

use thiserror::Error;

/// Main error type for probing operations.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Port is outside the range the policy allows. Returned before any
    /// network I/O is attempted.
    #[error("port {port} is outside the allowed range ({min}-{max})")]
    InvalidPort { port: u32, min: u16, max: u16 },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    #[error("resolve {address}: {reason}")]
    Resolution { address: String, reason: String },

    #[error("no {family} address for {address}")]
    NoMatchingAddress { address: String, family: &'static str },
}

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;
