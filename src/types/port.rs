//! Port validation helpers.
//!
//! Port numbers are carried as raw `u16` values throughout the crate;
//! validation happens once at the API boundary.

use crate::error::{ProbeError, ProbeResult};

/// Minimum valid port number.
pub const PORT_MIN: u16 = 1;
/// Maximum valid port number.
pub const PORT_MAX: u16 = 65535;

/// Validate a port number against the full valid range (1-65535).
///
/// Takes a `u32` so that out-of-range inputs (0 as well as anything above
/// 65535) are representable; returns the validated `u16`.
pub fn validate_port(port: u32) -> ProbeResult<u16> {
    if port < PORT_MIN as u32 || port > PORT_MAX as u32 {
        return Err(ProbeError::InvalidPort {
            port,
            min: PORT_MIN,
            max: PORT_MAX,
        });
    }
    Ok(port as u16)
}

/// Validate a port against an explicit `[min, max]` window.
pub fn validate_port_in(port: u32, min: u16, max: u16) -> ProbeResult<u16> {
    if port < min as u32 || port > max as u32 {
        return Err(ProbeError::InvalidPort { port, min, max });
    }
    Ok(port as u16)
}
