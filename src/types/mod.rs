//! Core type definitions for portprobe.

mod port;
mod result;
mod target;

pub use port::{validate_port, validate_port_in, PORT_MAX, PORT_MIN};
pub use result::{BulkReport, ConnectionResult, ErrorKind, PortRangeResult, WaitResult};
pub use target::{format_host_port, string_to_protocol, IpVersion, Protocol, Target};
