//! Probe target types: protocol family, IP version preference and the
//! `Target` tuple itself.
//!
//! A `Target` is a plain value; equality is by value and copies are cheap
//! enough to hand to concurrent workers without shared ownership.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Transport protocol family to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP over either IP version.
    Tcp,
    /// TCP, IPv4 only.
    Tcp4,
    /// TCP, IPv6 only.
    Tcp6,
    /// UDP over either IP version.
    Udp,
    /// UDP, IPv4 only.
    Udp4,
    /// UDP, IPv6 only.
    Udp6,
}

impl Protocol {
    /// Whether this is a stream (TCP) family.
    pub const fn is_tcp(self) -> bool {
        matches!(self, Self::Tcp | Self::Tcp4 | Self::Tcp6)
    }

    /// Whether this is a datagram (UDP) family.
    pub const fn is_udp(self) -> bool {
        !self.is_tcp()
    }

    /// The IP version this family pins, if any.
    pub const fn pinned_version(self) -> IpVersion {
        match self {
            Self::Tcp4 | Self::Udp4 => IpVersion::V4,
            Self::Tcp6 | Self::Udp6 => IpVersion::V6,
            Self::Tcp | Self::Udp => IpVersion::Any,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
            Self::Udp => "udp",
            Self::Udp4 => "udp4",
            Self::Udp6 => "udp6",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Protocol {
    type Err = std::convert::Infallible;

    /// Case-insensitive parse. Unrecognized strings fall back to TCP, so
    /// parsing never fails.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(string_to_protocol(s))
    }
}

/// Parse a protocol name, case-insensitively. Unrecognized names default
/// to [`Protocol::Tcp`].
pub fn string_to_protocol(s: &str) -> Protocol {
    match s.trim().to_ascii_lowercase().as_str() {
        "tcp" => Protocol::Tcp,
        "tcp4" => Protocol::Tcp4,
        "tcp6" => Protocol::Tcp6,
        "udp" => Protocol::Udp,
        "udp4" => Protocol::Udp4,
        "udp6" => Protocol::Udp6,
        _ => Protocol::Tcp,
    }
}

/// IP version preference for address resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    /// No preference; the first resolved address wins.
    #[default]
    Any,
    /// IPv4 addresses only.
    V4,
    /// IPv6 addresses only.
    V6,
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::V4 => write!(f, "ipv4"),
            Self::V6 => write!(f, "ipv6"),
        }
    }
}

/// A single probe target: host, port, protocol family and IP preference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Hostname or IP literal.
    pub host: String,
    /// Port number (1-65535).
    pub port: u16,
    /// Transport family to probe.
    pub protocol: Protocol,
    /// IP version preference, combined with any version the protocol pins.
    #[serde(default)]
    pub ip_version: IpVersion,
}

impl Target {
    /// Create a TCP target with no IP version preference.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: Protocol::Tcp,
            ip_version: IpVersion::Any,
        }
    }

    /// Create a target with an explicit protocol family.
    pub fn with_protocol(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            ip_version: IpVersion::Any,
        }
    }

    /// Effective IP version: the family pin wins over the stated preference.
    pub fn effective_version(&self) -> IpVersion {
        match self.protocol.pinned_version() {
            IpVersion::Any => self.ip_version,
            pinned => pinned,
        }
    }

    /// The `host:port` string to hand to the resolver, wrapping IPv6
    /// literals in brackets.
    pub fn address(&self) -> String {
        format_host_port(&self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.address())
    }
}

/// Join a host and port into a resolvable address string. IPv6 literals
/// get bracket-wrapped; everything else is left to the resolver.
pub fn format_host_port(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parsing_is_case_insensitive() {
        assert_eq!(string_to_protocol("TCP"), Protocol::Tcp);
        assert_eq!(string_to_protocol("udp6"), Protocol::Udp6);
        assert_eq!(string_to_protocol(" Tcp4 "), Protocol::Tcp4);
    }

    #[test]
    fn test_unknown_protocol_defaults_to_tcp() {
        assert_eq!(string_to_protocol("sctp"), Protocol::Tcp);
        assert_eq!(string_to_protocol(""), Protocol::Tcp);
        let parsed: Protocol = "quic".parse().unwrap();
        assert_eq!(parsed, Protocol::Tcp);
    }

    #[test]
    fn test_family_predicates() {
        assert!(Protocol::Tcp6.is_tcp());
        assert!(Protocol::Udp4.is_udp());
        assert_eq!(Protocol::Udp6.pinned_version(), IpVersion::V6);
        assert_eq!(Protocol::Tcp.pinned_version(), IpVersion::Any);
    }

    #[test]
    fn test_ipv6_literal_is_bracketed() {
        assert_eq!(format_host_port("::1", 80), "[::1]:80");
        assert_eq!(format_host_port("2001:db8::1", 443), "[2001:db8::1]:443");
        assert_eq!(format_host_port("example.com", 80), "example.com:80");
        assert_eq!(format_host_port("127.0.0.1", 80), "127.0.0.1:80");
    }

    #[test]
    fn test_effective_version() {
        let mut t = Target::with_protocol("h", 80, Protocol::Tcp6);
        t.ip_version = IpVersion::V4; // family pin wins
        assert_eq!(t.effective_version(), IpVersion::V6);

        let mut t = Target::new("h", 80);
        t.ip_version = IpVersion::V4;
        assert_eq!(t.effective_version(), IpVersion::V4);
    }

    #[test]
    fn test_target_display() {
        let t = Target::with_protocol("::1", 8080, Protocol::Udp);
        assert_eq!(t.to_string(), "udp://[::1]:8080");
    }
}
