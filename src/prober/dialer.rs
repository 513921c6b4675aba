//! Connect seam for the prober.
//!
//! The `Dialer` trait isolates the platform connect primitives so tests can
//! substitute an instrumented implementation. The real [`NetDialer`] does a
//! stream connect for TCP families and an address-binding probe for UDP
//! families (UDP has no handshake, so a bound-and-connected socket is the
//! strongest statement the transport can make).

use crate::types::{ErrorKind, Protocol};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

/// Addresses observed on a successful dial.
#[derive(Debug, Clone, Copy)]
pub struct DialInfo {
    pub local_addr: SocketAddr,
    pub remote_addr: SocketAddr,
}

/// A failed dial, already classified for statistics and diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DialFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl DialFailure {
    fn classify(err: std::io::Error, addr: SocketAddr) -> Self {
        let kind = if err.kind() == std::io::ErrorKind::TimedOut {
            ErrorKind::NetworkTimeout
        } else {
            ErrorKind::ConnectionError
        };
        Self {
            kind,
            message: format!("connect to {} failed: {}", addr, err),
        }
    }

    fn deadline(addr: SocketAddr, limit: Duration) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: format!("connect to {} timed out after {:?}", addr, limit),
        }
    }
}

/// One connection attempt against a resolved address.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(
        &self,
        addr: SocketAddr,
        protocol: Protocol,
        limit: Duration,
    ) -> Result<DialInfo, DialFailure>;
}

/// Dialer backed by the operating system's socket API.
#[derive(Debug, Default)]
pub struct NetDialer;

impl NetDialer {
    async fn dial_tcp(&self, addr: SocketAddr, limit: Duration) -> Result<DialInfo, DialFailure> {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                let info = DialInfo {
                    local_addr: stream
                        .local_addr()
                        .map_err(|e| DialFailure::classify(e, addr))?,
                    remote_addr: stream
                        .peer_addr()
                        .map_err(|e| DialFailure::classify(e, addr))?,
                };
                // Connection is only probed, never used.
                drop(stream);
                Ok(info)
            }
            Ok(Err(e)) => Err(DialFailure::classify(e, addr)),
            Err(_) => Err(DialFailure::deadline(addr, limit)),
        }
    }

    async fn dial_udp(&self, addr: SocketAddr, limit: Duration) -> Result<DialInfo, DialFailure> {
        let bind_addr: SocketAddr = if addr.is_ipv4() {
            "0.0.0.0:0".parse().expect("literal addr")
        } else {
            "[::]:0".parse().expect("literal addr")
        };

        let attempt = async {
            let socket = UdpSocket::bind(bind_addr).await?;
            socket.connect(addr).await?;
            socket.local_addr()
        };

        match timeout(limit, attempt).await {
            Ok(Ok(local_addr)) => Ok(DialInfo {
                local_addr,
                remote_addr: addr,
            }),
            Ok(Err(e)) => Err(DialFailure::classify(e, addr)),
            Err(_) => Err(DialFailure::deadline(addr, limit)),
        }
    }
}

#[async_trait]
impl Dialer for NetDialer {
    async fn dial(
        &self,
        addr: SocketAddr,
        protocol: Protocol,
        limit: Duration,
    ) -> Result<DialInfo, DialFailure> {
        if protocol.is_tcp() {
            self.dial_tcp(addr, limit).await
        } else {
            self.dial_udp(addr, limit).await
        }
    }
}
