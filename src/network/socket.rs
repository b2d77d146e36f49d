//! TCP connect probing

use crate::core::{ConnectOutcome, PortScanner};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

/// Full-handshake connect scanner. No privileges required.
///
/// Every probe opens its own socket and drops it straight away; nothing is
/// pooled or reused between probes.
#[derive(Debug, Clone, Default)]
pub struct TcpConnectScanner;

impl TcpConnectScanner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortScanner for TcpConnectScanner {
    async fn connect(&self, target: Ipv4Addr, port: u16, timeout: Duration) -> ConnectOutcome {
        let addr = SocketAddr::new(IpAddr::V4(target), port);

        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                // Connection successful - close quickly
                drop(stream);
                ConnectOutcome::Connected
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => ConnectOutcome::Refused,
            Ok(Err(e)) => {
                log::trace!("connect {} failed: {}", addr, e);
                ConnectOutcome::Unreachable
            }
            Err(_) => ConnectOutcome::TimedOut,
        }
    }

    fn name(&self) -> &str {
        "tcp-connect"
    }
}
