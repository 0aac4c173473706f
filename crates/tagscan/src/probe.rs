// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connectivity probing.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// EtherNet/IP explicit messaging port.
pub const ENIP_PORT: u16 = 44818;

/// Reachability check for the device behind a registry.
pub trait Probe: Send + Sync {
    /// True when the device answered within `timeout`.
    fn ping(&self, timeout: Duration) -> bool;

    /// Human-readable target, used in log output.
    fn target(&self) -> String;
}

/// Probe that opens (and immediately closes) a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
}

impl TcpProbe {
    /// Probe `gateway`, which may carry its own `:port`.
    pub fn new(gateway: &str) -> Self {
        match gateway.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => match port.parse() {
                Ok(port) => Self {
                    host: host.to_string(),
                    port,
                },
                Err(_) => Self::with_port(gateway, ENIP_PORT),
            },
            _ => Self::with_port(gateway, ENIP_PORT),
        }
    }

    pub fn with_port(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    fn addrs(&self) -> Vec<SocketAddr> {
        match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                log::debug!("[probe] cannot resolve {}: {}", self.host, e);
                Vec::new()
            }
        }
    }
}

impl Probe for TcpProbe {
    fn ping(&self, timeout: Duration) -> bool {
        self.addrs()
            .iter()
            .any(|addr| TcpStream::connect_timeout(addr, timeout).is_ok())
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Run `probe` and optionally log the outcome.
pub(crate) fn run(probe: &dyn Probe, timeout: Duration, echo: bool) -> bool {
    let started = Instant::now();
    let reachable = probe.ping(timeout);
    if echo {
        log::info!(
            "[probe] {} {} ({:?})",
            probe.target(),
            if reachable { "reachable" } else { "unreachable" },
            started.elapsed()
        );
    }
    reachable
}

/// Cooperative cancellation flag shared between a caller and a background
/// operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_gateway_parsing() {
        assert_eq!(TcpProbe::new("10.0.0.1").target(), "10.0.0.1:44818");
        assert_eq!(TcpProbe::new("10.0.0.1:2222").target(), "10.0.0.1:2222");
        assert_eq!(TcpProbe::new("plc:abc").target(), "plc:abc:44818");
    }

    #[test]
    fn test_ping_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpProbe::with_port("127.0.0.1", port);
        assert!(run(&probe, Duration::from_secs(1), true));

        drop(listener);
        assert!(!probe.ping(Duration::from_millis(200)));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
