// UDP Transport Implementation
// One connectionless socket per node, bound to a random port in a range

use crate::sync::PeerAddress;
use crate::transport::{TransportConfig, TransportError, TransportStats};
use rand::Rng;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Routable address used only to pick an outward interface; nothing is sent
const PROBE_TARGET: &str = "8.8.8.8:80";

/// UDP transport: fire-and-forget datagrams, no connections
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    buffer: Vec<u8>,
    stats: TransportStats,
}

impl UdpTransport {
    /// Bind to a random free port in the configured range
    pub async fn bind(config: &TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        let mut last_error = String::from("no attempt made");
        for attempt in 1..=config.bind_attempts {
            let port = pick_port(config.port_min, config.port_max);
            match UdpSocket::bind((config.bind_host.as_str(), port)).await {
                Ok(socket) => {
                    let local_addr = socket
                        .local_addr()
                        .map_err(|e| TransportError::InvalidAddress(e.to_string()))?;
                    info!(%local_addr, attempt, "udp socket bound");
                    return Ok(Self {
                        socket,
                        local_addr,
                        buffer: vec![0u8; config.buffer_size],
                        stats: TransportStats::default(),
                    });
                }
                Err(e) => {
                    debug!(port, attempt, error = %e, "bind attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(TransportError::BindFailed {
            host: config.bind_host.clone(),
            port_min: config.port_min,
            port_max: config.port_max,
            attempts: config.bind_attempts,
            reason: last_error,
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Get transport statistics
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Send one datagram. Failures are counted and returned, never retried.
    /// Only IP hosts are accepted so a send never waits on name resolution.
    pub async fn send_to(&mut self, to: &PeerAddress, data: &[u8]) -> Result<usize, TransportError> {
        let target = match to.socket_addr() {
            Ok(target) => target,
            Err(e) => {
                self.stats.send_errors += 1;
                return Err(TransportError::InvalidAddress(e.to_string()));
            }
        };
        match self.socket.send_to(data, target).await {
            Ok(sent) => {
                self.stats.datagrams_sent += 1;
                self.stats.bytes_sent += sent as u64;
                Ok(sent)
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(TransportError::SendFailed(format!("{to}: {e}")))
            }
        }
    }

    /// Wait for the next datagram
    pub async fn recv(&mut self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let (len, from) = self
            .socket
            .recv_from(&mut self.buffer)
            .await
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
        self.stats.datagrams_received += 1;
        self.stats.bytes_received += len as u64;
        Ok((self.buffer[..len].to_vec(), from))
    }
}

fn pick_port(min: u16, max: u16) -> u16 {
    rand::thread_rng().gen_range(min..=max)
}

/// Best guess at the address other hosts can reach us on
///
/// Connecting a UDP socket only selects a route, so no traffic leaves the
/// host. Falls back to loopback when there is no route.
pub fn discover_advertise_host() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(PROBE_TARGET)?;
        Ok(socket.local_addr()?.ip())
    };
    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}
