// Peer Management - Track known peers and their liveness
//
// Manages the registry of known remote endpoints. The local node is never
// a member. Hosts are IP literals only; a name would need a DNS lookup on
// every send. Each member carries the time it was added, the time of its
// last heartbeat acknowledgement and its most recent round-trip sample.

use crate::sync::clock::to_delta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Peer-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PeerError {
    #[error("Cannot add self as a peer")]
    CannotAddSelf,

    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),
}

// ============================================================================
// PEER ADDRESS
// ============================================================================

/// A remote endpoint, identified by host and UDP port
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    /// IP literal, kept as sent
    #[serde(rename = "addr", deserialize_with = "ip_literal")]
    host: String,
    /// UDP port
    #[serde(deserialize_with = "port_from_any")]
    port: u16,
}

impl PeerAddress {
    /// Create a new address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to a socket address without touching DNS
    pub fn socket_addr(&self) -> Result<SocketAddr, PeerError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| PeerError::InvalidAddress(self.to_string()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = PeerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| PeerError::InvalidAddress(s.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.parse::<IpAddr>().is_err() {
            return Err(PeerError::InvalidAddress(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| PeerError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

/// Accept a host only if it is an IP literal
pub(crate) fn ip_literal<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let host = String::deserialize(deserializer)?;
    match host.parse::<IpAddr>() {
        Ok(_) => Ok(host),
        Err(_) => Err(serde::de::Error::custom(format!("`{host}` is not an IP address"))),
    }
}

/// Accept a port as either a JSON number or a numeric string
pub(crate) fn port_from_any<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// PEER INFO
// ============================================================================

/// Bookkeeping for one known peer
#[derive(Clone, Debug, PartialEq)]
pub struct PeerInfo {
    /// Network address
    address: PeerAddress,
    /// When the peer entered the registry
    added_at: DateTime<Utc>,
    /// Last heartbeat acknowledgement
    last_ack: Option<DateTime<Utc>>,
    /// Most recent round-trip sample
    last_rtt: Option<Duration>,
}

impl PeerInfo {
    /// Create a new peer info
    pub fn new(address: PeerAddress, added_at: DateTime<Utc>) -> Self {
        Self {
            address,
            added_at,
            last_ack: None,
            last_rtt: None,
        }
    }

    /// Get the address
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// When the peer was added
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// Last acknowledged heartbeat, if any
    pub fn last_ack(&self) -> Option<DateTime<Utc>> {
        self.last_ack
    }

    /// Most recent round-trip time, if any
    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }

    /// Last time we know the peer was alive
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_ack.unwrap_or(self.added_at)
    }

    /// Record a heartbeat acknowledgement
    pub fn record_ack(&mut self, at: DateTime<Utc>, rtt: Duration) {
        self.last_ack = Some(at);
        self.last_rtt = Some(rtt);
    }

    /// Check if the peer has been silent for longer than `timeout`
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_seen() > to_delta(timeout)
    }
}

// ============================================================================
// PEER REGISTRY
// ============================================================================

/// Registry of known peers
#[derive(Clone, Debug)]
pub struct PeerRegistry {
    /// Our own address
    local: PeerAddress,
    /// Map of address to peer info
    peers: HashMap<PeerAddress, PeerInfo>,
}

impl PeerRegistry {
    /// Create a new peer registry
    pub fn new(local: PeerAddress) -> Self {
        Self {
            local,
            peers: HashMap::new(),
        }
    }

    /// Our own address
    pub fn local_address(&self) -> &PeerAddress {
        &self.local
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Get number of peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if we have a peer
    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.peers.contains_key(address)
    }

    /// Add a peer; `Ok(true)` if it was not known before
    pub fn add_peer(&mut self, address: PeerAddress, now: DateTime<Utc>) -> Result<bool, PeerError> {
        if address == self.local {
            return Err(PeerError::CannotAddSelf);
        }
        if self.peers.contains_key(&address) {
            return Ok(false);
        }
        self.peers
            .insert(address.clone(), PeerInfo::new(address, now));
        Ok(true)
    }

    /// Remove a peer
    pub fn remove_peer(&mut self, address: &PeerAddress) -> Option<PeerInfo> {
        self.peers.remove(address)
    }

    /// Get a peer by address
    pub fn get_peer(&self, address: &PeerAddress) -> Option<&PeerInfo> {
        self.peers.get(address)
    }

    /// Record a heartbeat acknowledgement; false if the peer is unknown
    pub fn record_ack(&mut self, address: &PeerAddress, at: DateTime<Utc>, rtt: Duration) -> bool {
        match self.peers.get_mut(address) {
            Some(peer) => {
                peer.record_ack(at, rtt);
                true
            }
            None => false,
        }
    }

    /// All peer addresses, sorted
    pub fn addresses(&self) -> Vec<PeerAddress> {
        let mut addresses: Vec<PeerAddress> = self.peers.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// All peers, sorted by address
    pub fn all_peers(&self) -> Vec<&PeerInfo> {
        let mut peers: Vec<&PeerInfo> = self.peers.values().collect();
        peers.sort_by(|a, b| a.address.cmp(&b.address));
        peers
    }

    /// Remove peers silent for longer than `timeout`, returning them sorted
    pub fn remove_stale(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<PeerAddress> {
        let mut stale: Vec<PeerAddress> = self
            .peers
            .values()
            .filter(|p| p.is_stale(now, timeout))
            .map(|p| p.address.clone())
            .collect();
        stale.sort();

        for address in &stale {
            self.peers.remove(address);
        }
        stale
    }
}
