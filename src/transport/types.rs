// Transport Types - Configuration, errors and counters for the datagram layer

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// TRANSPORT CONFIG
// ============================================================================

/// Where and how to bind the local UDP socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Interface to bind on
    pub bind_host: String,
    /// Lowest port to try
    pub port_min: u16,
    /// Highest port to try
    pub port_max: u16,
    /// Random ports to try before giving up
    pub bind_attempts: u32,
    /// Receive buffer size; larger datagrams are truncated
    pub buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port_min: 49152,
            port_max: 65535,
            bind_attempts: 32,
            buffer_size: 64 * 1024,
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_host(mut self, host: &str) -> Self {
        self.bind_host = host.to_string();
        self
    }

    pub fn with_port_range(mut self, min: u16, max: u16) -> Self {
        self.port_min = min;
        self.port_max = max;
        self
    }

    /// Bind exactly one port
    pub fn with_port(self, port: u16) -> Self {
        self.with_port_range(port, port)
    }

    pub fn with_bind_attempts(mut self, attempts: u32) -> Self {
        self.bind_attempts = attempts;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.port_min > self.port_max {
            return Err(TransportError::InvalidConfig(format!(
                "port range {}-{} is empty",
                self.port_min, self.port_max
            )));
        }
        if self.bind_attempts == 0 {
            return Err(TransportError::InvalidConfig(
                "bind_attempts cannot be 0".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(TransportError::InvalidConfig(
                "buffer_size cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TRANSPORT ERRORS
// ============================================================================

/// Errors that can occur in the transport layer
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Could not bind {host} in ports {port_min}-{port_max} after {attempts} attempts: {reason}")]
    BindFailed {
        host: String,
        port_min: u16,
        port_max: u16,
        attempts: u32,
        reason: String,
    },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// TRANSPORT STATISTICS
// ============================================================================

/// Counters for datagram traffic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Sends that failed and were dropped
    pub send_errors: u64,
}
