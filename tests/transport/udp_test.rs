// UDP Transport Tests
// Tests for binding inside a port range and datagram exchange

use std::time::Duration;
use sudoku_mesh::sync::PeerAddress;
use sudoku_mesh::transport::{TransportConfig, TransportError, UdpTransport};
use tokio::time::timeout;

fn loopback() -> TransportConfig {
    TransportConfig::new().with_bind_host("127.0.0.1")
}

fn address_of(transport: &UdpTransport) -> PeerAddress {
    PeerAddress::new("127.0.0.1", transport.local_port())
}

// ============================================================================
// CONFIG
// ============================================================================

#[test]
fn test_config_defaults() {
    let config = TransportConfig::default();

    assert_eq!(config.bind_host, "0.0.0.0");
    assert_eq!((config.port_min, config.port_max), (49152, 65535));
    assert_eq!(config.bind_attempts, 32);
    assert_eq!(config.buffer_size, 64 * 1024);
}

#[test]
fn test_config_rejects_empty_range() {
    let config = loopback().with_port_range(60000, 50000);
    assert!(matches!(config.validate(), Err(TransportError::InvalidConfig(_))));
}

#[test]
fn test_config_rejects_zero_attempts() {
    let config = loopback().with_bind_attempts(0);
    assert!(matches!(config.validate(), Err(TransportError::InvalidConfig(_))));
}

// ============================================================================
// BINDING
// ============================================================================

#[tokio::test]
async fn test_bind_within_range() {
    let transport = UdpTransport::bind(&loopback().with_port_range(50000, 59999))
        .await
        .unwrap();

    assert!((50000..=59999).contains(&transport.local_port()));
}

#[tokio::test]
async fn test_bind_fails_when_port_taken() {
    let first = UdpTransport::bind(&loopback()).await.unwrap();
    let taken = loopback().with_port(first.local_port()).with_bind_attempts(3);

    let err = UdpTransport::bind(&taken).await.unwrap_err();

    assert!(matches!(err, TransportError::BindFailed { attempts: 3, .. }));
    assert!(err.to_string().contains("after 3 attempts"));
}

// ============================================================================
// DATAGRAMS
// ============================================================================

#[tokio::test]
async fn test_send_and_receive() {
    let mut a = UdpTransport::bind(&loopback()).await.unwrap();
    let mut b = UdpTransport::bind(&loopback()).await.unwrap();

    let sent = a.send_to(&address_of(&b), b"{\"kind\":\"ping\"}").await.unwrap();
    let (bytes, from) = timeout(Duration::from_secs(2), b.recv()).await.unwrap().unwrap();

    assert_eq!(sent, bytes.len());
    assert_eq!(bytes, b"{\"kind\":\"ping\"}");
    assert_eq!(from.port(), a.local_port());
    assert_eq!(a.stats().datagrams_sent, 1);
    assert_eq!(b.stats().bytes_received, bytes.len() as u64);
}

#[tokio::test]
async fn test_send_to_host_name_fails_without_lookup() {
    let mut a = UdpTransport::bind(&loopback()).await.unwrap();
    let named = PeerAddress::new("localhost", 4000);

    let err = a.send_to(&named, b"{}").await.unwrap_err();

    assert!(matches!(err, TransportError::InvalidAddress(_)));
    assert_eq!(a.stats().send_errors, 1);
    assert_eq!(a.stats().datagrams_sent, 0);
}

#[tokio::test]
async fn test_oversized_datagram_truncated_to_buffer() {
    let mut a = UdpTransport::bind(&loopback()).await.unwrap();
    let mut b = UdpTransport::bind(&loopback().with_buffer_size(8)).await.unwrap();

    a.send_to(&address_of(&b), b"0123456789abcdef").await.unwrap();
    let (bytes, _) = timeout(Duration::from_secs(2), b.recv()).await.unwrap().unwrap();

    assert_eq!(bytes, b"01234567");
}
