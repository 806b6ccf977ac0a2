// Transport module - THE WIRE
// Connectionless UDP datagrams between peers

mod types;
mod udp;

pub use types::{TransportConfig, TransportError, TransportStats};
pub use udp::{discover_advertise_host, UdpTransport};
