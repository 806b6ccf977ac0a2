// sudoku-mesh - Serverless shared sudoku over UDP
//
// Layers, leaves first:
// - sync: wire protocol, peer membership, heartbeat, handler dispatch (sans-IO)
// - game: puzzle rules, generation and the state synchronizer
// - transport: the UDP socket
// - node: the tokio loop that ties a session to a socket

pub mod cli;
pub mod game;
pub mod node;
pub mod sync;
pub mod transport;

pub use game::{EditError, Grid, StateSynchronizer, SyncConfig};
pub use node::{Node, NodeConfig, NodeError, NodeHandle};
pub use sync::{PeerAddress, Session, SessionConfig, SessionEvent};
pub use transport::{TransportConfig, TransportError};
