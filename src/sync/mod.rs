// Sync module - HOW NODES TALK
// Handles the wire protocol, peer membership, liveness and handler dispatch

pub mod clock;
pub mod codec;
mod gossip;
mod handler;
mod heartbeat;
mod metrics;
mod peer;
mod protocol;
mod scheduler;
mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gossip::{send_hello, ByeHandler, HelloHandler};
pub use handler::{
    from_fn, Context, FnHandler, HandlerRegistry, MessageHandler, Outgoing, SessionEvent,
    SessionObserver, SessionState,
};
pub use heartbeat::{run_cycle, PingHandler, PongHandler};
pub use metrics::{Metrics, MetricsSnapshot};
pub use peer::{PeerAddress, PeerError, PeerInfo, PeerRegistry};
pub use protocol::{
    AskGamedata, Bye, Envelope, Gamedata, Hello, Move, Payload, Ping, Pong, ProtocolError,
    KIND_FIELD,
};
pub use scheduler::{Deferred, Scheduler, TaskId};
pub use session::{Session, SessionConfig};
