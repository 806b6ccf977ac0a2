// Session - The peer-to-peer protocol state machine
//
// Owns the peer registry, metrics, handler table, observers and deferred
// tasks. It performs no I/O: callers feed it datagrams, heartbeat ticks and
// timer polls, then drain the outbox and the event queue. Whoever drives a
// session is its single writer.

use crate::sync::clock::Clock;
use crate::sync::codec;
use crate::sync::gossip::{self, ByeHandler, HelloHandler};
use crate::sync::handler::{
    Context, HandlerRegistry, MessageHandler, Outgoing, SessionEvent, SessionObserver,
    SessionState,
};
use crate::sync::heartbeat::{self, PingHandler, PongHandler};
use crate::sync::metrics::{Metrics, MetricsSnapshot};
use crate::sync::peer::{PeerAddress, PeerRegistry};
use crate::sync::protocol::{Bye, Envelope, Hello, Payload, Ping, Pong};
use crate::sync::scheduler::{Deferred, Scheduler};
use chrono::{DateTime, Utc};
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Timing constants for membership and liveness
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Period between heartbeat cycles
    pub ping_interval: Duration,
    /// Silence after which a peer is evicted
    pub eviction_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(1),
            eviction_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_eviction_timeout(mut self, timeout: Duration) -> Self {
        self.eviction_timeout = timeout;
        self
    }
}

/// A node's view of the mesh
pub struct Session {
    state: SessionState,
    handlers: HandlerRegistry,
    observers: Vec<Box<dyn SessionObserver>>,
    notifications: Vec<SessionEvent>,
    clock: Arc<dyn Clock>,
    stopped: bool,
}

impl Session {
    /// Create a session for `local` with the core handlers installed
    pub fn new(local: PeerAddress, config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let mut handlers = HandlerRegistry::new();
        handlers.insert(Hello::KIND, Box::new(HelloHandler));
        handlers.insert(Bye::KIND, Box::new(ByeHandler));
        handlers.insert(Ping::KIND, Box::new(PingHandler));
        handlers.insert(Pong::KIND, Box::new(PongHandler));

        Self {
            state: SessionState {
                config,
                peers: PeerRegistry::new(local),
                metrics: Metrics::new(now),
                scheduler: Scheduler::new(),
                outbox: Vec::new(),
                events: Vec::new(),
            },
            handlers,
            observers: Vec::new(),
            notifications: Vec::new(),
            clock,
            stopped: false,
        }
    }

    pub fn local_address(&self) -> &PeerAddress {
        self.state.peers.local_address()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.state.config
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.state.peers
    }

    pub fn metrics(&self) -> &Metrics {
        &self.state.metrics
    }

    /// Metrics as of now
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.state.metrics.snapshot(self.clock.now())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    // ========================================================================
    // EXTENSION POINTS
    // ========================================================================

    /// Install a handler for `kind`, replacing any existing one
    pub fn add_handler<H>(&mut self, kind: impl Into<String>, handler: H)
    where
        H: MessageHandler + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Install an already boxed handler
    pub fn add_boxed_handler(&mut self, kind: impl Into<String>, handler: Box<dyn MessageHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Remove the handler for `kind`; does nothing if there is none
    pub fn remove_handler(&mut self, kind: &str) {
        self.handlers.remove(kind);
    }

    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.contains(kind)
    }

    /// Registered kinds, sorted
    pub fn handler_kinds(&self) -> Vec<&str> {
        self.handlers.kinds()
    }

    /// Subscribe an observer to session events
    pub fn add_observer<O>(&mut self, observer: O)
    where
        O: SessionObserver + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    // ========================================================================
    // INPUTS
    // ========================================================================

    /// Decode a datagram and dispatch each envelope in order
    pub fn receive(&mut self, datagram: &[u8]) -> usize {
        let envelopes = codec::decode(datagram);
        for envelope in &envelopes {
            self.dispatch(envelope);
        }
        envelopes.len()
    }

    /// Hand one envelope to the handler registered for its kind
    pub fn dispatch(&mut self, envelope: &Envelope) {
        if self.stopped {
            return;
        }
        let now = self.clock.now();
        self.state.metrics.record_message();

        match self.handlers.get_mut(envelope.kind()) {
            Some(handler) => {
                let mut ctx = Context::new(&mut self.state, now);
                handler.handle(&mut ctx, envelope);
            }
            None => debug!(kind = envelope.kind(), "no handler registered"),
        }
        self.flush_events(now);
    }

    /// Greet a peer (used to join through a known host)
    pub fn hello(&mut self, to: &PeerAddress) -> bool {
        self.with_context(|ctx| gossip::send_hello(ctx, to, false))
    }

    /// One heartbeat cycle; returns how many peers were evicted
    pub fn heartbeat(&mut self) -> usize {
        if self.stopped {
            return 0;
        }
        self.with_context(heartbeat::run_cycle)
    }

    /// Run every deferred task that is due; returns how many ran
    pub fn poll_timers(&mut self) -> usize {
        if self.stopped {
            return 0;
        }
        let now = self.clock.now();
        let ready = self.state.scheduler.pop_due(now);
        let count = ready.len();
        for work in ready {
            match work {
                Deferred::Send { to, envelope } => {
                    self.state.outbox.push(Outgoing { to, envelope });
                }
                Deferred::Emit(event) => self.state.events.push(event),
            }
        }
        self.flush_events(now);
        count
    }

    /// Earliest time a deferred task wants to run
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.state.scheduler.next_deadline()
    }

    /// How long until the next deferred task, zero if one is overdue
    pub fn time_until_next_task(&self) -> Option<Duration> {
        let deadline = self.next_deadline()?;
        Some((deadline - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Run local logic with the same powers a handler has
    pub fn with_context<R>(&mut self, f: impl FnOnce(&mut Context<'_>) -> R) -> R {
        let now = self.clock.now();
        let result = {
            let mut ctx = Context::new(&mut self.state, now);
            f(&mut ctx)
        };
        self.flush_events(now);
        result
    }

    /// Say bye to every peer and drop pending work. Only the first call acts.
    pub fn shutdown(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        let now = self.clock.now();
        let peers = self.state.peers.addresses();
        {
            let mut ctx = Context::new(&mut self.state, now);
            let bye = Bye::new(ctx.local_address());
            for peer in &peers {
                ctx.send(peer, &bye);
            }
        }
        let cancelled = self.state.scheduler.cancel_all();
        self.stopped = true;
        info!(peers = peers.len(), cancelled, "session shut down");
        true
    }

    // ========================================================================
    // OUTPUTS
    // ========================================================================

    /// Take every queued outgoing envelope
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        mem::take(&mut self.state.outbox)
    }

    /// Take every event raised since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        mem::take(&mut self.notifications)
    }

    fn flush_events(&mut self, now: DateTime<Utc>) {
        // Observers may raise further events; keep going until quiet.
        while !self.state.events.is_empty() {
            let batch = mem::take(&mut self.state.events);
            for event in batch {
                for observer in &mut self.observers {
                    let mut ctx = Context::new(&mut self.state, now);
                    observer.on_event(&mut ctx, &event);
                }
                self.notifications.push(event);
            }
        }
    }
}
