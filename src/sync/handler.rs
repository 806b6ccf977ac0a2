// Handlers - Pluggable per-kind message processing
//
// The session owns a table from message kind to handler. The core installs
// handlers for hello/bye/ping/pong; other layers add their own kinds (or
// replace the built-ins) at runtime. Handlers and observers never touch a
// socket: they act through a `Context`, which queues outgoing envelopes,
// deferred tasks and events for the runtime to carry out.

use crate::sync::clock::to_delta;
use crate::sync::metrics::Metrics;
use crate::sync::peer::{PeerAddress, PeerRegistry};
use crate::sync::protocol::{Envelope, Payload};
use crate::sync::scheduler::{Deferred, Scheduler, TaskId};
use crate::sync::session::SessionConfig;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Notifications raised by the session and the layers above it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A previously unknown peer completed a hello handshake
    PeerJoined(PeerAddress),
    /// A peer said bye
    PeerDeparted(PeerAddress),
    /// A peer missed heartbeats for longer than the eviction threshold
    PeerEvicted(PeerAddress),
    /// The working puzzle changed
    PuzzleChanged,
    /// The puzzle was completed; `seed` identifies the solved board
    Solved { seed: u64 },
    /// The next puzzle is ready to be shown after a win
    PuzzleRevealed,
}

/// An envelope waiting to be sent
#[derive(Clone, Debug, PartialEq)]
pub struct Outgoing {
    pub to: PeerAddress,
    pub envelope: Envelope,
}

/// Processes envelopes of one kind
pub trait MessageHandler: Send {
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope);
}

/// Reacts to session events
pub trait SessionObserver: Send {
    fn on_event(&mut self, ctx: &mut Context<'_>, event: &SessionEvent);
}

/// Adapter that turns a closure into a handler
pub struct FnHandler<F>(F);

impl<F> MessageHandler for FnHandler<F>
where
    F: FnMut(&mut Context<'_>, &Envelope) + Send,
{
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) {
        (self.0)(ctx, envelope)
    }
}

/// Build a handler from a closure
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: FnMut(&mut Context<'_>, &Envelope) + Send,
{
    FnHandler(f)
}

// ============================================================================
// HANDLER REGISTRY
// ============================================================================

/// Table from message kind to handler
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler, replacing any existing one for the kind
    pub fn insert(&mut self, kind: impl Into<String>, handler: Box<dyn MessageHandler>) {
        self.handlers.insert(kind.into(), handler);
    }

    /// Remove a handler; absent kinds are ignored
    pub fn remove(&mut self, kind: &str) {
        self.handlers.remove(kind);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn get_mut(&mut self, kind: &str) -> Option<&mut (dyn MessageHandler + 'static)> {
        self.handlers.get_mut(kind).map(|h| h.as_mut())
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Mutable session state handed to handlers and observers
pub struct SessionState {
    pub(crate) config: SessionConfig,
    pub(crate) peers: PeerRegistry,
    pub(crate) metrics: Metrics,
    pub(crate) scheduler: Scheduler,
    pub(crate) outbox: Vec<Outgoing>,
    pub(crate) events: Vec<SessionEvent>,
}

/// What a handler may see and do while processing one input
pub struct Context<'a> {
    state: &'a mut SessionState,
    now: DateTime<Utc>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(state: &'a mut SessionState, now: DateTime<Utc>) -> Self {
        Self { state, now }
    }

    /// Time at which the current input is being processed
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Our own address
    pub fn local_address(&self) -> &PeerAddress {
        self.state.peers.local_address()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.state.config
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.state.peers
    }

    pub fn peers_mut(&mut self) -> &mut PeerRegistry {
        &mut self.state.peers
    }

    pub fn metrics(&self) -> &Metrics {
        &self.state.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.state.metrics
    }

    /// Queue a typed payload for one peer
    pub fn send<P: Payload>(&mut self, to: &PeerAddress, payload: &P) {
        match Envelope::from_payload(payload) {
            Ok(envelope) => self.send_envelope(to, envelope),
            Err(error) => warn!(%error, kind = P::KIND, "failed to build envelope"),
        }
    }

    /// Queue a raw envelope for one peer
    pub fn send_envelope(&mut self, to: &PeerAddress, envelope: Envelope) {
        self.state.outbox.push(Outgoing {
            to: to.clone(),
            envelope,
        });
    }

    /// Queue a payload for every known peer; returns how many were queued
    pub fn broadcast<P: Payload>(&mut self, payload: &P) -> usize {
        let envelope = match Envelope::from_payload(payload) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, kind = P::KIND, "failed to build envelope");
                return 0;
            }
        };
        let targets = self.state.peers.addresses();
        for to in &targets {
            self.send_envelope(to, envelope.clone());
        }
        targets.len()
    }

    /// Queue a payload for one peer after `delay`
    pub fn send_later<P: Payload>(
        &mut self,
        delay: Duration,
        to: &PeerAddress,
        payload: &P,
    ) -> Option<TaskId> {
        match Envelope::from_payload(payload) {
            Ok(envelope) => Some(self.defer(
                delay,
                Deferred::Send {
                    to: to.clone(),
                    envelope,
                },
            )),
            Err(error) => {
                warn!(%error, kind = P::KIND, "failed to build envelope");
                None
            }
        }
    }

    /// Raise an event once the current input has been handled
    pub fn emit(&mut self, event: SessionEvent) {
        self.state.events.push(event);
    }

    /// Raise an event after `delay`
    pub fn emit_later(&mut self, delay: Duration, event: SessionEvent) -> TaskId {
        self.defer(delay, Deferred::Emit(event))
    }

    /// Cancel a deferred task
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.state.scheduler.cancel(id)
    }

    /// Check if a deferred task is still waiting to run
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.state.scheduler.is_pending(id)
    }

    fn defer(&mut self, delay: Duration, work: Deferred) -> TaskId {
        let due = self
            .now
            .checked_add_signed(to_delta(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.state.scheduler.schedule(due, work)
    }
}
