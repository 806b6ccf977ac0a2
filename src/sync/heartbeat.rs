// Heartbeat - Liveness probing and passive eviction
//
// Every ping period the session evicts peers whose last sign of life is
// older than the eviction threshold, then pings everyone left. A pong
// echoes the ping's timestamp, which gives the round-trip time directly.

use crate::sync::clock::{from_wire_timestamp, seconds_between, to_wire_timestamp};
use crate::sync::handler::{Context, MessageHandler, SessionEvent};
use crate::sync::protocol::{Envelope, Ping, Pong};
use std::time::Duration;
use tracing::{debug, warn};

/// Run one heartbeat cycle: evict, then ping survivors. Returns evicted count.
pub fn run_cycle(ctx: &mut Context<'_>) -> usize {
    let now = ctx.now();
    let timeout = ctx.config().eviction_timeout;

    let evicted = ctx.peers_mut().remove_stale(now, timeout);
    for peer in &evicted {
        warn!(%peer, "no heartbeat reply, evicting peer");
        ctx.emit(SessionEvent::PeerEvicted(peer.clone()));
    }

    let ping = Ping::new(ctx.local_address(), to_wire_timestamp(now));
    let sent = ctx.broadcast(&ping);
    debug!(sent, evicted = evicted.len(), "heartbeat");
    evicted.len()
}

/// Answers "ping" with a "pong" carrying the same timestamp
#[derive(Debug, Default)]
pub struct PingHandler;

impl MessageHandler for PingHandler {
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) {
        let ping: Ping = match envelope.decode() {
            Ok(ping) => ping,
            Err(error) => {
                warn!(%error, "ignoring malformed ping");
                return;
            }
        };
        let pong = Pong::new(ctx.local_address(), ping.timestamp);
        ctx.send(&ping.sender(), &pong);
    }
}

/// Turns a "pong" into a latency sample and a liveness mark
#[derive(Debug, Default)]
pub struct PongHandler;

impl MessageHandler for PongHandler {
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) {
        let pong: Pong = match envelope.decode() {
            Ok(pong) => pong,
            Err(error) => {
                warn!(%error, "ignoring malformed pong");
                return;
            }
        };
        let Some(sent_at) = from_wire_timestamp(pong.timestamp) else {
            warn!(timestamp = pong.timestamp, "pong with unusable timestamp");
            return;
        };

        let now = ctx.now();
        let latency = seconds_between(sent_at, now);
        ctx.metrics_mut().record_latency(latency);

        let sender = pong.sender();
        let rtt = Duration::try_from_secs_f64(latency).unwrap_or_default();
        if !ctx.peers_mut().record_ack(&sender, now, rtt) {
            debug!(peer = %sender, "pong from unregistered peer");
        }
    }
}
