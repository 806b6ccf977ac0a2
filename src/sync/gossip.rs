// Gossip - Membership discovery by flooding hello messages
//
// A hello from an unknown address registers it and is answered with our
// whole peer list, so a newcomer learns the mesh in one round trip. Any
// hello that carries a list makes us greet every listed address, known or
// not. Convergence is eventual; duplicate hellos along the way are normal.

use crate::sync::handler::{Context, MessageHandler, SessionEvent};
use crate::sync::peer::PeerAddress;
use crate::sync::protocol::{Bye, Envelope, Hello};
use tracing::{debug, info, warn};

/// Send a hello to `to`, optionally with our peer list. Never sends to self.
///
/// The list omits the recipient itself.
pub fn send_hello(ctx: &mut Context<'_>, to: &PeerAddress, include_peers: bool) -> bool {
    if to == ctx.local_address() {
        return false;
    }

    let mut hello = Hello::new(ctx.local_address());
    if include_peers {
        let peers: Vec<PeerAddress> = ctx
            .peers()
            .addresses()
            .into_iter()
            .filter(|peer| peer != to)
            .collect();
        hello = hello.with_peers(peers);
    }
    ctx.send(to, &hello);
    true
}

/// Handles "hello": registration, full-state reply and transitive greeting
#[derive(Debug, Default)]
pub struct HelloHandler;

impl MessageHandler for HelloHandler {
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) {
        let hello: Hello = match envelope.decode() {
            Ok(hello) => hello,
            Err(error) => {
                warn!(%error, "ignoring malformed hello");
                return;
            }
        };
        let sender = hello.sender();
        let now = ctx.now();

        match ctx.peers_mut().add_peer(sender.clone(), now) {
            Ok(true) => {
                info!(peer = %sender, "peer joined");
                send_hello(ctx, &sender, true);
                ctx.metrics_mut().reset(now);
                ctx.emit(SessionEvent::PeerJoined(sender.clone()));
            }
            Ok(false) => {}
            Err(error) => {
                debug!(%error, "hello from own address");
            }
        }

        if let Some(listed) = hello.peers {
            for peer in listed {
                if &peer != ctx.local_address() {
                    send_hello(ctx, &peer, false);
                }
            }
        }
    }
}

/// Handles "bye": cooperative departure of a known peer
#[derive(Debug, Default)]
pub struct ByeHandler;

impl MessageHandler for ByeHandler {
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) {
        let bye: Bye = match envelope.decode() {
            Ok(bye) => bye,
            Err(error) => {
                warn!(%error, "ignoring malformed bye");
                return;
            }
        };
        let sender = bye.sender();
        if ctx.peers_mut().remove_peer(&sender).is_some() {
            info!(peer = %sender, "peer departed");
            ctx.emit(SessionEvent::PeerDeparted(sender));
        } else {
            debug!(peer = %sender, "bye from unknown peer");
        }
    }
}
