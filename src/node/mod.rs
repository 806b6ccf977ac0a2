// Node module - THE RUNTIME
// Owns the socket and drives one session on a single tokio task. Every
// datagram, heartbeat tick, timer and command passes through the same loop,
// so the peer registry and the game only ever have one writer.

use crate::game::{EditError, GameSnapshot, Grid, StateSynchronizer, SyncConfig};
use crate::sync::{
    codec, MessageHandler, MetricsSnapshot, PeerAddress, PeerError, PeerInfo, Session,
    SessionConfig, SessionEvent, SystemClock,
};
use crate::transport::{
    discover_advertise_host, TransportConfig, TransportError, TransportStats, UdpTransport,
};
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Errors surfaced by the node runtime
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Edit rejected: {0}")]
    Edit(#[from] EditError),

    #[error("Peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("Node is not running")]
    CommandChannelClosed,
}

// ============================================================================
// NODE CONFIG
// ============================================================================

/// Everything needed to start a node
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub transport: TransportConfig,
    /// IP announced to peers; discovered when unset
    pub advertise_host: Option<String>,
    pub session: SessionConfig,
    pub sync: SyncConfig,
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_advertise_host(mut self, host: &str) -> Self {
        self.advertise_host = Some(host.to_string());
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

enum Command {
    Join {
        peer: PeerAddress,
        response: oneshot::Sender<bool>,
    },
    StartGame {
        seed: u64,
        response: oneshot::Sender<()>,
    },
    Edit {
        row: usize,
        col: usize,
        value: u8,
        response: oneshot::Sender<Result<(), EditError>>,
    },
    Peers {
        response: oneshot::Sender<Vec<PeerInfo>>,
    },
    Metrics {
        response: oneshot::Sender<MetricsSnapshot>,
    },
    Traffic {
        response: oneshot::Sender<TransportStats>,
    },
    AddHandler {
        kind: String,
        handler: Box<dyn MessageHandler>,
        response: oneshot::Sender<()>,
    },
    RemoveHandler {
        kind: String,
        response: oneshot::Sender<()>,
    },
    Stop {
        response: oneshot::Sender<bool>,
    },
}

// ============================================================================
// NODE
// ============================================================================

/// The event loop side of a peer
pub struct Node {
    session: Session,
    transport: UdpTransport,
    sync: StateSynchronizer,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl Node {
    /// Bind the socket and build the session. Fails only if binding fails.
    pub async fn bind(config: NodeConfig) -> Result<(Self, NodeHandle), NodeError> {
        let host = match &config.advertise_host {
            Some(host) if host.parse::<IpAddr>().is_ok() => host.clone(),
            Some(host) => return Err(PeerError::InvalidAddress(host.clone()).into()),
            None => discover_advertise_host().to_string(),
        };
        let transport = UdpTransport::bind(&config.transport).await?;
        let local = PeerAddress::new(host, transport.local_port());

        let mut session = Session::new(local.clone(), config.session.clone(), Arc::new(SystemClock));
        let sync = StateSynchronizer::new(config.sync.clone());
        sync.install(&mut session);

        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, _) = broadcast::channel(256);
        let handle = NodeHandle {
            local,
            commands: command_tx,
            events: event_tx.clone(),
            sync: sync.clone(),
        };
        let node = Self {
            session,
            transport,
            sync,
            commands: command_rx,
            events: event_tx,
        };
        info!(local = %handle.local, "node ready");
        Ok((node, handle))
    }

    pub fn local_address(&self) -> &PeerAddress {
        self.session.local_address()
    }

    /// Run until stopped or every handle is dropped
    pub async fn run(mut self) -> Result<(), NodeError> {
        let period = self.session.config().ping_interval;
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let timer = self.session.time_until_next_task();
            tokio::select! {
                command = self.commands.recv() => {
                    let stop = match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            self.session.shutdown();
                            true
                        }
                    };
                    if stop {
                        self.flush().await;
                        break;
                    }
                }
                received = self.transport.recv() => match received {
                    Ok((datagram, from)) => {
                        let count = self.session.receive(&datagram);
                        trace!(%from, count, "datagram");
                    }
                    Err(error) => warn!(%error, "receive failed"),
                },
                _ = heartbeat.tick() => {
                    self.session.heartbeat();
                }
                _ = time::sleep(timer.unwrap_or_default()), if timer.is_some() => {
                    self.session.poll_timers();
                }
            }
            self.flush().await;
        }

        info!(local = %self.session.local_address(), "node stopped");
        Ok(())
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Join { peer, response } => {
                info!(%peer, "joining");
                let _ = response.send(self.session.hello(&peer));
            }
            Command::StartGame { seed, response } => {
                let sync = &self.sync;
                self.session.with_context(|ctx| sync.start_game(ctx, seed));
                let _ = response.send(());
            }
            Command::Edit {
                row,
                col,
                value,
                response,
            } => {
                let sync = &self.sync;
                let result = self
                    .session
                    .with_context(|ctx| sync.apply_local_edit(ctx, row, col, value));
                let _ = response.send(result);
            }
            Command::Peers { response } => {
                let peers = self.session.peers().all_peers().into_iter().cloned().collect();
                let _ = response.send(peers);
            }
            Command::Metrics { response } => {
                let _ = response.send(self.session.metrics_snapshot());
            }
            Command::Traffic { response } => {
                let _ = response.send(self.transport.stats().clone());
            }
            Command::AddHandler {
                kind,
                handler,
                response,
            } => {
                debug!(%kind, "handler added");
                self.session.add_boxed_handler(kind, handler);
                let _ = response.send(());
            }
            Command::RemoveHandler { kind, response } => {
                self.session.remove_handler(&kind);
                let _ = response.send(());
            }
            Command::Stop { response } => {
                let _ = response.send(self.session.shutdown());
                return true;
            }
        }
        false
    }

    /// Send everything the session queued and publish its events
    async fn flush(&mut self) {
        for outgoing in self.session.drain_outbox() {
            let bytes = codec::encode_envelope(&outgoing.envelope);
            if let Err(error) = self.transport.send_to(&outgoing.to, &bytes).await {
                debug!(%error, kind = outgoing.envelope.kind(), "send dropped");
            }
        }
        for event in self.session.drain_events() {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

// ============================================================================
// NODE HANDLE
// ============================================================================

/// Cloneable control surface for a running node
#[derive(Clone)]
pub struct NodeHandle {
    local: PeerAddress,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
    sync: StateSynchronizer,
}

impl NodeHandle {
    /// Address announced to peers
    pub fn local_address(&self) -> &PeerAddress {
        &self.local
    }

    /// Receive session and game events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, NodeError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| NodeError::CommandChannelClosed)?;
        rx.await.map_err(|_| NodeError::CommandChannelClosed)
    }

    /// Greet a known host. Returns false if `peer` is ourselves.
    pub async fn join(&self, peer: PeerAddress) -> Result<bool, NodeError> {
        self.request(|response| Command::Join { peer, response }).await
    }

    /// Start a new local game
    pub async fn start_game(&self, seed: u64) -> Result<(), NodeError> {
        self.request(|response| Command::StartGame { seed, response })
            .await
    }

    /// Edit a cell and broadcast the move
    pub async fn apply_local_edit(&self, row: usize, col: usize, value: u8) -> Result<(), NodeError> {
        self.request(|response| Command::Edit {
            row,
            col,
            value,
            response,
        })
        .await??;
        Ok(())
    }

    pub async fn peers(&self) -> Result<Vec<PeerInfo>, NodeError> {
        self.request(|response| Command::Peers { response }).await
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot, NodeError> {
        self.request(|response| Command::Metrics { response }).await
    }

    /// Datagram counters of the socket
    pub async fn transport_stats(&self) -> Result<TransportStats, NodeError> {
        self.request(|response| Command::Traffic { response }).await
    }

    /// Install a handler for `kind` on the running session
    pub async fn add_handler<H>(&self, kind: &str, handler: H) -> Result<(), NodeError>
    where
        H: MessageHandler + 'static,
    {
        let kind = kind.to_string();
        let handler: Box<dyn MessageHandler> = Box::new(handler);
        self.request(|response| Command::AddHandler {
            kind,
            handler,
            response,
        })
        .await
    }

    pub async fn remove_handler(&self, kind: &str) -> Result<(), NodeError> {
        let kind = kind.to_string();
        self.request(|response| Command::RemoveHandler { kind, response })
            .await
    }

    /// Say bye to every peer and end the loop. Safe to call more than once.
    pub async fn stop(&self) -> bool {
        self.request(|response| Command::Stop { response })
            .await
            .unwrap_or(false)
    }

    pub fn current_puzzle(&self) -> Option<Grid> {
        self.sync.current_puzzle()
    }

    pub fn fixed_board(&self) -> Option<Grid> {
        self.sync.fixed_board()
    }

    pub fn game(&self) -> Option<GameSnapshot> {
        self.sync.snapshot()
    }
}
