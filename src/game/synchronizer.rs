// Synchronizer - Keeps the shared puzzle in step across the mesh
//
// Plugs into a session as three message handlers (move, ask_gamedata,
// gamedata) and one observer. The game lives behind a mutex so that a
// display thread can read it while the node loop writes it.
//
// Known gaps: concurrent edits of one cell resolve last-write-wins per node,
// and each node detects its own win. Peers may diverge on both.

use crate::game::board::Grid;
use crate::game::generator::{BacktrackingGenerator, PuzzleGenerator};
use crate::game::state::{EditError, GameState};
use crate::sync::{
    AskGamedata, Context, Envelope, Gamedata, MessageHandler, Move, Payload, PeerAddress,
    Session, SessionEvent, SessionObserver, TaskId,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timing constants for state sync
#[derive(Clone, Debug, PartialEq)]
pub struct SyncConfig {
    /// Pause between meeting a peer and asking it for a snapshot
    pub snapshot_request_delay: Duration,
    /// Pause between a win and showing the next puzzle
    pub reveal_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_request_delay: Duration::from_millis(50),
            reveal_delay: Duration::from_secs(2),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_request_delay(mut self, delay: Duration) -> Self {
        self.snapshot_request_delay = delay;
        self
    }

    pub fn with_reveal_delay(mut self, delay: Duration) -> Self {
        self.reveal_delay = delay;
        self
    }
}

/// Read-only copy of the game for display
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub seed: u64,
    pub board: Grid,
    pub puzzle: Grid,
    pub terminal: bool,
}

#[derive(Default)]
struct SyncState {
    game: Option<GameState>,
    pending_requests: Vec<TaskId>,
}

/// Shared game state plus the logic that replicates it
#[derive(Clone)]
pub struct StateSynchronizer {
    state: Arc<Mutex<SyncState>>,
    generator: Arc<dyn PuzzleGenerator>,
    config: SyncConfig,
}

impl Default for StateSynchronizer {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl StateSynchronizer {
    /// Synchronizer using the backtracking generator
    pub fn new(config: SyncConfig) -> Self {
        Self::with_generator(config, Arc::new(BacktrackingGenerator::new()))
    }

    pub fn with_generator(config: SyncConfig, generator: Arc<dyn PuzzleGenerator>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SyncState::default())),
            generator,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Register the sync handlers and observer on a session
    pub fn install(&self, session: &mut Session) {
        session.add_handler(Move::KIND, MoveHandler(self.clone()));
        session.add_handler(AskGamedata::KIND, AskGamedataHandler(self.clone()));
        session.add_handler(Gamedata::KIND, GamedataHandler(self.clone()));
        session.add_observer(self.clone());
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // LOCAL SIDE
    // ========================================================================

    /// Start a fresh game from `seed` (host mode)
    pub fn start_game(&self, ctx: &mut Context<'_>, seed: u64) {
        let game = GameState::new(self.generator.as_ref(), seed);
        info!(seed, "starting new game");
        let mut state = self.lock();
        state.game = Some(game);
        for task in state.pending_requests.drain(..) {
            ctx.cancel(task);
        }
        ctx.emit(SessionEvent::PuzzleChanged);
    }

    /// Edit a cell locally and tell every peer about it
    pub fn apply_local_edit(
        &self,
        ctx: &mut Context<'_>,
        row: usize,
        col: usize,
        value: u8,
    ) -> Result<(), EditError> {
        let mut state = self.lock();
        let game = state.game.as_mut().ok_or(EditError::NoGame)?;
        if game.is_terminal() {
            return Err(EditError::GameOver);
        }
        game.set_cell(row, col, value)?;

        let mv = Move::new(row, col, value, ctx.local_address());
        let sent = ctx.broadcast(&mv);
        debug!(row, col, value, sent, "local edit");
        ctx.emit(SessionEvent::PuzzleChanged);
        self.check_win(ctx, game);
        Ok(())
    }

    pub fn has_game(&self) -> bool {
        self.lock().game.is_some()
    }

    /// Working puzzle, if a game exists
    pub fn current_puzzle(&self) -> Option<Grid> {
        self.lock().game.as_ref().map(|game| *game.puzzle())
    }

    /// Fixed board, if a game exists
    pub fn fixed_board(&self) -> Option<Grid> {
        self.lock().game.as_ref().map(|game| *game.board())
    }

    pub fn snapshot(&self) -> Option<GameSnapshot> {
        self.lock().game.as_ref().map(|game| GameSnapshot {
            seed: game.seed(),
            board: *game.board(),
            puzzle: *game.puzzle(),
            terminal: game.is_terminal(),
        })
    }

    /// Snapshot requests tracked for cancellation
    pub fn pending_requests(&self) -> usize {
        self.lock().pending_requests.len()
    }

    // ========================================================================
    // REMOTE SIDE
    // ========================================================================

    fn on_move(&self, ctx: &mut Context<'_>, mv: Move) {
        let sender = mv.sender();
        let now = ctx.now();

        // An unknown mover is still joining: register it and bring it up to
        // date instead of applying its move.
        if !ctx.peers().contains(&sender) {
            match ctx.peers_mut().add_peer(sender.clone(), now) {
                Ok(true) => {
                    info!(peer = %sender, "peer joined through move");
                    ctx.emit(SessionEvent::PeerJoined(sender.clone()));
                }
                Ok(false) => {}
                Err(error) => {
                    debug!(%error, "move from own address");
                    return;
                }
            }
            self.send_snapshot(ctx, &sender);
            return;
        }

        let mut state = self.lock();
        let Some(game) = state.game.as_mut() else {
            debug!(peer = %sender, "move before any game exists");
            return;
        };
        if let Err(error) = game.set_cell(mv.row, mv.col, mv.number) {
            warn!(%error, peer = %sender, "rejecting remote move");
            return;
        }
        ctx.emit(SessionEvent::PuzzleChanged);
        if !game.is_terminal() {
            self.check_win(ctx, game);
        }
    }

    fn send_snapshot(&self, ctx: &mut Context<'_>, to: &PeerAddress) {
        let gamedata = self.lock().game.as_ref().map(|game| Gamedata {
            seed: game.snapshot_seed(),
            puzzle: *game.puzzle(),
        });
        match gamedata {
            Some(gamedata) => ctx.send(to, &gamedata),
            None => debug!(peer = %to, "no game to share yet"),
        }
    }

    fn on_gamedata(&self, ctx: &mut Context<'_>, gamedata: Gamedata) {
        let mut game =
            match GameState::from_snapshot(self.generator.as_ref(), gamedata.seed, gamedata.puzzle) {
                Ok(game) => game,
                Err(error) => {
                    warn!(%error, "ignoring snapshot");
                    return;
                }
            };
        info!(seed = gamedata.seed, "installed snapshot");

        let mut state = self.lock();
        for task in state.pending_requests.drain(..) {
            ctx.cancel(task);
        }
        ctx.emit(SessionEvent::PuzzleChanged);
        self.check_win(ctx, &mut game);
        state.game = Some(game);
    }

    fn check_win(&self, ctx: &mut Context<'_>, game: &mut GameState) {
        if !game.check_completion() {
            return;
        }
        info!(seed = game.seed(), "puzzle solved");
        ctx.emit(SessionEvent::Solved { seed: game.seed() });
        game.regenerate(self.generator.as_ref());
        ctx.emit(SessionEvent::PuzzleChanged);
        ctx.emit_later(self.config.reveal_delay, SessionEvent::PuzzleRevealed);
    }
}

impl SessionObserver for StateSynchronizer {
    fn on_event(&mut self, ctx: &mut Context<'_>, event: &SessionEvent) {
        match event {
            SessionEvent::PeerJoined(peer) => {
                let mut state = self.lock();
                if state.game.is_some() {
                    return;
                }
                state.pending_requests.retain(|task| ctx.is_scheduled(*task));
                let ask = AskGamedata::new(ctx.local_address());
                if let Some(task) = ctx.send_later(self.config.snapshot_request_delay, peer, &ask) {
                    debug!(%peer, "snapshot request scheduled");
                    state.pending_requests.push(task);
                }
            }
            SessionEvent::PuzzleRevealed => {
                if let Some(game) = self.lock().game.as_mut() {
                    game.reveal();
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

struct MoveHandler(StateSynchronizer);

impl MessageHandler for MoveHandler {
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) {
        match envelope.decode::<Move>() {
            Ok(mv) => self.0.on_move(ctx, mv),
            Err(error) => warn!(%error, "ignoring malformed move"),
        }
    }
}

struct AskGamedataHandler(StateSynchronizer);

impl MessageHandler for AskGamedataHandler {
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) {
        match envelope.decode::<AskGamedata>() {
            Ok(ask) => self.0.send_snapshot(ctx, &ask.sender()),
            Err(error) => warn!(%error, "ignoring malformed ask_gamedata"),
        }
    }
}

struct GamedataHandler(StateSynchronizer);

impl MessageHandler for GamedataHandler {
    fn handle(&mut self, ctx: &mut Context<'_>, envelope: &Envelope) {
        match envelope.decode::<Gamedata>() {
            Ok(gamedata) => self.0.on_gamedata(ctx, gamedata),
            Err(error) => warn!(%error, "ignoring malformed gamedata"),
        }
    }
}
