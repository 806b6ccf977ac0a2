// Game module - THE SHARED PUZZLE
// Board rules, deterministic generation, per-node game state and the
// synchronizer that replicates it over a session

pub mod board;
pub mod generator;
mod state;
mod synchronizer;

pub use board::{is_solved, Grid, SIZE};
pub use generator::{BacktrackingGenerator, PuzzleGenerator};
pub use state::{EditError, GameState, SnapshotError};
pub use synchronizer::{GameSnapshot, StateSynchronizer, SyncConfig};
