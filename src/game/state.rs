// Game State - Fixed board, working puzzle and completion
//
// The fixed board comes from the generator; the working puzzle starts as a
// copy of it and takes edits. Cells that are non-zero on the fixed board
// never change.

use crate::game::board::{is_solved, is_well_formed, Grid, SIZE};
use crate::game::generator::PuzzleGenerator;
use thiserror::Error;

/// Reasons an edit is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Cell ({row}, {col}) is outside the grid")]
    OutOfBounds { row: usize, col: usize },

    #[error("Value {0} is not a digit 0-9")]
    InvalidValue(u8),

    #[error("Cell ({row}, {col}) is part of the fixed board")]
    FixedCell { row: usize, col: usize },

    #[error("No game in progress")]
    NoGame,

    #[error("Game is over, waiting for the next puzzle")]
    GameOver,
}

/// Reasons a snapshot cannot be installed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Snapshot grid contains a value outside 0-9")]
    MalformedGrid,
}

/// One puzzle in play
#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    /// Seed the fixed board was generated with
    seed: u64,
    board: Grid,
    puzzle: Grid,
    terminal: bool,
}

impl GameState {
    /// Start a game from an initial seed; the generator runs on `seed + 1`
    pub fn new(generator: &dyn PuzzleGenerator, seed: u64) -> Self {
        let seed = seed.wrapping_add(1);
        let board = generator.generate(seed);
        Self {
            seed,
            board,
            puzzle: board,
            terminal: false,
        }
    }

    /// Rebuild a game from a snapshot seed and working puzzle
    pub fn from_snapshot(
        generator: &dyn PuzzleGenerator,
        snapshot_seed: u64,
        puzzle: Grid,
    ) -> Result<Self, SnapshotError> {
        if !is_well_formed(&puzzle) {
            return Err(SnapshotError::MalformedGrid);
        }
        let mut game = Self::new(generator, snapshot_seed);
        for row in 0..SIZE {
            for col in 0..SIZE {
                if game.board[row][col] == 0 {
                    game.puzzle[row][col] = puzzle[row][col];
                }
            }
        }
        Ok(game)
    }

    /// Seed the current fixed board was generated with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed to put in a snapshot (one less than the generation seed)
    pub fn snapshot_seed(&self) -> u64 {
        self.seed.wrapping_sub(1)
    }

    pub fn board(&self) -> &Grid {
        &self.board
    }

    pub fn puzzle(&self) -> &Grid {
        &self.puzzle
    }

    /// True after a win until the next puzzle is revealed
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn is_fixed(&self, row: usize, col: usize) -> bool {
        row < SIZE && col < SIZE && self.board[row][col] != 0
    }

    /// Write a digit (0 clears) into an editable cell
    pub fn set_cell(&mut self, row: usize, col: usize, value: u8) -> Result<(), EditError> {
        if row >= SIZE || col >= SIZE {
            return Err(EditError::OutOfBounds { row, col });
        }
        if value > 9 {
            return Err(EditError::InvalidValue(value));
        }
        if self.board[row][col] != 0 {
            return Err(EditError::FixedCell { row, col });
        }
        self.puzzle[row][col] = value;
        Ok(())
    }

    /// Check the working puzzle; marks the game terminal when solved
    pub fn check_completion(&mut self) -> bool {
        if is_solved(&self.puzzle) {
            self.terminal = true;
        }
        self.terminal
    }

    /// Replace the board with the next seed's puzzle; stays terminal until revealed
    pub fn regenerate(&mut self, generator: &dyn PuzzleGenerator) {
        self.seed = self.seed.wrapping_add(1);
        self.board = generator.generate(self.seed);
        self.puzzle = self.board;
    }

    /// Make the current puzzle playable again
    pub fn reveal(&mut self) {
        self.terminal = false;
    }
}
