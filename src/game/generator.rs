// Generator - Deterministic puzzle construction from a seed
//
// Fills an empty grid by randomized backtracking, then blanks a
// seed-derived number of cells. The same seed always yields the same board,
// which is what lets a snapshot carry a seed instead of the fixed board.
// Every draw is a fixed-width u32 so 32-bit and 64-bit peers agree.

use crate::game::board::{empty_grid, find_empty_cell, is_valid_placement, Grid, SIZE};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Builds the fixed board for a seed
pub trait PuzzleGenerator: Send + Sync {
    fn generate(&self, seed: u64) -> Grid;
}

/// Randomized backtracking generator
#[derive(Clone, Debug)]
pub struct BacktrackingGenerator {
    /// Fewest blanking attempts
    min_blanks: u32,
    /// Most blanking attempts
    max_blanks: u32,
}

impl Default for BacktrackingGenerator {
    fn default() -> Self {
        Self {
            min_blanks: 40,
            max_blanks: 50,
        }
    }
}

impl BacktrackingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many blanking attempts to make (a cell may be drawn twice)
    pub fn with_blanks(mut self, min: u32, max: u32) -> Self {
        self.min_blanks = min.min(max);
        self.max_blanks = max.max(min);
        self
    }

    /// A complete, valid grid for the seed
    pub fn solution(&self, seed: u64) -> Grid {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut grid = empty_grid();
        fill(&mut grid, &mut rng);
        grid
    }
}

impl PuzzleGenerator for BacktrackingGenerator {
    fn generate(&self, seed: u64) -> Grid {
        let mut grid = self.solution(seed);

        let mut rng = StdRng::seed_from_u64(seed);
        let attempts = rng.gen_range(self.min_blanks..=self.max_blanks);
        for _ in 0..attempts {
            let row = grid_index(&mut rng);
            let col = grid_index(&mut rng);
            grid[row][col] = 0;
        }
        grid
    }
}

fn grid_index(rng: &mut StdRng) -> usize {
    rng.gen_range(0..SIZE as u32) as usize
}

fn fill(grid: &mut Grid, rng: &mut StdRng) -> bool {
    let Some((row, col)) = find_empty_cell(grid) else {
        return true;
    };

    let mut digits: Vec<u8> = (1..=9).collect();
    digits.shuffle(rng);
    for num in digits {
        if is_valid_placement(grid, row, col, num) {
            grid[row][col] = num;
            if fill(grid, rng) {
                return true;
            }
            grid[row][col] = 0;
        }
    }
    false
}
