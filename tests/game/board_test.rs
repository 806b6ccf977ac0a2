// Board Tests
// Tests for the completion predicate

use crate::solved_grid;
use sudoku_mesh::game::board::{empty_grid, is_valid_placement, SIZE};
use sudoku_mesh::game::is_solved;

#[test]
fn test_solved_grid_detected() {
    assert!(is_solved(&solved_grid()));
}

#[test]
fn test_empty_grid_not_solved() {
    assert!(!is_solved(&empty_grid()));
}

#[test]
fn test_single_blank_not_solved() {
    let mut grid = solved_grid();
    grid[4][4] = 0;
    assert!(!is_solved(&grid));
}

#[test]
fn test_duplicate_in_every_position_detected() {
    let solved = solved_grid();
    for r in 0..9 {
        for c in 0..9 {
            let mut grid = solved;
            grid[r][c] = grid[r][c] % 9 + 1;
            assert!(!is_solved(&grid), "changed ({r}, {c}) still reads as solved");
        }
    }
}

#[test]
fn test_swapped_columns_break_boxes() {
    // Rows and columns stay permutations but boxes do not
    let mut grid = solved_grid();
    for row in grid.iter_mut() {
        row.swap(2, 3);
    }
    assert!(!is_solved(&grid));
}

#[test]
fn test_out_of_range_digit_not_solved() {
    let mut grid = solved_grid();
    grid[0][0] = 10;
    assert!(!is_solved(&grid));
}

#[test]
fn test_valid_placement_checks_row_and_column() {
    let mut grid = empty_grid();
    grid[0][8] = 3;
    grid[8][0] = 4;

    assert!(!is_valid_placement(&grid, 0, 0, 3));
    assert!(!is_valid_placement(&grid, 0, 0, 4));
    assert!(is_valid_placement(&grid, 0, 0, 5));
}

#[test]
fn test_placement_outside_grid_refused() {
    let grid = empty_grid();

    assert!(!is_valid_placement(&grid, SIZE, 0, 1));
    assert!(!is_valid_placement(&grid, 0, SIZE, 1));
    assert!(!is_valid_placement(&grid, usize::MAX, usize::MAX, 1));
}
