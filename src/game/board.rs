// Board - The 9x9 grid and the rules that judge it

/// Rows and columns in a grid
pub const SIZE: usize = 9;

/// A 9x9 grid of digits, 0 meaning blank
pub type Grid = [[u8; SIZE]; SIZE];

/// Bitmask with bits 1..=9 set
const FULL_UNIT: u16 = 0b11_1111_1110;

/// An all-blank grid
pub fn empty_grid() -> Grid {
    [[0; SIZE]; SIZE]
}

/// Check that every cell holds a digit 0-9
pub fn is_well_formed(grid: &Grid) -> bool {
    grid.iter().flatten().all(|&cell| cell <= 9)
}

/// Check if `num` can go at (row, col) without repeating in its row, column or box.
/// Cells outside the grid never accept a digit.
pub fn is_valid_placement(grid: &Grid, row: usize, col: usize, num: u8) -> bool {
    if row >= SIZE || col >= SIZE {
        return false;
    }
    if grid[row].contains(&num) {
        return false;
    }
    if (0..SIZE).any(|r| grid[r][col] == num) {
        return false;
    }
    let (box_row, box_col) = (row - row % 3, col - col % 3);
    for r in box_row..box_row + 3 {
        for c in box_col..box_col + 3 {
            if grid[r][c] == num {
                return false;
            }
        }
    }
    true
}

/// First blank cell in row-major order
pub fn find_empty_cell(grid: &Grid) -> Option<(usize, usize)> {
    (0..SIZE)
        .flat_map(|r| (0..SIZE).map(move |c| (r, c)))
        .find(|&(r, c)| grid[r][c] == 0)
}

fn unit_mask(cells: impl Iterator<Item = u8>) -> u16 {
    cells
        .filter(|&d| (1..=9).contains(&d))
        .fold(0u16, |mask, d| mask | (1 << d))
}

/// True when every row, column and 3x3 box is exactly the digits 1 through 9
pub fn is_solved(grid: &Grid) -> bool {
    let rows = (0..SIZE).all(|r| unit_mask(grid[r].iter().copied()) == FULL_UNIT);
    let cols = (0..SIZE).all(|c| unit_mask((0..SIZE).map(|r| grid[r][c])) == FULL_UNIT);
    let boxes = (0..SIZE).all(|b| {
        let (top, left) = ((b / 3) * 3, (b % 3) * 3);
        let cells = (top..top + 3).flat_map(|r| (left..left + 3).map(move |c| grid[r][c]));
        unit_mask(cells) == FULL_UNIT
    });
    rows && cols && boxes
}
