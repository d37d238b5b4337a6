use rand::Rng;
use std::fmt;

pub mod state;

pub use state::{Game, GameState, Status};

/// Tile value that wins the game.
pub const WIN_TILE: u64 = 2048;

/// Spawned tile exponents with their probabilities: a 2 (90%) or a 4 (10%).
pub const SPAWN_ODDS: [(u8, f64); 2] = [(1, 0.9), (2, 0.1)];

/// Largest exponent a cell may hold (tile values must fit in a `u64`).
///
/// Tiles at this exponent are capped: two of them never merge.
pub const MAX_EXPONENT: u8 = 63;

/// A direction to move/merge tiles.
///
/// The discriminants double as the on-disk move codes used by run traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Move {
    Left = 0,
    Right = 1,
    Up = 2,
    Down = 3,
}

impl Move {
    /// Every direction in the fixed enumeration order used by the engine and the solvers.
    pub const ALL: [Move; 4] = [Move::Left, Move::Right, Move::Up, Move::Down];

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Move::Left),
            1 => Some(Move::Right),
            2 => Some(Move::Up),
            3 => Some(Move::Down),
            _ => None,
        }
    }

    /// Map the `offset`-th cell of line `line` (counted from the edge tiles slide toward)
    /// to a `(row, col)` coordinate on an `n`x`n` grid.
    #[inline]
    fn cell(self, line: usize, offset: usize, n: usize) -> (usize, usize) {
        match self {
            Move::Left => (line, offset),
            Move::Right => (line, n - 1 - offset),
            Move::Up => (offset, line),
            Move::Down => (n - 1 - offset, line),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Left => "left",
            Move::Right => "right",
            Move::Up => "up",
            Move::Down => "down",
        };
        f.pad(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("tile at ({row}, {col}) is {value}, expected 0 or a power of two >= 2")]
    NotPowerOfTwo { row: usize, col: usize, value: u64 },
    #[error("exponent at ({row}, {col}) is {exponent}, maximum is {MAX_EXPONENT}")]
    ExponentOutOfRange { row: usize, col: usize, exponent: u8 },
    #[error("expected {expected} cells, found {found}")]
    WrongLength { expected: usize, found: usize },
}

/// Square `N`x`N` 2048 grid stored as per-cell base-2 exponents (`0` = empty).
///
/// The grid is a small `Copy` value: every move, spawn or search branch produces a
/// new grid and never mutates one that somebody else holds.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grid<const N: usize> {
    cells: [[u8; N]; N],
}

/// The classic 4x4 board.
pub type Board = Grid<4>;

/// Result of sliding a grid in one direction (no random insert).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift<const N: usize> {
    pub grid: Grid<N>,
    /// Sum of the tile values created by merges during this move.
    pub score_delta: u64,
    /// False when the move leaves the grid untouched (an illegal move).
    pub changed: bool,
}

impl<const N: usize> Default for Grid<N> {
    fn default() -> Self { Self::EMPTY }
}

impl<const N: usize> Grid<N> {
    /// A constant empty grid (all zeros).
    pub const EMPTY: Grid<N> = Grid { cells: [[0; N]; N] };

    /// Build a grid from tile values (0 = empty), validating every tile.
    ///
    /// ```
    /// use ai_2048_solver::engine::Board;
    /// let b = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(b.value(0, 1), 2);
    /// assert!(Board::from_rows([[3, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).is_err());
    /// ```
    pub fn from_rows(rows: [[u64; N]; N]) -> Result<Self, GridError> {
        let mut cells = [[0u8; N]; N];
        for (r, row) in rows.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                cells[r][c] = exponent_of(value).ok_or(GridError::NotPowerOfTwo { row: r, col: c, value })?;
            }
        }
        Ok(Grid { cells })
    }

    /// Build a grid from `N*N` row-major tile values.
    pub fn from_values(values: &[u64]) -> Result<Self, GridError> {
        if values.len() != N * N {
            return Err(GridError::WrongLength { expected: N * N, found: values.len() });
        }
        let mut cells = [[0u8; N]; N];
        for (idx, &value) in values.iter().enumerate() {
            let (r, c) = (idx / N, idx % N);
            cells[r][c] = exponent_of(value).ok_or(GridError::NotPowerOfTwo { row: r, col: c, value })?;
        }
        Ok(Grid { cells })
    }

    /// Build a grid from `N*N` row-major exponents (0 = empty, 1 = a 2-tile, ...).
    pub fn from_exponents(exponents: &[u8]) -> Result<Self, GridError> {
        if exponents.len() != N * N {
            return Err(GridError::WrongLength { expected: N * N, found: exponents.len() });
        }
        let mut cells = [[0u8; N]; N];
        for (idx, &exponent) in exponents.iter().enumerate() {
            let (r, c) = (idx / N, idx % N);
            if exponent > MAX_EXPONENT {
                return Err(GridError::ExponentOutOfRange { row: r, col: c, exponent });
            }
            cells[r][c] = exponent;
        }
        Ok(Grid { cells })
    }

    /// Side length of the grid.
    #[inline]
    pub const fn size(&self) -> usize { N }

    /// Tile value at `(row, col)`, 0 if empty.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> u64 { tile_value(self.cells[row][col]) }

    /// Raw exponent at `(row, col)`.
    #[inline]
    pub fn exponent(&self, row: usize, col: usize) -> u8 { self.cells[row][col] }

    /// Tile values, row by row.
    pub fn rows(&self) -> [[u64; N]; N] {
        self.cells.map(|row| row.map(tile_value))
    }

    /// Row-major exponents, the compact form stored in run traces.
    pub fn to_exponents(&self) -> Vec<u8> {
        self.cells.iter().flatten().copied().collect()
    }

    /// Every empty cell as `(row, col)`, in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().filter(|&(_, &e)| e == 0).map(move |(c, _)| (r, c))
        })
    }

    /// Count the number of empty cells on the grid.
    pub fn count_empty(&self) -> usize {
        self.cells.iter().flatten().filter(|&&e| e == 0).count()
    }

    /// Return the highest tile value present on the grid (0 for an empty grid).
    pub fn highest_tile(&self) -> u64 {
        self.cells.iter().flatten().copied().max().map_or(0, tile_value)
    }

    /// Sum of every tile value on the grid, saturating at `u64::MAX`.
    pub fn tile_sum(&self) -> u64 {
        self.cells.iter().flatten().fold(0u64, |sum, &e| sum.saturating_add(tile_value(e)))
    }

    /// Return the grid resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// Each line is compacted toward the edge named by `dir`, adjacent equal tiles merge
    /// once starting from that edge, and a freshly merged tile never merges again
    /// during the same move.
    ///
    /// ```
    /// use ai_2048_solver::engine::{Board, Move};
    /// let b = Board::from_rows([[2, 2, 2, 2], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let s = b.shift(Move::Left);
    /// assert_eq!(s.grid.rows()[0], [4, 4, 0, 0]);
    /// assert_eq!(s.score_delta, 8);
    /// assert!(s.changed);
    /// ```
    pub fn shift(self, dir: Move) -> Shift<N> {
        let mut cells = [[0u8; N]; N];
        let mut score_delta = 0u64;
        for line_idx in 0..N {
            let line: [u8; N] = std::array::from_fn(|offset| {
                let (r, c) = dir.cell(line_idx, offset, N);
                self.cells[r][c]
            });
            let (slid, score) = slide_line(line);
            score_delta = score_delta.saturating_add(score);
            for (offset, &exponent) in slid.iter().enumerate() {
                let (r, c) = dir.cell(line_idx, offset, N);
                cells[r][c] = exponent;
            }
        }
        let grid = Grid { cells };
        Shift { grid, score_delta, changed: grid != self }
    }

    /// Legal moves paired with their shift results, in `Move::ALL` order.
    pub fn successors(self) -> impl Iterator<Item = (Move, Shift<N>)> {
        Move::ALL
            .into_iter()
            .map(move |dir| (dir, self.shift(dir)))
            .filter(|(_, shift)| shift.changed)
    }

    /// The directions that change the grid, in the order Left, Right, Up, Down.
    pub fn available_moves(&self) -> Vec<Move> {
        self.successors().map(|(dir, _)| dir).collect()
    }

    /// Return true if no legal moves remain. Tries all four directions on copies.
    ///
    /// ```
    /// use ai_2048_solver::engine::Board;
    /// // On an empty grid, shifting in any direction doesn't change anything.
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    pub fn is_game_over(&self) -> bool {
        Move::ALL.iter().all(|&dir| !self.shift(dir).changed)
    }

    /// True once any tile reaches [`WIN_TILE`].
    pub fn is_win(&self) -> bool { self.highest_tile() >= WIN_TILE }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full grid is returned unchanged.
    ///
    /// ```
    /// use ai_2048_solver::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let index = rng.gen_range(0..empty);
        let exponent = generate_random_tile(rng);
        match self.empty_cells().nth(index) {
            Some((r, c)) => self.with_tile(r, c, exponent),
            None => self,
        }
    }

    /// Place a tile exponent at `(row, col)`. Used to enumerate hypothetical spawns.
    #[inline]
    pub(crate) fn with_tile(mut self, row: usize, col: usize, exponent: u8) -> Self {
        self.cells[row][col] = exponent;
        self
    }
}

impl<const N: usize> fmt::Debug for Grid<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid({:?})", self.rows())
    }
}

impl<const N: usize> fmt::Display for Grid<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = "-".repeat(N * 8);
        writeln!(f)?;
        for (r, row) in self.cells.iter().enumerate() {
            let line: Vec<String> = row.iter().map(format_val).collect();
            writeln!(f, "{}", line.join("|"))?;
            if r + 1 < N {
                writeln!(f, "{}", separator)?;
            }
        }
        Ok(())
    }
}

/// Compact one line toward index 0 and merge equal neighbours once.
///
/// Returns the new line and the sum of the tile values created by merges.
fn slide_line<const N: usize>(line: [u8; N]) -> ([u8; N], u64) {
    let mut out = [0u8; N];
    let mut len = 0;
    let mut score = 0u64;
    // A tile that may still merge with the next one in the same pass.
    let mut pending = 0u8;
    for &tile in line.iter().filter(|&&e| e != 0) {
        if pending == tile && tile < MAX_EXPONENT {
            let merged = tile + 1;
            out[len] = merged;
            len += 1;
            score = score.saturating_add(tile_value(merged));
            pending = 0;
        } else {
            if pending != 0 {
                out[len] = pending;
                len += 1;
            }
            pending = tile;
        }
    }
    if pending != 0 {
        out[len] = pending;
    }
    (out, score)
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> u8 { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

#[inline]
fn tile_value(exponent: u8) -> u64 {
    if exponent == 0 { 0 } else { 1u64 << exponent }
}

fn exponent_of(value: u64) -> Option<u8> {
    match value {
        0 => Some(0),
        1 => None,
        v if v.is_power_of_two() => Some(v.trailing_zeros() as u8),
        _ => None,
    }
}

fn format_val(exponent: &u8) -> String {
    match exponent {
        0 => String::from("       "),
        &x => format!("{:^7}", tile_value(x)),
    }
}
