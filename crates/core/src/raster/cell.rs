//! Cell addressing and D8 directions

use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;
use std::fmt;

/// A (row, col) address in a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Row-major linear index in a grid with `cols` columns
    #[inline]
    pub fn index(self, cols: usize) -> usize {
        self.row * cols + self.col
    }

    /// Inverse of [`Cell::index`]
    #[inline]
    pub fn from_index(index: usize, cols: usize) -> Self {
        Self::new(index / cols, index % cols)
    }

    /// Adjacent cell in direction `dir`, or `None` when it falls off a
    /// `rows` x `cols` grid.
    #[inline]
    pub fn step(self, dir: Direction, rows: usize, cols: usize) -> Option<Cell> {
        let (dr, dc) = dir.offset();
        let r = self.row.checked_add_signed(dr)?;
        let c = self.col.checked_add_signed(dc)?;
        (r < rows && c < cols).then_some(Cell::new(r, c))
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Cell::new(row, col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Code stored in predecessor grids for cells without a predecessor
/// (sources, unreached cells).
pub const NO_DIRECTION: u8 = 0;

/// The eight D8 directions.
///
/// Codes follow the usual counter-clockwise D8 numbering starting east:
/// 1 = E, 2 = NE, 3 = N, 4 = NW, 5 = W, 6 = SW, 7 = S, 8 = SE.
/// Rows grow southward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    East = 1,
    NorthEast = 2,
    North = 3,
    NorthWest = 4,
    West = 5,
    SouthWest = 6,
    South = 7,
    SouthEast = 8,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::East,
        Direction::NorthEast,
        Direction::North,
        Direction::NorthWest,
        Direction::West,
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
    ];

    pub const CARDINAL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a predecessor byte; `None` for [`NO_DIRECTION`] or garbage.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1..=8 => Some(Self::ALL[(code - 1) as usize]),
            _ => None,
        }
    }

    /// (row, col) offset
    #[inline]
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::East => (0, 1),
            Direction::NorthEast => (-1, 1),
            Direction::North => (-1, 0),
            Direction::NorthWest => (-1, -1),
            Direction::West => (0, -1),
            Direction::SouthWest => (1, -1),
            Direction::South => (1, 0),
            Direction::SouthEast => (1, 1),
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        Self::ALL[((self.code() - 1 + 4) % 8) as usize]
    }

    #[inline]
    pub fn is_diagonal(self) -> bool {
        self.code() % 2 == 0
    }

    /// Planar length of one step for cells of width `sx` and height `sy`.
    #[inline]
    pub fn distance(self, sx: f64, sy: f64) -> f64 {
        match self {
            Direction::East | Direction::West => sx,
            Direction::North | Direction::South => sy,
            _ if sx == sy => sx * SQRT_2,
            _ => sx.hypot(sy),
        }
    }

    /// Direction of the single step from `from` to `to`, if they are adjacent.
    pub fn between(from: Cell, to: Cell) -> Option<Self> {
        let dr = to.row as isize - from.row as isize;
        let dc = to.col as isize - from.col as isize;
        Self::ALL.into_iter().find(|d| d.offset() == (dr, dc))
    }
}
