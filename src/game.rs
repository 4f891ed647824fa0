//! Board geometry: directions, positions and the wall grid.
//!
//! Every cell carries four wall flags packed into the low bits of a byte.
//! A wall always belongs to two cells at once, so placing one also sets
//! the opposite side of the neighbouring cell.

use std::fmt;

use crate::MctsError;

/// One of the four sides of a cell.
///
/// The discriminants match the flag order of `Board::from_cells`:
/// up, right, down, left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction{
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3
}

impl Direction{
    /// All directions in flag order.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    /// Builds a direction from its flag index (0..4).
    #[inline]
    pub fn from_index(index: usize) -> Option<Direction>{
        Self::ALL.get(index).copied()
    }

    /// Flag index of this direction, the inverse of `from_index`.
    #[inline]
    pub fn index(self) -> usize{
        self as usize
    }

    /// The side of the neighbouring cell that shares this wall.
    #[inline]
    pub fn opposite(self) -> Direction{
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right
        }
    }

    #[inline]
    fn bit(self) -> u8{
        1 << self as u8
    }
}

/// A cell coordinate, row first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position{
    pub row: usize,
    pub col: usize
}

impl Position{
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self{
        Position { row, col }
    }

    /// Number of orthogonal steps between two cells, ignoring walls.
    #[inline]
    pub fn manhattan(self, other: Position) -> usize{
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for Position{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(usize, usize)> for Position{
    fn from((row, col): (usize, usize)) -> Self{
        Position::new(row, col)
    }
}

const ALL_WALLS: u8 = 0b1111;

/// Square wall grid.
///
/// Cloning a board copies one byte per cell, so every derived state owns
/// an independent grid.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board{
    size: usize,
    cells: Box<[u8]>
}

impl Board{
    /// Creates an open board of side `size`: only the outer boundary is walled.
    ///
    /// # Returns
    /// `Err(MctsError::BoardTooSmall)` when `size` is zero.
    pub fn new(size: usize) -> Result<Self, MctsError>{
        if size == 0 {
            return Err(MctsError::BoardTooSmall(size));
        }

        let mut board = Board { size, cells: vec![0; size * size].into_boxed_slice() };

        for i in 0..size {
            let edges = [
                (Position::new(0, i), Direction::Up),
                (Position::new(size - 1, i), Direction::Down),
                (Position::new(i, 0), Direction::Left),
                (Position::new(i, size - 1), Direction::Right)
            ];
            for (position, direction) in edges {
                let index = board.index(position);
                board.cells[index] |= direction.bit();
            }
        }

        Ok(board)
    }

    /// Builds a board from per-cell wall flags in row-major order,
    /// each entry ordered up, right, down, left.
    ///
    /// The flags must describe a consistent board: every internal wall
    /// present on both of its cells and the outer boundary fully closed.
    pub fn from_cells(size: usize, cells: &[[bool; 4]]) -> Result<Self, MctsError>{
        if size == 0 {
            return Err(MctsError::BoardTooSmall(size));
        }
        if cells.len() != size * size {
            return Err(MctsError::CellCountMismatch { expected: size * size, actual: cells.len() });
        }

        let packed = cells.iter()
            .map(|flags| {
                Direction::ALL.iter()
                    .filter(|d| flags[d.index()])
                    .fold(0u8, |acc, d| acc | d.bit())
            })
            .collect::<Vec<_>>();

        let board = Board { size, cells: packed.into_boxed_slice() };

        for row in 0..size {
            for col in 0..size {
                let position = Position::new(row, col);
                for direction in Direction::ALL {
                    let wall = board.has_wall(position, direction);
                    // A one-sided wall is reported from the cell that carries it.
                    match board.neighbor(position, direction) {
                        None if !wall => return Err(MctsError::OpenBoundary { position, direction }),
                        Some(other) if wall && !board.has_wall(other, direction.opposite()) => {
                            return Err(MctsError::AsymmetricWall { position, direction });
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(board)
    }

    /// Side length of the board.
    #[inline]
    pub fn size(&self) -> usize{
        self.size
    }

    /// Number of cells, `size * size`.
    #[inline]
    pub fn cell_count(&self) -> usize{
        self.cells.len()
    }

    /// Checks whether a position lies on the board.
    ///
    /// # Returns
    /// `true` if both coordinates are below the board size.
    #[inline]
    pub fn contains(&self, position: Position) -> bool{
        position.row < self.size && position.col < self.size
    }

    /// Row-major index of a cell.
    ///
    /// The position must be on the board; every accessor taking a
    /// `Position` goes through here.
    #[inline]
    pub fn index(&self, position: Position) -> usize{
        debug_assert!(self.contains(position), "position {} is outside a {}x{} board", position, self.size, self.size);
        position.row * self.size + position.col
    }

    /// Inverse of `index`.
    ///
    /// # Parameters
    /// - `index`: row-major cell index, below `cell_count()`.
    #[inline]
    pub fn position(&self, index: usize) -> Position{
        Position::new(index / self.size, index % self.size)
    }

    /// Adjacent cell in `direction`, or `None` past the edge.
    #[inline]
    pub fn neighbor(&self, position: Position, direction: Direction) -> Option<Position>{
        let Position { row, col } = position;
        match direction {
            Direction::Up if row > 0 => Some(Position::new(row - 1, col)),
            Direction::Right if col + 1 < self.size => Some(Position::new(row, col + 1)),
            Direction::Down if row + 1 < self.size => Some(Position::new(row + 1, col)),
            Direction::Left if col > 0 => Some(Position::new(row, col - 1)),
            _ => None
        }
    }

    /// Returns true when the given side of the cell is walled.
    #[inline]
    pub fn has_wall(&self, position: Position, direction: Direction) -> bool{
        self.cells[self.index(position)] & direction.bit() != 0
    }

    /// Returns true when every side of the cell is walled.
    #[inline]
    pub fn is_enclosed(&self, position: Position) -> bool{
        self.cells[self.index(position)] & ALL_WALLS == ALL_WALLS
    }

    /// Sides of a cell that can still receive a wall.
    pub fn open_sides(&self, position: Position) -> impl Iterator<Item = Direction> + '_{
        let walls = self.cells[self.index(position)];
        Direction::ALL.into_iter().filter(move |d| walls & d.bit() == 0)
    }

    /// Places a wall on one side of a cell and the matching side of its neighbour.
    ///
    /// # Parameters
    /// - `position`: a cell on the board.
    /// - `direction`: the side to wall; already walled sides are left as is.
    pub fn place_wall(&mut self, position: Position, direction: Direction){
        let index = self.index(position);
        self.cells[index] |= direction.bit();

        if let Some(other) = self.neighbor(position, direction) {
            let index = self.index(other);
            self.cells[index] |= direction.opposite().bit();
        }
    }

    /// Cell reached by stepping once in `direction`, if no wall is in the way.
    #[inline]
    pub fn step(&self, position: Position, direction: Direction) -> Option<Position>{
        if self.has_wall(position, direction) {
            None
        }
        else {
            self.neighbor(position, direction)
        }
    }

    /// Wall flags of every cell, row-major, ordered up, right, down, left.
    pub fn to_cells(&self) -> Vec<[bool; 4]>{
        self.cells.iter()
            .map(|walls| std::array::from_fn(|i| walls & (1 << i) != 0))
            .collect()
    }
}

impl fmt::Debug for Board{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Board({}x{})", self.size, self.size)?;
        for row in 0..self.size {
            for col in 0..self.size {
                write!(f, "{:x}", self.cells[self.index(Position::new(row, col))])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
