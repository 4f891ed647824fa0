//! Board fixtures for tests

use rand::Rng;

use crate::{Board, Direction, Position};

/// Open board with walls on the right side of `col` for the first `rows` rows.
pub fn wall_column(size: usize, col: usize, rows: usize) -> Board {
    let mut board = Board::new(size).expect("board size");

    for row in 0..rows {
        board.place_wall(Position::new(row, col), Direction::Right);
    }

    board
}

/// Board cut into two equal halves by a full vertical wall.
pub fn split_board(size: usize) -> Board {
    wall_column(size, size / 2 - 1, size)
}

/// Board of side `size` with `walls` random wall placements, plus two
/// distinct player cells.
pub fn random_board<R: Rng + ?Sized>(rng: &mut R, size: usize, walls: usize) -> (Board, Position, Position) {
    let mut board = Board::new(size).expect("board size");

    for _ in 0..walls {
        let position = Position::new(rng.random_range(0..size), rng.random_range(0..size));
        board.place_wall(position, Direction::ALL[rng.random_range(0..4)]);
    }

    let mover = Position::new(rng.random_range(0..size), rng.random_range(0..size));
    let opponent = loop {
        let position = Position::new(rng.random_range(0..size), rng.random_range(0..size));
        if position != mover {
            break position;
        }
    };

    (board, mover, opponent)
}
