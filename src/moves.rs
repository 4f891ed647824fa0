//! Legal move generation.
//!
//! A move walks the mover up to `step_budget` cells, never through a wall,
//! onto the opponent, or back onto a cell already walked in the same move,
//! then places one new wall on a side of the destination cell.

use std::fmt;

use rand::Rng;

use crate::{Board, Direction, Position, State};

/// A turn: where the mover ends up and which side of that cell gets a wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move{
    pub position: Position,
    pub direction: Direction
}

impl Move{
    /// Creates a move ending on `position` and walling its `direction` side.
    #[inline]
    pub const fn new(position: Position, direction: Direction) -> Self{
        Move { position, direction }
    }
}

impl fmt::Display for Move{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.position, self.direction)
    }
}

/// Cells already walked during the move being built.
struct PathVisited{
    cells: Vec<bool>
}

impl PathVisited{
    fn new(board: &Board, start: Position) -> Self{
        let mut cells = vec![false; board.cell_count()];
        cells[board.index(start)] = true;
        PathVisited { cells }
    }

    /// Marks a cell, returning false if it was already walked.
    #[inline]
    fn insert(&mut self, board: &Board, position: Position) -> bool{
        let cell = &mut self.cells[board.index(position)];
        !std::mem::replace(cell, true)
    }
}

/// Every destination the mover can reach, nearest first.
///
/// The start cell is always included: a move may skip walking and only
/// place a wall. Cells are expanded level by level, one level per step of
/// budget, and a cell first reached at a smaller budget is never expanded again.
pub fn reachable(state: &State) -> Vec<Position>{
    let board = state.board();
    let opponent = state.opponent();
    let mut visited = PathVisited::new(board, state.mover());

    let mut cells = vec![state.mover()];
    let mut start = 0;

    for _ in 0..state.step_budget() {
        let end = cells.len();
        if start == end {
            break;
        }

        for i in start..end {
            let position = cells[i];
            for direction in Direction::ALL {
                if let Some(next) = board.step(position, direction) {
                    if next != opponent && visited.insert(board, next) {
                        cells.push(next);
                    }
                }
            }
        }

        start = end;
    }

    cells
}

/// All legal moves of the mover.
pub fn legal_moves(state: &State) -> Vec<Move>{
    let board = state.board();

    reachable(state).into_iter()
        .flat_map(move |position| board.open_sides(position).map(move |direction| Move::new(position, direction)))
        .collect()
}

/// One child state per legal move.
///
/// Destinations are distinct and each carries distinct walls, so no two
/// children compare equal.
pub fn children(state: &State) -> Vec<State>{
    legal_moves(state).into_iter()
        .map(|mv| state.child(mv))
        .collect()
}

/// Checks a move against the full rules for this state.
pub fn is_legal(state: &State, mv: Move) -> bool{
    let board = state.board();

    board.contains(mv.position)
        && !board.has_wall(mv.position, mv.direction)
        && reachable(state).contains(&mv.position)
}

/// Draws one legal move quickly, for rollouts.
///
/// Walks a uniformly drawn number of steps in random open directions, then
/// walls a random open side of the final cell. A step never crosses a wall
/// or enters the opponent's cell; if the walker gets boxed in, the walk is
/// abandoned and the mover stays put. Revisits during the walk are allowed,
/// they never make the final cell unreachable within the budget.
///
/// Not uniform over the legal moves. Returns `None` only when the mover's
/// own cell is fully walled, which cannot happen before the game is over.
pub fn random_move<R: Rng + ?Sized>(state: &State, rng: &mut R) -> Option<Move>{
    let board = state.board();
    let opponent = state.opponent();
    let start = state.mover();

    let steps = rng.random_range(0..=state.step_budget());
    let mut position = start;

    for _ in 0..steps {
        let mut options = [position; 4];
        let mut count = 0;

        for direction in Direction::ALL {
            if let Some(next) = board.step(position, direction) {
                if next != opponent {
                    options[count] = next;
                    count += 1;
                }
            }
        }

        if count == 0 {
            position = start;
            break;
        }

        position = options[rng.random_range(0..count)];
    }

    random_wall(board, position, rng)
        .or_else(|| random_wall(board, start, rng))
}

fn random_wall<R: Rng + ?Sized>(board: &Board, position: Position, rng: &mut R) -> Option<Move>{
    let mut options = [Direction::Up; 4];
    let mut count = 0;

    for direction in board.open_sides(position) {
        options[count] = direction;
        count += 1;
    }

    if count == 0 {
        None
    }
    else {
        Some(Move::new(position, options[rng.random_range(0..count)]))
    }
}
