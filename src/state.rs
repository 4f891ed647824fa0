//! Game state as stored in the search tree.

use std::hash::{Hash, Hasher};

use crate::{Board, Direction, Move, Position};

/// Snapshot of a position: the wall grid plus both players.
///
/// `mover` and `opponent` are roles, not identities. A state handed to
/// the move generator has `mover` about to move; a generated child keeps
/// the same `mover`, now standing on its destination with the new wall
/// placed. Every transition between turns is a role swap.
///
/// Equality and hashing only look at the walls and the two positions.
#[derive(Clone, Debug)]
pub struct State{
    board: Board,
    mover: Position,
    opponent: Position,
    step_budget: usize,
    placed: Option<Direction>
}

impl State{
    /// Creates a root state with no placing direction.
    ///
    /// Positions are assumed to be validated by the caller.
    pub fn new(board: Board, mover: Position, opponent: Position, step_budget: usize) -> Self{
        State { board, mover, opponent, step_budget, placed: None }
    }

    /// The wall grid.
    #[inline]
    pub fn board(&self) -> &Board{
        &self.board
    }

    /// Cell of the player in the mover role.
    #[inline]
    pub fn mover(&self) -> Position{
        self.mover
    }

    /// Cell of the other player.
    #[inline]
    pub fn opponent(&self) -> Position{
        self.opponent
    }

    /// Maximum number of cells a move may walk.
    #[inline]
    pub fn step_budget(&self) -> usize{
        self.step_budget
    }

    /// Wall direction placed to create this state, `None` for a root.
    #[inline]
    pub fn placed(&self) -> Option<Direction>{
        self.placed
    }

    /// The move that produced this state, if any.
    #[inline]
    pub fn last_move(&self) -> Option<Move>{
        self.placed.map(|direction| Move::new(self.mover, direction))
    }

    /// Exchanges the mover and opponent roles in place.
    #[inline]
    pub fn swap_roles(&mut self){
        std::mem::swap(&mut self.mover, &mut self.opponent);
    }

    /// Copy of this state with the roles exchanged.
    pub fn swapped(&self) -> State{
        let mut state = self.clone();
        state.swap_roles();
        state
    }

    /// Moves the mover to the move's cell and places its wall.
    ///
    /// The move is assumed legal for this state.
    pub fn apply(&mut self, mv: Move){
        self.mover = mv.position;
        self.board.place_wall(mv.position, mv.direction);
        self.placed = Some(mv.direction);
    }

    /// Independent copy of this state with `mv` applied.
    pub fn child(&self, mv: Move) -> State{
        let mut state = self.clone();
        state.apply(mv);
        state
    }
}

impl PartialEq for State{
    fn eq(&self, other: &Self) -> bool {
        self.mover == other.mover && self.opponent == other.opponent && self.board == other.board
    }
}

impl Eq for State {}

impl Hash for State{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mover.hash(state);
        self.opponent.hash(state);
        self.board.hash(state);
    }
}
