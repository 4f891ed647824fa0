//! Per-turn entry point used by the game driver.

use std::time::{Duration, Instant};

use log::debug;

use crate::{Board, Mcts, MctsConfig, MctsError, Move, Position};

/// A player of the wall game.
pub trait Agent{
    /// Returns the move to play: where to go and which side of that cell to wall.
    ///
    /// # Parameters
    /// - `board`: the live wall grid.
    /// - `my_pos`: this player's cell.
    /// - `adv_pos`: the opponent's cell.
    /// - `max_step`: how many cells a move may walk.
    fn step(&mut self, board: &Board, my_pos: Position, adv_pos: Position, max_step: usize) -> Result<Move, MctsError>;
}

/// Agent backed by a search tree kept for the whole game.
///
/// The first turn gets a long search budget to grow the tree; later turns
/// re-root it on the live position and search for a short budget.
pub struct MctsAgent{
    mcts: Mcts,
    first_turn_budget: Duration,
    turn_budget: Duration,
    turns: usize
}

impl MctsAgent{
    /// Creates an agent with the default configuration.
    pub fn new() -> Self{
        Self::from_config(&MctsConfig::DEFAULT)
    }

    /// Creates an agent from a configuration.
    ///
    /// # Parameters
    /// - `config`: search settings and the first-turn and later-turn budgets.
    pub fn from_config(config: &MctsConfig) -> Self{
        MctsAgent {
            mcts: Mcts::from_config(config),
            first_turn_budget: config.first_turn_budget,
            turn_budget: config.turn_budget,
            turns: 0
        }
    }

    /// The search driving this agent.
    #[inline]
    pub fn mcts(&self) -> &Mcts{
        &self.mcts
    }

    /// Number of moves selected so far.
    #[inline]
    pub fn turns(&self) -> usize{
        self.turns
    }

    /// Searches the live position within this turn's budget and returns a legal move.
    ///
    /// # Returns
    /// An error only for malformed input: positions off the board or on
    /// the same cell.
    pub fn select_move(&mut self, board: &Board, my_pos: Position, adv_pos: Position, max_step: usize) -> Result<Move, MctsError>{
        let started = Instant::now();
        let budget = if self.turns == 0 { self.first_turn_budget } else { self.turn_budget };

        let reused = self.mcts.set_root(board.clone(), my_pos, adv_pos, max_step)?;
        let iterations = self.mcts.search_until(started + budget)?;
        let mv = self.mcts.choose()?;

        self.turns += 1;
        let value = self.mcts.root_statistics()
            .iter()
            .find(|stats| stats.mv == mv)
            .map_or(0.0, |stats| stats.value);
        debug!(
            "turn {}: {} iterations in {:?} of {:?} (root reused: {}, root visits: {}, tree size: {}), playing {} ({:.3})",
            self.turns,
            iterations,
            started.elapsed(),
            budget,
            reused,
            self.mcts.root_visits(),
            self.mcts.tree_size(),
            mv,
            value
        );

        Ok(mv)
    }
}

impl Default for MctsAgent{
    fn default() -> Self{
        Self::new()
    }
}

impl Agent for MctsAgent{
    fn step(&mut self, board: &Board, my_pos: Position, adv_pos: Position, max_step: usize) -> Result<Move, MctsError>{
        self.select_move(board, my_pos, adv_pos, max_step)
    }
}
