//! A Monte Carlo Tree Search (MCTS) agent for a two-player wall game.
//!
//! Players stand on an N×N grid. A turn walks up to `max_step` cells,
//! never through a wall or onto the opponent, then places one new wall on a
//! side of the destination. The game ends when the walls split the board
//! and the players can no longer reach each other; the larger region wins.
//!
//! # Modules
//! - `game`: Board geometry, positions and the wall grid.
//! - `state`: Positions as stored in the search tree.
//! - `connectivity`: Union-find partition test and scoring.
//! - `moves`: Full legal move enumeration and the rollout sampler.
//! - `tree`: Search tree storage with a state index.
//! - `mcts`: The time-budgeted UCT search.
//! - `agent`: Per-turn entry point keeping the tree across a game.
//! - `utils`: Contains general utility functions.
//! - `test_utils`: Board fixtures for testing.
//!
//! # Examples
//! ```rust
//! use std::time::Duration;
//! use wall_mcts::{Board, MctsAgent, MctsConfig, MctsError, Position};
//!
//! fn main() -> Result<(), MctsError> {
//!     let config = MctsConfig::DEFAULT
//!         .with_first_turn_budget(Duration::from_millis(200))
//!         .with_seed(7);
//!     let mut agent = MctsAgent::from_config(&config);
//!
//!     let board = Board::new(5)?;
//!     let me = Position::new(0, 0);
//!     let mv = agent.select_move(&board, me, Position::new(4, 4), 2)?;
//!
//!     assert!(mv.position.manhattan(me) <= 2);
//!     assert!(!board.has_wall(mv.position, mv.direction));
//!     Ok(())
//! }
//! ```

mod game;
mod state;
mod connectivity;
mod tree;
mod mcts;
mod agent;
pub mod moves;
pub mod utils;

#[doc(hidden)]
pub mod test_utils;

pub use game::*;
pub use state::*;
pub use connectivity::*;
pub use tree::*;
pub use mcts::*;
pub use agent::*;
pub use moves::Move;
