//! Implementation of Monte Carlo Tree Search (MCTS) with random rollouts.
//!
//! Each iteration selects a leaf with the UCT tree policy, expands it with
//! every legal reply, plays a random game to the end from it and
//! backpropagates the result. The tree outlives a single search: it is
//! re-rooted on the live position at every turn so earlier work is reused.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use thiserror::Error;

use crate::{moves, utils, Board, ConnectivityScorer, Direction, Move, NodeId, Position, SearchTree, State};

/// Function used to rank visited children during selection.
///
/// Parameters:
/// - `value`: mean reward of the child.
/// - `n_visits`: visits of the child, always at least one.
/// - `parent_n_visits`: visits of the parent.
/// - `exploration_coef`: the exploration coefficient from `MctsConfig`.
pub type SelectionFunction = fn(value: f64, n_visits: f64, parent_n_visits: f64, exploration_coef: f64) -> f64;

/// Upper Confidence bound applied to Trees.
///
/// `value + c * sqrt(ln(parent_n_visits) / n_visits)`
pub fn uct(value: f64, n_visits: f64, parent_n_visits: f64, exploration_coef: f64) -> f64{
    value + exploration_coef * (parent_n_visits.ln() / n_visits).sqrt()
}

/// Errors returned by the search.
///
/// The search itself never fails once it has a valid root; these only
/// report malformed input or calls made out of order.
#[derive(Debug, Error)]
pub enum MctsError{
    #[error("board side must be at least 1, got {0}")]
    BoardTooSmall(usize),

    #[error("expected {expected} cells, got {actual}")]
    CellCountMismatch{ expected: usize, actual: usize },

    #[error("wall on the {direction:?} side of {position} is not mirrored on its neighbour")]
    AsymmetricWall{ position: Position, direction: Direction },

    #[error("boundary side {direction:?} of {position} has no wall")]
    OpenBoundary{ position: Position, direction: Direction },

    #[error("position {0} is outside the board")]
    OutOfBounds(Position),

    #[error("both players are on {0}")]
    PlayersOverlap(Position),

    #[error("search root not initialized")]
    RootNotInitialized,

    #[error("the player to move has no legal move")]
    NoLegalMove
}

/// Configuration of the search and of the per-turn time budgets.
#[derive(Clone, Debug)]
pub struct MctsConfig{
    /// The exploration coefficient `C` of the UCT formula.
    pub exploration_coef: f64,
    /// Score used to pick among visited children during selection.
    pub selection_function: SelectionFunction,
    /// Search time on the first turn, when the tree starts empty.
    pub first_turn_budget: Duration,
    /// Search time on every later turn.
    pub turn_budget: Duration,
    /// Seed for rollouts and fallback moves; `None` seeds from the OS.
    pub seed: Option<u64>
}

impl MctsConfig{
    /// The default configuration.
    ///
    /// - `exploration_coef`: `1.0`.
    /// - `selection_function`: `uct`.
    /// - `first_turn_budget`: 28 seconds.
    /// - `turn_budget`: 1.5 seconds.
    /// - `seed`: none.
    pub const DEFAULT: MctsConfig = MctsConfig{
        exploration_coef: 1.0,
        selection_function: uct,
        first_turn_budget: Duration::from_secs(28),
        turn_budget: Duration::from_millis(1500),
        seed: None
    };

    /// Sets the exploration coefficient `C`.
    ///
    /// # Parameters
    /// - `exploration_coef`: weight of the exploration term, `0.0` for pure exploitation.
    ///
    /// # Returns
    /// The updated configuration.
    pub fn with_exploration_coef(mut self, exploration_coef: f64) -> Self{
        self.exploration_coef = exploration_coef;
        self
    }

    /// Replaces the score used to rank visited children.
    pub fn with_selection_function(mut self, selection_function: SelectionFunction) -> Self{
        self.selection_function = selection_function;
        self
    }

    /// Sets the search time of the first turn.
    pub fn with_first_turn_budget(mut self, budget: Duration) -> Self{
        self.first_turn_budget = budget;
        self
    }

    /// Sets the search time of every turn after the first.
    pub fn with_turn_budget(mut self, budget: Duration) -> Self{
        self.turn_budget = budget;
        self
    }

    /// Fixes the random seed, making searches reproducible for a given
    /// number of iterations.
    pub fn with_seed(mut self, seed: u64) -> Self{
        self.seed = Some(seed);
        self
    }
}

impl Default for MctsConfig{
    fn default() -> Self{
        Self::DEFAULT
    }
}

/// Search statistics of one move available at the root.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChildStatistics{
    pub mv: Move,
    pub visits: u32,
    pub value: f64
}

/// Monte Carlo Tree Search over the wall game.
///
/// Tree nodes are keyed from the side of the player who just moved, and
/// each node's reward is counted for that player. The root therefore holds
/// the live position with the opponent as the player who moved last, and
/// its children are the moves of the player the search is run for.
pub struct Mcts{
    tree: SearchTree,
    root: Option<NodeId>,
    scorer: ConnectivityScorer,
    rng: StdRng,
    coef: f64,
    selection_function: SelectionFunction
}

impl Mcts{
    /// Creates a search with the default configuration.
    #[inline]
    pub fn new() -> Self{
        Self::from_config(&MctsConfig::DEFAULT)
    }

    /// Creates a search from a configuration.
    ///
    /// # Parameters
    /// - `config`: exploration settings and seed; the time budgets are
    ///   only read by `MctsAgent`.
    ///
    /// # Returns
    /// A search with an empty tree and no root.
    pub fn from_config(config: &MctsConfig) -> Self{
        Mcts {
            tree: SearchTree::new(),
            root: None,
            scorer: ConnectivityScorer::new(),
            rng: utils::rng_from_seed(config.seed),
            coef: config.exploration_coef,
            selection_function: config.selection_function
        }
    }

    /// Points the search at the live position, `mover` to play.
    ///
    /// When the position is already in the tree (the opponent answered with
    /// a move the search had generated) its node and subtree are reused;
    /// otherwise a fresh root is added. The rest of the tree is kept either
    /// way, and expansion picks known states back up through the index.
    ///
    /// # Returns
    /// `Ok(true)` if an existing node became the root.
    pub fn set_root(&mut self, board: Board, mover: Position, opponent: Position, step_budget: usize) -> Result<bool, MctsError>{
        validate(&board, mover, opponent)?;

        // The opponent is the player who moved last.
        let live = State::new(board, opponent, mover, step_budget);

        let reused = match self.tree.find(&live) {
            Some(id) => {
                debug!("re-rooting on known position ({} visits)", self.tree.get(id).stats().get_n());
                self.root = Some(id);
                true
            }
            None => {
                debug!("live position not in tree, adding a fresh root");
                self.root = Some(self.tree.insert(live));
                false
            }
        };

        Ok(reused)
    }

    /// The underlying search tree.
    #[inline]
    pub fn tree(&self) -> &SearchTree{
        &self.tree
    }

    /// Id of the current root, `None` before the first `set_root`.
    #[inline]
    pub fn root(&self) -> Option<NodeId>{
        self.root
    }

    /// Visits of the current root, 0 without a root.
    pub fn root_visits(&self) -> u32{
        self.root.map_or(0, |root| self.tree.get(root).stats().get_n())
    }

    /// Number of distinct states stored in the tree.
    #[inline]
    pub fn tree_size(&self) -> usize{
        self.tree.len()
    }

    /// Returns true when the root position has already ended the game.
    pub fn is_finish(&self) -> bool{
        self.root.is_some_and(|root| self.tree.get(root).is_terminal())
    }

    /// Selection: walks down from the root to the node to expand and simulate.
    ///
    /// Children are checked against their parent's walls on the way; a child
    /// placing a wall that already exists there is dropped for good.
    fn selection(&mut self, root: NodeId) -> Vec<NodeId>{
        let mut path = vec![root];
        let mut node = root;

        loop {
            if !self.tree.is_expanded(node) || self.tree.get(node).children().is_empty() {
                return path;
            }

            while let Some(child) = self.tree.unexplored_child(node) {
                if self.is_stale(node, child) {
                    self.prune(node, child);
                    continue;
                }

                path.push(child);
                return path;
            }

            loop {
                let Some(child) = self.tree.uct_child(node, self.coef, self.selection_function) else {
                    return path;
                };

                if self.is_stale(node, child) {
                    self.prune(node, child);
                    continue;
                }

                node = child;
                path.push(child);
                break;
            }
        }
    }

    /// A child no longer fits its parent if its wall is already on the
    /// parent's board or it was built against a different opponent cell.
    fn is_stale(&self, parent: NodeId, child: NodeId) -> bool{
        let parent = self.tree.get(parent).state();
        let child = self.tree.get(child).state();

        match child.last_move() {
            Some(mv) => child.opponent() != parent.mover() || parent.board().has_wall(mv.position, mv.direction),
            None => true
        }
    }

    fn prune(&mut self, parent: NodeId, child: NodeId){
        trace!("pruning stale child {:?}", self.tree.get(child).state().last_move());
        self.tree.remove_child(parent, child);
    }

    /// Expansion: adds the leaf's replies to the tree, or marks it terminal.
    #[inline]
    fn expansion(&mut self, leaf: NodeId){
        self.tree.expand(leaf, &mut self.scorer);
    }

    /// Simulation: reward of the leaf for the player who moved into it.
    ///
    /// Plays random moves on a private copy of the leaf, swapping roles
    /// after every move, until the board splits. `ours` tracks whether the
    /// player who just moved is the one the reward is counted for.
    fn simulation(&mut self, leaf: NodeId) -> f64{
        let node = self.tree.get(leaf);
        if let Some(outcome) = node.outcome() {
            return outcome;
        }

        let mut state = node.state().clone();
        let mut ours = true;

        loop {
            state.swap_roles();

            // A boxed-in mover means the game was already over.
            let Some(mv) = moves::random_move(&state, &mut self.rng) else {
                return ConnectivityScorer::TIE;
            };

            state.apply(mv);
            ours = !ours;

            if let Some(outcome) = self.scorer.score(state.board(), state.mover(), state.opponent()) {
                return if ours { outcome } else { 1.0 - outcome };
            }
        }
    }

    /// Backpropagation: credits every node of the path, flipping the reward
    /// between levels since consecutive levels belong to opposite players.
    fn backpropagation(&mut self, path: &[NodeId], mut reward: f64){
        for &id in path.iter().rev() {
            self.tree.add_score(id, reward);
            reward = 1.0 - reward;
        }
    }

    /// Performs one full iteration: selection, expansion, simulation, backpropagation.
    ///
    /// # Returns
    /// `Err(MctsError::RootNotInitialized)` if `set_root` was never called.
    pub fn iterate(&mut self) -> Result<(), MctsError>{
        let root = self.root.ok_or(MctsError::RootNotInitialized)?;

        let path = self.selection(root);
        let leaf = path[path.len() - 1];

        self.expansion(leaf);
        let reward = self.simulation(leaf);
        self.backpropagation(&path, reward);

        Ok(())
    }

    /// Runs a fixed number of iterations.
    pub fn search_iterations(&mut self, iterations: usize) -> Result<(), MctsError>{
        for _ in 0..iterations {
            self.iterate()?;
        }
        Ok(())
    }

    /// Iterates until `deadline`. An iteration in progress always finishes,
    /// so the deadline can be overrun by one iteration.
    ///
    /// Stops early once the root is known to end the game, since further
    /// iterations would only replay its cached outcome.
    ///
    /// # Parameters
    /// - `deadline`: instant after which no new iteration starts.
    ///
    /// # Returns
    /// The number of iterations run.
    pub fn search_until(&mut self, deadline: Instant) -> Result<usize, MctsError>{
        let mut iterations = 0;

        while Instant::now() < deadline {
            self.iterate()?;
            iterations += 1;

            if self.is_finish() {
                debug!("root position is terminal, stopping after {} iterations", iterations);
                break;
            }
        }

        Ok(iterations)
    }

    /// Picks the move to play: the root child with the best average reward.
    ///
    /// Falls back to a random legal move when the root has no visited
    /// children to choose from (never expanded, terminal or pruned empty).
    pub fn choose(&mut self) -> Result<Move, MctsError>{
        let root = self.root.ok_or(MctsError::RootNotInitialized)?;

        let best = self.tree.best_child(root)
            .and_then(|child| self.tree.get(child).state().last_move());

        if let Some(mv) = best {
            return Ok(mv);
        }

        warn!("no searched move at the root, playing a random one");
        let to_move = self.tree.get(root).state().swapped();
        moves::random_move(&to_move, &mut self.rng).ok_or(MctsError::NoLegalMove)
    }

    /// Visits and average reward of every move at the root.
    pub fn root_statistics(&self) -> Vec<ChildStatistics>{
        let Some(root) = self.root else {
            return Vec::new();
        };

        self.tree.get(root).children()
            .iter()
            .filter_map(|&child| {
                let node = self.tree.get(child);
                node.state().last_move().map(|mv| ChildStatistics {
                    mv,
                    visits: node.stats().get_n(),
                    value: node.stats().get_value()
                })
            })
            .collect()
    }
}

impl Default for Mcts{
    fn default() -> Self{
        Self::new()
    }
}

fn validate(board: &Board, mover: Position, opponent: Position) -> Result<(), MctsError>{
    for position in [mover, opponent] {
        if !board.contains(position) {
            return Err(MctsError::OutOfBounds(position));
        }
    }
    if mover == opponent {
        return Err(MctsError::PlayersOverlap(mover));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::{test_utils::wall_column, NodeStats};

    fn seeded() -> Mcts{
        Mcts::from_config(&MctsConfig::DEFAULT.with_seed(42))
    }

    #[test]
    fn test_uct_monotonic(){
        // Equal visits: higher value scores higher.
        assert!(uct(0.7, 10., 100., 1.0) > uct(0.6, 10., 100., 1.0));
        // Equal value: fewer visits scores higher.
        assert!(uct(0.5, 5., 100., 1.0) > uct(0.5, 20., 100., 1.0));
        assert_approx_eq!(uct(0.25, 4., 1., 1.0), 0.25);
        assert_approx_eq!(uct(0.5, 1., std::f64::consts::E, 2.0), 2.5);
    }

    #[test]
    fn test_config_builder(){
        let config = MctsConfig::default()
            .with_exploration_coef(2.0)
            .with_first_turn_budget(Duration::from_millis(10))
            .with_turn_budget(Duration::from_millis(5))
            .with_seed(1);

        assert_eq!(config.exploration_coef, 2.0);
        assert_eq!(config.first_turn_budget, Duration::from_millis(10));
        assert_eq!(config.turn_budget, Duration::from_millis(5));
        assert_eq!(config.seed, Some(1));
        assert_eq!(MctsConfig::DEFAULT.exploration_coef, 1.0);
    }

    #[test]
    fn test_iterate_without_root(){
        let mut mcts = seeded();

        assert!(matches!(mcts.iterate(), Err(MctsError::RootNotInitialized)));
        assert!(matches!(mcts.choose(), Err(MctsError::RootNotInitialized)));
        assert_eq!(mcts.root_visits(), 0);
        assert!(mcts.root_statistics().is_empty());
    }

    #[test]
    fn test_set_root_validation(){
        let mut mcts = seeded();
        let board = Board::new(3).unwrap();

        assert!(matches!(
            mcts.set_root(board.clone(), Position::new(3, 0), Position::new(0, 0), 1),
            Err(MctsError::OutOfBounds(_))
        ));
        assert!(matches!(
            mcts.set_root(board, Position::new(1, 1), Position::new(1, 1), 1),
            Err(MctsError::PlayersOverlap(_))
        ));
        assert!(mcts.root().is_none());
    }

    #[test]
    fn test_first_iteration_expands_root() -> Result<(), MctsError>{
        let mut mcts = seeded();
        assert!(!mcts.set_root(Board::new(5)?, Position::new(0, 0), Position::new(4, 4), 2)?);

        mcts.iterate()?;

        let root = mcts.root().unwrap();
        assert!(mcts.tree().is_expanded(root));
        assert_eq!(mcts.root_visits(), 1);
        assert_eq!(mcts.tree().get(root).children().len(), 18);
        assert!(!mcts.is_finish());

        mcts.search_iterations(99)?;
        assert_eq!(mcts.root_visits(), 100);

        let visits: u32 = mcts.root_statistics().iter().map(|s| s.visits).sum();
        assert_eq!(visits, 99);
        Ok(())
    }

    #[test]
    fn test_backpropagation_alternates() -> Result<(), MctsError>{
        let mut mcts = seeded();
        mcts.set_root(Board::new(4)?, Position::new(0, 0), Position::new(3, 3), 1)?;
        mcts.search_iterations(200)?;

        let root = mcts.root().unwrap();
        let path = mcts.selection(root);
        assert!(path.len() >= 3);

        let before: Vec<NodeStats> = path.iter().map(|&id| *mcts.tree().get(id).stats()).collect();
        mcts.backpropagation(&path, 0.8);

        let deltas: Vec<f64> = path.iter().zip(&before)
            .map(|(&id, old)| {
                let stats = mcts.tree().get(id).stats();
                assert_eq!(stats.get_n(), old.get_n() + 1);
                stats.get_score() - old.get_score()
            })
            .collect();

        assert_approx_eq!(deltas[path.len() - 1], 0.8);
        for pair in deltas.windows(2) {
            assert_approx_eq!(pair[0] + pair[1], 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_simulation_rewards() -> Result<(), MctsError>{
        let mut mcts = seeded();
        mcts.set_root(Board::new(4)?, Position::new(1, 1), Position::new(2, 2), 2)?;
        mcts.iterate()?;

        let root = mcts.root().unwrap();
        let child = mcts.tree().get(root).children()[0];
        mcts.expansion(child);

        for _ in 0..100 {
            let reward = mcts.simulation(child);
            assert!(reward == 0.0 || reward == 0.5 || reward == 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_simulation_reward_is_for_leaf_mover() -> Result<(), MctsError>{
        // The opponent on (0, 0) has a single open side and no steps, so its
        // only reply walls itself into one cell: the leaf's mover wins.
        let mut board = Board::new(4)?;
        board.place_wall(Position::new(0, 0), Direction::Right);
        let mut mcts = seeded();
        let leaf = mcts.tree.insert(State::new(board, Position::new(3, 3), Position::new(0, 0), 0));

        for _ in 0..20 {
            assert_eq!(mcts.simulation(leaf), 1.0);
        }

        mcts.expansion(leaf);
        assert!(!mcts.tree().get(leaf).is_terminal());
        assert_eq!(mcts.tree().get(leaf).children().len(), 1);
        Ok(())
    }

    #[test]
    fn test_search_until_stops_on_finished_root() -> Result<(), MctsError>{
        let mut mcts = seeded();
        mcts.set_root(wall_column(4, 1, 4), Position::new(0, 3), Position::new(0, 0), 1)?;

        let started = Instant::now();
        let iterations = mcts.search_until(started + Duration::from_secs(30))?;

        assert_eq!(iterations, 1);
        assert!(mcts.is_finish());
        assert!(started.elapsed() < Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn test_stale_child_is_pruned() -> Result<(), MctsError>{
        let mut mcts = seeded();
        let mut board = Board::new(4)?;
        board.place_wall(Position::new(0, 1), Direction::Down);
        mcts.set_root(board, Position::new(0, 0), Position::new(3, 3), 1)?;
        mcts.iterate()?;

        // A move re-placing a wall the board already has.
        let root = mcts.root().unwrap();
        let mut stale = mcts.tree().get(root).state().swapped();
        stale.apply(Move::new(Position::new(0, 1), Direction::Down));
        let stale = mcts.tree.insert(stale);
        mcts.tree.push_front_child(root, stale);

        let path = mcts.selection(root);

        assert_ne!(path[1], stale);
        assert!(!mcts.tree().get(root).children().contains(&stale));
        Ok(())
    }

    #[test]
    fn test_choose_on_open_board() -> Result<(), MctsError>{
        let mut mcts = seeded();
        let board = Board::new(5)?;
        let (mover, opponent) = (Position::new(0, 0), Position::new(4, 4));
        mcts.set_root(board.clone(), mover, opponent, 2)?;
        mcts.search_iterations(300)?;

        let mv = mcts.choose()?;
        let state = State::new(board, mover, opponent, 2);

        assert!(mv.position.manhattan(mover) <= 2);
        assert!(moves::is_legal(&state, mv));

        let next = state.child(mv);
        let mut scorer = ConnectivityScorer::new();
        assert_eq!(scorer.score(next.board(), next.mover(), next.opponent()), None);
        Ok(())
    }

    #[test]
    fn test_choose_fallback_without_search() -> Result<(), MctsError>{
        let mut mcts = seeded();
        let board = Board::new(4)?;
        let state = State::new(board.clone(), Position::new(1, 1), Position::new(2, 2), 1);
        mcts.set_root(board, Position::new(1, 1), Position::new(2, 2), 1)?;

        for _ in 0..20 {
            let mv = mcts.choose()?;
            assert!(moves::is_legal(&state, mv));
        }
        Ok(())
    }

    #[test]
    fn test_choose_on_finished_position() -> Result<(), MctsError>{
        let mut mcts = seeded();
        let board = wall_column(4, 1, 4);
        mcts.set_root(board, Position::new(0, 3), Position::new(0, 0), 1)?;
        mcts.search_iterations(5)?;

        assert!(mcts.is_finish());
        assert!(mcts.root_statistics().is_empty());

        let mv = mcts.choose()?;
        assert!(mv.position.manhattan(Position::new(0, 3)) <= 1);
        Ok(())
    }

    #[test]
    fn test_prefers_winning_split() -> Result<(), MctsError>{
        // Column 0 only connects to the board through (4, 0)-(4, 1).
        let mut mcts = seeded();
        let board = wall_column(5, 0, 4);
        mcts.set_root(board, Position::new(4, 2), Position::new(0, 0), 1)?;
        mcts.search_iterations(2000)?;

        let winning = Move::new(Position::new(4, 1), Direction::Left);
        assert_eq!(mcts.choose()?, winning);

        let stats = mcts.root_statistics();
        let best = stats.iter().find(|s| s.mv == winning).unwrap();
        assert_approx_eq!(best.value, 1.0);
        Ok(())
    }

    #[test]
    fn test_reroot_reuses_known_position() -> Result<(), MctsError>{
        let mut mcts = seeded();
        let board = Board::new(4)?;
        let (me, adversary) = (Position::new(0, 0), Position::new(3, 3));
        mcts.set_root(board.clone(), me, adversary, 1)?;
        mcts.search_iterations(500)?;

        let mv = mcts.choose()?;
        let after_mine = State::new(board, me, adversary, 1).child(mv);

        // Answer with a reply the search has expanded below our move.
        let child = mcts.tree().find(&after_mine).unwrap();
        let reply = mcts.tree().get(child).children()[0];
        let reply_state = mcts.tree().get(reply).state().clone();
        let visits = mcts.tree().get(reply).stats().get_n();

        let reused = mcts.set_root(reply_state.board().clone(), reply_state.opponent(), reply_state.mover(), 1)?;

        assert!(reused);
        assert_eq!(mcts.root(), Some(reply));
        assert_eq!(mcts.root_visits(), visits);
        Ok(())
    }
}
