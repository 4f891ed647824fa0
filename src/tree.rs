//! Search tree storage for MCTS.
//!
//! Nodes live in an arena and are indexed by their state, so a position
//! reached along different paths shares one set of statistics. Statistics
//! survive for the life of the tree; branches the real game leaves behind
//! are simply never visited again.

use std::{collections::HashMap, rc::Rc};

use crate::{moves, ConnectivityScorer, SelectionFunction, State};

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// Visit count and accumulated reward of a node.
///
/// The reward is summed from the point of view of the player who made
/// the move leading into the node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeStats{
    score: f64,
    n: u32
}

impl NodeStats{
    /// Average reward, `0.0` before the first visit.
    #[inline]
    pub fn get_value(&self) -> f64{
        if self.n != 0 { self.score / self.n as f64 } else { 0.0 }
    }

    /// Number of times the node was visited.
    #[inline]
    pub fn get_n(&self) -> u32{
        self.n
    }

    /// Sum of all rewards backpropagated through the node.
    #[inline]
    pub fn get_score(&self) -> f64{
        self.score
    }

    /// Records one visit with reward `score`.
    ///
    /// # Parameters
    /// - `score`: reward in `[0, 1]` for the player who moved into the node.
    #[inline]
    pub fn add_score(&mut self, score: f64){
        self.score += score;
        self.n += 1;
    }
}

/// A node of the search tree.
pub struct Node{
    state: Rc<State>,
    stats: NodeStats,
    /// `None` until expanded; empty once expanded if the node is terminal.
    children: Option<Vec<NodeId>>,
    outcome: Option<f64>
}

impl Node{
    fn new(state: Rc<State>) -> Self{
        Node { state, stats: NodeStats::default(), children: None, outcome: None }
    }

    /// Position stored at this node, keyed from the side of the player who just moved.
    #[inline]
    pub fn state(&self) -> &State{
        &self.state
    }

    /// Visit count and accumulated reward.
    #[inline]
    pub fn stats(&self) -> &NodeStats{
        &self.stats
    }

    /// Children of an expanded node; empty when unexpanded or terminal.
    #[inline]
    pub fn children(&self) -> &[NodeId]{
        self.children.as_deref().unwrap_or(&[])
    }

    /// Returns true once the children have been generated.
    #[inline]
    pub fn is_expanded(&self) -> bool{
        self.children.is_some()
    }

    /// Known to end the game. Only decided once the node is expanded.
    #[inline]
    pub fn is_terminal(&self) -> bool{
        self.outcome.is_some()
    }

    /// Final result for the player who moved into this node, if terminal.
    #[inline]
    pub fn outcome(&self) -> Option<f64>{
        self.outcome
    }
}

/// Arena of nodes plus a state index.
#[derive(Default)]
pub struct SearchTree{
    nodes: Vec<Node>,
    index: HashMap<Rc<State>, NodeId>
}

impl SearchTree{
    /// Creates an empty tree.
    pub fn new() -> Self{
        Self::default()
    }

    /// Number of distinct states stored.
    #[inline]
    pub fn len(&self) -> usize{
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool{
        self.nodes.is_empty()
    }

    /// Node stored at `id`.
    ///
    /// # Parameters
    /// - `id`: an id returned by `insert` or found among a node's children.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node{
        &self.nodes[id]
    }

    /// Looks up the node holding `state`.
    ///
    /// # Returns
    /// `None` if the state was never added to the tree.
    #[inline]
    pub fn find(&self, state: &State) -> Option<NodeId>{
        self.index.get(state).copied()
    }

    /// Returns the node for `state`, creating it if the state is new.
    pub fn insert(&mut self, state: State) -> NodeId{
        if let Some(id) = self.find(&state) {
            return id;
        }

        let state = Rc::new(state);
        let id = self.nodes.len();
        self.nodes.push(Node::new(Rc::clone(&state)));
        self.index.insert(state, id);
        id
    }

    /// Returns true once `expand` has run on the node.
    #[inline]
    pub fn is_expanded(&self, id: NodeId) -> bool{
        self.nodes[id].is_expanded()
    }

    /// Classifies the node and, unless the game is over there, adds one
    /// child per legal reply of the player whose turn it is.
    ///
    /// Node states are stored from the side of the player who just moved,
    /// so replies are generated from the role-swapped state.
    ///
    /// # Returns
    /// `false` if the node was already expanded.
    pub fn expand(&mut self, id: NodeId, scorer: &mut ConnectivityScorer) -> bool{
        if self.nodes[id].is_expanded() {
            return false;
        }

        let state = Rc::clone(&self.nodes[id].state);

        if let Some(outcome) = scorer.score(state.board(), state.mover(), state.opponent()) {
            let node = &mut self.nodes[id];
            node.outcome = Some(outcome);
            node.children = Some(Vec::new());
            return true;
        }

        let children = moves::children(&state.swapped())
            .into_iter()
            .map(|child| self.insert(child))
            .collect();

        self.nodes[id].children = Some(children);
        true
    }

    /// First child that has not been expanded yet.
    pub fn unexplored_child(&self, id: NodeId) -> Option<NodeId>{
        self.nodes[id].children()
            .iter()
            .copied()
            .find(|&child| !self.nodes[child].is_expanded())
    }

    /// Drops `child` from the children of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId){
        if let Some(children) = self.nodes[parent].children.as_mut() {
            children.retain(|&c| c != child);
        }
    }

    #[cfg(test)]
    pub(crate) fn push_front_child(&mut self, parent: NodeId, child: NodeId){
        if let Some(children) = self.nodes[parent].children.as_mut() {
            children.insert(0, child);
        }
    }

    /// Records one visit of the node with reward `score`.
    #[inline]
    pub fn add_score(&mut self, id: NodeId, score: f64){
        self.nodes[id].stats.add_score(score);
    }

    /// Child with the best average reward; unvisited children rank below
    /// any visited one and ties go to the more visited child.
    pub fn best_child(&self, id: NodeId) -> Option<NodeId>{
        let rank = |child: NodeId| {
            let stats = &self.nodes[child].stats;
            let value = if stats.n == 0 { f64::NEG_INFINITY } else { stats.get_value() };
            (value, stats.n)
        };

        self.nodes[id].children()
            .iter()
            .copied()
            .max_by(|&a, &b| {
                let (a, b) = (rank(a), rank(b));
                a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
            })
    }

    /// Child maximizing the selection score. Every child must have been
    /// visited at least once.
    pub fn uct_child(&self, id: NodeId, exploration_coef: f64, selection_function: SelectionFunction) -> Option<NodeId>{
        let node = &self.nodes[id];
        let parent_n = node.stats.n.max(1) as f64;

        let score = |child: NodeId| {
            let stats = &self.nodes[child].stats;
            debug_assert!(stats.n > 0, "uct_child on an unvisited child");
            selection_function(stats.get_value(), stats.n as f64, parent_n, exploration_coef)
        };

        node.children()
            .iter()
            .copied()
            .max_by(|&a, &b| score(a).total_cmp(&score(b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::wall_column, uct, Board, Position};

    fn open_root() -> State{
        // Root keyed from the side of the player who moved last.
        State::new(Board::new(3).unwrap(), Position::new(2, 2), Position::new(0, 0), 1)
    }

    #[test]
    fn test_insert_dedup(){
        let mut tree = SearchTree::new();
        let a = tree.insert(open_root());
        let b = tree.insert(open_root());

        assert_eq!(a, b);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.find(&open_root()), Some(a));
        assert_eq!(tree.find(&open_root().swapped()), None);
    }

    #[test]
    fn test_expand_generates_replies(){
        let mut tree = SearchTree::new();
        let mut scorer = ConnectivityScorer::new();
        let root = tree.insert(open_root());

        assert!(!tree.is_expanded(root));
        assert!(tree.expand(root, &mut scorer));
        assert!(!tree.expand(root, &mut scorer));
        assert!(!tree.get(root).is_terminal());

        // From (0, 0) with one step: the corner (2 sides) and two edge cells (3 sides each).
        let children = tree.get(root).children().to_vec();
        assert_eq!(children.len(), 8);
        assert_eq!(tree.len(), 9);

        for child in children {
            let state = tree.get(child).state();
            assert_eq!(state.opponent(), Position::new(2, 2));
            assert!(state.mover().manhattan(Position::new(0, 0)) <= 1);
        }

        assert_eq!(tree.unexplored_child(root), Some(tree.get(root).children()[0]));
    }

    #[test]
    fn test_expand_terminal(){
        let mut tree = SearchTree::new();
        let mut scorer = ConnectivityScorer::new();
        let state = State::new(wall_column(4, 0, 4), Position::new(1, 2), Position::new(1, 0), 1);
        let id = tree.insert(state);

        assert!(tree.expand(id, &mut scorer));
        assert!(tree.is_expanded(id));
        assert!(tree.get(id).is_terminal());
        assert_eq!(tree.get(id).outcome(), Some(1.0));
        assert!(tree.get(id).children().is_empty());
        assert_eq!(tree.unexplored_child(id), None);
        assert_eq!(tree.best_child(id), None);
    }

    #[test]
    fn test_best_child_skips_unvisited(){
        let mut tree = SearchTree::new();
        let mut scorer = ConnectivityScorer::new();
        let root = tree.insert(open_root());
        tree.expand(root, &mut scorer);

        let children = tree.get(root).children().to_vec();
        tree.add_score(children[1], 0.0);
        tree.add_score(children[2], 1.0);
        tree.add_score(children[2], 0.0);

        assert_eq!(tree.best_child(root), Some(children[2]));

        // Same average, more visits wins.
        tree.add_score(children[3], 0.5);
        tree.add_score(children[4], 0.5);
        tree.add_score(children[4], 0.5);
        tree.add_score(children[4], 0.5);
        assert_eq!(tree.best_child(root), Some(children[4]));
    }

    #[test]
    fn test_uct_child_prefers_less_visited(){
        let mut tree = SearchTree::new();
        let mut scorer = ConnectivityScorer::new();
        let root = tree.insert(open_root());
        tree.expand(root, &mut scorer);

        let children = tree.get(root).children().to_vec();
        for (i, &child) in children.iter().enumerate() {
            for _ in 0..=(i % 3) {
                tree.add_score(child, 0.5);
                tree.add_score(root, 0.5);
            }
        }

        let picked = tree.uct_child(root, 1.0, uct).unwrap();
        assert_eq!(tree.get(picked).stats().get_n(), 1);

        // Without exploration the best average wins.
        tree.add_score(children[5], 1.0);
        assert_eq!(tree.uct_child(root, 0.0, uct), Some(children[5]));
    }

    #[test]
    fn test_remove_child(){
        let mut tree = SearchTree::new();
        let mut scorer = ConnectivityScorer::new();
        let root = tree.insert(open_root());
        tree.expand(root, &mut scorer);

        let removed = tree.get(root).children()[0];
        tree.remove_child(root, removed);

        assert_eq!(tree.get(root).children().len(), 7);
        assert!(!tree.get(root).children().contains(&removed));
        // Still indexed, only unlinked from its parent.
        assert_eq!(tree.find(tree.get(removed).state()), Some(removed));
    }
}
