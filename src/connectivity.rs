//! Partition test deciding whether a position is over and who won.

use crate::{Board, Direction, Position};

/// Disjoint-set forest over board cells with union by size.
pub struct UnionFind{
    parent: Vec<u32>,
    size: Vec<u32>
}

impl UnionFind{
    /// Creates `len` singleton sets.
    ///
    /// # Parameters
    /// - `len`: number of elements, one per board cell.
    pub fn new(len: usize) -> Self{
        UnionFind { parent: (0..len as u32).collect(), size: vec![1; len] }
    }

    /// Puts every element back in its own singleton set, resizing if needed.
    pub fn reset(&mut self, len: usize){
        self.parent.clear();
        self.parent.extend(0..len as u32);
        self.size.clear();
        self.size.resize(len, 1);
    }

    /// Representative of `x`, compressing the path it walked.
    pub fn find(&mut self, x: usize) -> usize{
        let mut root = x;
        while self.parent[root] as usize != root {
            root = self.parent[root] as usize;
        }

        let mut current = x;
        while current != root {
            let next = self.parent[current] as usize;
            self.parent[current] = root as u32;
            current = next;
        }

        root
    }

    /// Merges the sets of `a` and `b`. Returns false if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool{
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return false;
        }

        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a as u32;
        self.size[a] += self.size[b];
        true
    }

    /// Number of elements in the set containing `x`.
    #[inline]
    pub fn set_size(&mut self, x: usize) -> usize{
        let root = self.find(x);
        self.size[root] as usize
    }
}

/// Region sizes of the two players once they are separated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Regions{
    pub mover: usize,
    pub opponent: usize
}

impl Regions{
    /// Outcome for the mover: 1.0 for a larger region, 0.0 for a smaller one, 0.5 on a tie.
    pub fn outcome(&self) -> f64{
        if self.mover > self.opponent {
            ConnectivityScorer::WIN
        }
        else if self.mover < self.opponent {
            ConnectivityScorer::LOSS
        }
        else {
            ConnectivityScorer::TIE
        }
    }
}

/// Reusable scorer; keeps its union-find buffers between calls so
/// repeated scoring during a search does not allocate.
pub struct ConnectivityScorer{
    sets: UnionFind
}

impl ConnectivityScorer{
    pub const WIN: f64 = 1.0;
    pub const TIE: f64 = 0.5;
    pub const LOSS: f64 = 0.0;

    /// Creates a scorer with empty buffers; they grow on the first call.
    pub fn new() -> Self{
        ConnectivityScorer { sets: UnionFind::new(0) }
    }

    /// Splits the board into wall-free regions and reports the sizes of the
    /// players' regions, or `None` while the players can still reach each other.
    pub fn regions(&mut self, board: &Board, mover: Position, opponent: Position) -> Option<Regions>{
        let size = board.size();
        self.sets.reset(board.cell_count());

        // Each undirected edge is seen once, from its upper or left cell.
        for row in 0..size {
            for col in 0..size {
                let position = Position::new(row, col);
                let index = board.index(position);

                if col + 1 < size && !board.has_wall(position, Direction::Right) {
                    self.sets.union(index, index + 1);
                }
                if row + 1 < size && !board.has_wall(position, Direction::Down) {
                    self.sets.union(index, index + size);
                }
            }
        }

        let a = self.sets.find(board.index(mover));
        let b = self.sets.find(board.index(opponent));

        if a == b {
            None
        }
        else {
            Some(Regions { mover: self.sets.set_size(a), opponent: self.sets.set_size(b) })
        }
    }

    /// Terminal outcome for the mover, or `None` when the game goes on.
    #[inline]
    pub fn score(&mut self, board: &Board, mover: Position, opponent: Position) -> Option<f64>{
        self.regions(board, mover, opponent).map(|regions| regions.outcome())
    }
}

impl Default for ConnectivityScorer{
    fn default() -> Self{
        Self::new()
    }
}
