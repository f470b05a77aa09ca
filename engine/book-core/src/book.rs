//! The node store and graph operations.
//!
//! Nodes are keyed by canonical hash; edges carry the child's canonical
//! hash rather than a pointer, so transpositions share one node and the
//! graph stays a DAG. Orientation is threaded through [`SymNode`] handles;
//! the store itself only ever sees canonical moves.

use std::collections::HashMap;

use games_go::{Board, BoardHistory, Loc, Player, Rules, Symmetry};

use crate::error::BookError;
use crate::hash::{get_hash_and_symmetry, BookHash};
use crate::node::{BookMove, BookNode, SymNode};
use crate::params::BookParams;
use crate::values::BookValues;

pub struct Book {
    pub book_version: u32,
    pub rep_bound: usize,
    pub rules: Rules,
    pub initial_board: Board,
    pub initial_pla: Player,
    pub(crate) params: BookParams,
    pub(crate) nodes: HashMap<BookHash, BookNode>,
    /// Insertion order, for deterministic iteration.
    pub(crate) order: Vec<BookHash>,
    root_hash: BookHash,
    /// Maps the root's canonical orientation to the initial board's.
    root_symmetry: Symmetry,
    pub(crate) bonus_by_hash: HashMap<BookHash, f64>,
}

impl Book {
    pub fn new(
        book_version: u32,
        initial_board: Board,
        rules: Rules,
        initial_pla: Player,
        rep_bound: usize,
        params: BookParams,
    ) -> Book {
        let hist = BoardHistory::new(initial_board.clone(), initial_pla, rules, rep_bound);
        let (root_hash, align, stabilizers) = get_hash_and_symmetry(&hist, book_version);
        let mut nodes = HashMap::new();
        nodes.insert(root_hash, BookNode::new(root_hash, initial_pla, stabilizers));
        Book {
            book_version,
            rep_bound,
            rules,
            initial_board,
            initial_pla,
            params,
            nodes,
            order: vec![root_hash],
            root_hash,
            root_symmetry: align.inverse(),
            bonus_by_hash: HashMap::new(),
        }
    }

    /// A fresh history at the initial position.
    pub fn initial_hist(&self) -> BoardHistory {
        BoardHistory::new(
            self.initial_board.clone(),
            self.initial_pla,
            self.rules,
            self.rep_bound,
        )
    }

    #[inline]
    fn dims(&self) -> (usize, usize) {
        (self.initial_board.x_size(), self.initial_board.y_size())
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn params(&self) -> &BookParams {
        &self.params
    }

    pub fn set_params(&mut self, params: BookParams) {
        self.params = params;
    }

    pub fn set_bonus_by_hash(&mut self, bonuses: HashMap<BookHash, f64>) {
        self.bonus_by_hash = bonuses;
    }

    /// The pinned root, viewed in the orientation of the initial board.
    pub fn get_root(&self) -> SymNode {
        SymNode::new(self.root_hash, self.root_symmetry)
    }

    pub fn root_hash(&self) -> BookHash {
        self.root_hash
    }

    /// Look up a known node; callers only ask for hashes they obtained
    /// from the book.
    pub fn get_by_hash(&self, hash: BookHash) -> Result<SymNode, BookError> {
        if self.nodes.contains_key(&hash) {
            Ok(SymNode::canonical(hash))
        } else {
            Err(BookError::UnknownHash(hash))
        }
    }

    pub fn node(&self, hash: BookHash) -> Option<&BookNode> {
        self.nodes.get(&hash)
    }

    pub(crate) fn node_mut(&mut self, hash: BookHash) -> Option<&mut BookNode> {
        self.nodes.get_mut(&hash)
    }

    pub fn player_of(&self, node: &SymNode) -> Player {
        self.nodes[&node.hash].pla
    }

    pub fn can_expand(&self, node: &SymNode) -> bool {
        self.nodes[&node.hash].can_expand
    }

    pub fn can_re_expand(&self, node: &SymNode) -> bool {
        self.nodes[&node.hash].can_re_expand
    }

    /// The stabilizer subgroup of the node's position, conjugated into the
    /// caller's orientation so it can be applied to the board the caller
    /// holds.
    pub fn stabilizer_symmetries(&self, node: &SymNode) -> Vec<Symmetry> {
        self.nodes[&node.hash]
            .symmetries
            .iter()
            .map(|&s| node.symmetry.compose(s).compose(node.symmetry.inverse()))
            .collect()
    }

    /// Overwrite a node's not-in-book values.
    pub fn set_this_values(&mut self, hash: BookHash, values: BookValues) {
        if let Some(node) = self.nodes.get_mut(&hash) {
            node.this_values_not_in_book = values;
        }
    }

    /// Freeze a node. `can_expand` is monotone: once false it never
    /// becomes true again.
    pub fn mark_unexpandable(&mut self, hash: BookHash) {
        if let Some(node) = self.nodes.get_mut(&hash) {
            node.can_expand = false;
        }
    }

    /// Consume a node's one-shot re-expansion eligibility.
    pub fn clear_can_re_expand(&mut self, hash: BookHash) {
        if let Some(node) = self.nodes.get_mut(&hash) {
            node.can_re_expand = false;
        }
    }

    /// Whether the given move (in the caller's orientation) is in the book
    /// at this node, up to stabilizer symmetry.
    pub fn is_move_in_book(&self, node: &SymNode, loc: Loc) -> bool {
        let (xs, ys) = self.dims();
        let canonical = node.to_canonical(loc, xs, ys);
        self.nodes[&node.hash].find_move(canonical, xs, ys).is_some()
    }

    /// In-book moves at a node, translated to the caller's orientation:
    /// (move, raw policy, child hash), in insertion order.
    pub fn moves_in_book(&self, node: &SymNode) -> Vec<(Loc, f64, BookHash)> {
        let (xs, ys) = self.dims();
        self.nodes[&node.hash]
            .moves_in_book
            .iter()
            .map(|(loc, mv)| (node.to_user(*loc, xs, ys), mv.raw_policy, mv.child_hash))
            .collect()
    }

    /// Advance `hist` by the move, canonicalize the result, and record the
    /// parent→child edge. Returns the child view and whether the child
    /// already existed (a transposition).
    pub fn play_and_add_move(
        &mut self,
        node: &SymNode,
        hist: &mut BoardHistory,
        loc: Loc,
        raw_policy: f64,
    ) -> Result<(SymNode, bool), BookError> {
        let (xs, ys) = self.dims();
        let pla = self.nodes[&node.hash].pla;
        if !hist.is_legal(loc, pla) {
            return Err(BookError::IllegalMove {
                hash: node.hash,
                loc: loc.to_string(),
            });
        }
        hist.make_move(loc, pla)
            .expect("move was checked legal above");

        let (child_hash, child_align, child_stabilizers) =
            get_hash_and_symmetry(hist, self.book_version);
        let canonical_loc = node.to_canonical(loc, xs, ys);

        let is_transposing = self.nodes.contains_key(&child_hash);
        if !is_transposing {
            self.nodes.insert(
                child_hash,
                BookNode::new(child_hash, pla.opponent(), child_stabilizers),
            );
            self.order.push(child_hash);
        }

        let edge_exists = self.nodes[&node.hash]
            .find_move(canonical_loc, xs, ys)
            .is_some();
        if !edge_exists {
            self.nodes
                .get_mut(&node.hash)
                .expect("parent exists")
                .moves_in_book
                .push((
                    canonical_loc,
                    BookMove {
                        child_hash,
                        raw_policy,
                        child_symmetry: child_align.compose(node.symmetry),
                    },
                ));
            let child = self.nodes.get_mut(&child_hash).expect("child exists");
            if !child
                .parents
                .iter()
                .any(|&(p, m)| p == node.hash && m == canonical_loc)
            {
                child.parents.push((node.hash, canonical_loc));
            }
        }

        Ok((SymNode::new(child_hash, child_align.inverse()), is_transposing))
    }

    /// Traverse an existing edge.
    pub fn follow(&self, node: &SymNode, loc: Loc) -> Result<SymNode, BookError> {
        let (xs, ys) = self.dims();
        let canonical = node.to_canonical(loc, xs, ys);
        let n = &self.nodes[&node.hash];
        let (_, mv, stab) =
            n.find_move(canonical, xs, ys)
                .ok_or_else(|| BookError::MoveNotInBook {
                    hash: node.hash,
                    loc: loc.to_string(),
                })?;
        let symmetry = node
            .symmetry
            .compose(stab.inverse())
            .compose(mv.child_symmetry.inverse());
        Ok(SymNode::new(mv.child_hash, symmetry))
    }

    /// Reconstruct a board history reaching the node by walking primary
    /// parent edges back to the root and replaying forward. Returns the
    /// node's view aligned to the reconstructed orientation, the history,
    /// and the moves played.
    pub fn history_reaching(
        &self,
        hash: BookHash,
    ) -> Result<(SymNode, BoardHistory, Vec<Loc>), BookError> {
        let (xs, ys) = self.dims();

        // Climb to the root along primary parents.
        let mut chain: Vec<(BookHash, Loc)> = Vec::new();
        let mut cursor = hash;
        while cursor != self.root_hash {
            let node = self
                .nodes
                .get(&cursor)
                .ok_or(BookError::HistoryReconstruction(hash))?;
            let &(parent, via) = node
                .parents
                .first()
                .ok_or(BookError::HistoryReconstruction(hash))?;
            chain.push((parent, via));
            cursor = parent;
            if chain.len() > self.nodes.len() {
                return Err(BookError::HistoryReconstruction(hash));
            }
        }
        chain.reverse();

        // Replay forward from the initial position.
        let mut hist = self.initial_hist();
        let mut current = self.get_root();
        let mut moves = Vec::new();
        for &(parent_hash, canonical_loc) in &chain {
            debug_assert_eq!(current.hash, parent_hash);
            let parent = &self.nodes[&parent_hash];
            let user_loc = current.to_user(canonical_loc, xs, ys);
            if !hist.is_legal(user_loc, parent.pla) {
                return Err(BookError::HistoryReconstruction(hash));
            }
            hist.make_move(user_loc, parent.pla)
                .expect("move was checked legal above");
            moves.push(user_loc);

            let (_, mv) = parent
                .moves_in_book
                .iter()
                .find(|(stored, _)| *stored == canonical_loc)
                .ok_or(BookError::HistoryReconstruction(hash))?;
            current = SymNode::new(
                mv.child_hash,
                current.symmetry.compose(mv.child_symmetry.inverse()),
            );
        }

        if current.hash != hash {
            return Err(BookError::HistoryReconstruction(hash));
        }
        Ok((current, hist, moves))
    }

    /// Every node, in insertion order, viewed canonically.
    pub fn all_nodes(&self) -> Vec<SymNode> {
        self.order.iter().map(|&h| SymNode::canonical(h)).collect()
    }

    /// Nodes with no in-book moves and at least `min_visits` recursive
    /// visits.
    pub fn all_leaves(&self, min_visits: f64) -> Vec<SymNode> {
        self.order
            .iter()
            .filter(|h| {
                let n = &self.nodes[h];
                n.moves_in_book.is_empty() && n.recursive_values.visits >= min_visits
            })
            .map(|&h| SymNode::canonical(h))
            .collect()
    }

    /// Whether a node is eligible for selection as an expansion target.
    pub(crate) fn is_expansion_candidate(&self, node: &BookNode) -> bool {
        node.can_expand
            || (node.can_re_expand
                && node.recursive_values.visits < self.params.max_visits_for_re_expansion)
    }

    /// The `n` frontier candidates with the lowest total expansion cost,
    /// tie-broken by lower hash for determinism.
    pub fn get_next_n_to_expand(&self, n: usize) -> Vec<SymNode> {
        let mut candidates: Vec<&BookNode> = self
            .nodes
            .values()
            .filter(|node| self.is_expansion_candidate(node))
            .collect();
        candidates.sort_by(|a, b| {
            a.total_expansion_cost
                .partial_cmp(&b.total_expansion_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.hash.cmp(&b.hash))
        });
        candidates
            .into_iter()
            .take(n)
            .map(|node| SymNode::canonical(node.hash))
            .collect()
    }
}
