//! A deterministic searcher with scripted responses, for tests.
//!
//! Tests register a response tree per position (keyed by the position's
//! situation hash). `run_whole_search` serves the registered tree with
//! avoided moves filtered from the root; unregistered positions get a
//! single-node fallback so leaf-update searches always have something to
//! report.

use std::collections::HashMap;

use games_go::{Board, BoardHistory, Loc, Player, Symmetry};

use crate::evaluator::loc_to_pos;
use crate::params::SearchParams;
use crate::searcher::{SearchError, SearchNodeRef, Searcher};
use crate::values::ReportedSearchValues;

/// Builder form of one scripted search node. Values are from White's
/// perspective, as a real searcher would report them.
#[derive(Debug, Clone)]
pub struct ScriptedNode {
    pub visits: i64,
    pub win_loss_value: f64,
    pub expected_score: f64,
    pub sharp_score: f64,
    pub wl_error: f64,
    pub score_error: f64,
    pub children: Vec<(Loc, ScriptedNode)>,
}

impl ScriptedNode {
    pub fn leaf(visits: i64, win_loss_value: f64, expected_score: f64) -> Self {
        ScriptedNode {
            visits,
            win_loss_value,
            expected_score,
            sharp_score: expected_score,
            wl_error: 0.1,
            score_error: 0.5,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, loc: Loc, child: ScriptedNode) -> Self {
        self.children.push((loc, child));
        self
    }

    pub fn with_sharp_score(mut self, sharp: f64) -> Self {
        self.sharp_score = sharp;
        self
    }

    pub fn with_errors(mut self, wl_error: f64, score_error: f64) -> Self {
        self.wl_error = wl_error;
        self.score_error = score_error;
        self
    }
}

#[derive(Debug, Clone)]
struct StoredNode {
    next_pla: Player,
    visits: i64,
    values: ReportedSearchValues,
    sharp_score: f64,
    wl_error: f64,
    score_error: f64,
    children: Vec<(Loc, usize)>,
}

/// A flattened scripted response tree.
#[derive(Debug, Clone)]
pub struct ScriptedTree {
    nodes: Vec<StoredNode>,
}

impl ScriptedTree {
    pub fn from_root(root: ScriptedNode, root_pla: Player) -> Self {
        let mut nodes = Vec::new();
        Self::flatten(&root, root_pla, &mut nodes);
        ScriptedTree { nodes }
    }

    fn flatten(node: &ScriptedNode, pla: Player, out: &mut Vec<StoredNode>) -> usize {
        let id = out.len();
        out.push(StoredNode {
            next_pla: pla,
            visits: node.visits,
            values: ReportedSearchValues {
                win_value: (1.0 + node.win_loss_value) / 2.0,
                loss_value: (1.0 - node.win_loss_value) / 2.0,
                win_loss_value: node.win_loss_value,
                utility: node.win_loss_value,
                expected_score: node.expected_score,
                expected_score_stdev: node.score_error,
                weight: node.visits as f64,
                visits: node.visits,
            },
            sharp_score: node.sharp_score,
            wl_error: node.wl_error,
            score_error: node.score_error,
            children: Vec::new(),
        });
        let mut children = Vec::new();
        for (loc, child) in &node.children {
            let child_id = Self::flatten(child, pla.opponent(), out);
            children.push((*loc, child_id));
        }
        out[id].children = children;
        id
    }
}

/// Searcher whose results are fully scripted by the test.
#[derive(Clone)]
pub struct ScriptedSearcher {
    responses: HashMap<u128, ScriptedTree>,
    fallback_visits: i64,
    position: Option<(Player, Board, BoardHistory)>,
    avoid_black: Vec<i32>,
    avoid_white: Vec<i32>,
    current: Vec<StoredNode>,
}

impl ScriptedSearcher {
    pub fn new() -> Self {
        ScriptedSearcher {
            responses: HashMap::new(),
            fallback_visits: 10,
            position: None,
            avoid_black: Vec::new(),
            avoid_white: Vec::new(),
            current: Vec::new(),
        }
    }

    /// Register the response for a position. The key is the situation hash
    /// of the position to be searched (`BoardHistory::current_situation_hash`).
    pub fn add_response(&mut self, situation_hash: u128, tree: ScriptedTree) {
        self.responses.insert(situation_hash, tree);
    }

    pub fn with_fallback_visits(mut self, visits: i64) -> Self {
        self.fallback_visits = visits;
        self
    }

    fn is_avoided(&self, loc: Loc, pla: Player, board: &Board) -> bool {
        let mask = match pla {
            Player::Black => &self.avoid_black,
            Player::White => &self.avoid_white,
        };
        if mask.is_empty() {
            return false;
        }
        let pos = loc_to_pos(loc, board.x_size(), board.y_size());
        pos < mask.len() && mask[pos] > 0
    }
}

impl Default for ScriptedSearcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Searcher for ScriptedSearcher {
    fn set_position(&mut self, pla: Player, board: &Board, hist: &BoardHistory) {
        self.position = Some((pla, board.clone(), hist.clone()));
    }

    fn set_root_symmetry_pruning_only(&mut self, _symmetries: Vec<Symmetry>) {}

    fn set_avoid_move_until_by_loc(&mut self, black: Vec<i32>, white: Vec<i32>) {
        self.avoid_black = black;
        self.avoid_white = white;
    }

    fn set_params(&mut self, _params: SearchParams) {}

    fn run_whole_search(&mut self, pla: Player) -> Result<(), SearchError> {
        let (_, board, hist) = self.position.clone().ok_or(SearchError::NoPosition)?;
        let key = hist.current_situation_hash();

        match self.responses.get(&key).map(|tree| tree.nodes.clone()) {
            Some(nodes) => {
                self.current = nodes;
                // The scripted tree may list moves the book told us to avoid;
                // a real searcher would never visit them.
                let filtered: Vec<(Loc, usize)> = self.current[0]
                    .children
                    .iter()
                    .copied()
                    .filter(|&(loc, _)| !self.is_avoided(loc, pla, &board))
                    .collect();
                self.current[0].children = filtered;
            }
            None => {
                self.current = vec![StoredNode {
                    next_pla: pla,
                    visits: self.fallback_visits,
                    values: ReportedSearchValues::from_outcome(0.0, 0.0, self.fallback_visits),
                    sharp_score: 0.0,
                    wl_error: 0.1,
                    score_error: 0.5,
                    children: Vec::new(),
                }];
            }
        }
        Ok(())
    }

    fn root_node(&self) -> SearchNodeRef {
        0
    }

    fn children_of(&self, node: SearchNodeRef) -> Vec<(Loc, SearchNodeRef)> {
        self.current[node].children.clone()
    }

    fn node_visits(&self, node: SearchNodeRef) -> i64 {
        self.current[node].visits
    }

    fn node_next_pla(&self, node: SearchNodeRef) -> Player {
        self.current[node].next_pla
    }

    fn play_selection_values(&self, node: SearchNodeRef) -> Option<(Vec<Loc>, Vec<f64>)> {
        let n = &self.current[node];
        if n.children.is_empty() {
            return None;
        }
        let locs = n.children.iter().map(|&(loc, _)| loc).collect();
        let values = n
            .children
            .iter()
            .map(|&(_, id)| self.current[id].visits as f64)
            .collect();
        Some((locs, values))
    }

    fn pruned_node_values(&self, node: SearchNodeRef) -> Option<ReportedSearchValues> {
        Some(self.current[node].values)
    }

    fn sharp_score(&self, node: SearchNodeRef) -> Option<f64> {
        Some(self.current[node].sharp_score)
    }

    fn shallow_average_shortterm_wl_and_score_error(&self, node: SearchNodeRef) -> (f64, f64) {
        let n = &self.current[node];
        (n.wl_error, n.score_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use games_go::Rules;

    fn p(x: u8, y: u8) -> Loc {
        Loc::Point { x, y }
    }

    #[test]
    fn scripted_tree_is_served_for_registered_position() {
        let board = Board::new(5, 5);
        let hist = BoardHistory::new(board.clone(), Player::Black, Rules::default(), 3);

        let tree = ScriptedTree::from_root(
            ScriptedNode::leaf(140, 0.2, 1.0)
                .with_child(p(2, 2), ScriptedNode::leaf(100, 0.25, 1.5))
                .with_child(p(1, 1), ScriptedNode::leaf(40, 0.1, 0.5)),
            Player::Black,
        );

        let mut s = ScriptedSearcher::new();
        s.add_response(hist.current_situation_hash(), tree);
        s.set_position(Player::Black, &board, &hist);
        s.run_whole_search(Player::Black).unwrap();

        let children = s.children_of(s.root_node());
        assert_eq!(children.len(), 2);
        assert_eq!(s.node_visits(children[0].1), 100);
        let (locs, values) = s.play_selection_values(s.root_node()).unwrap();
        assert_eq!(locs[0], p(2, 2));
        assert!(values[0] > values[1]);
    }

    #[test]
    fn avoided_moves_are_filtered_from_scripted_root() {
        let board = Board::new(5, 5);
        let hist = BoardHistory::new(board.clone(), Player::Black, Rules::default(), 3);

        let tree = ScriptedTree::from_root(
            ScriptedNode::leaf(140, 0.2, 1.0)
                .with_child(p(2, 2), ScriptedNode::leaf(100, 0.25, 1.5))
                .with_child(p(1, 1), ScriptedNode::leaf(40, 0.1, 0.5)),
            Player::Black,
        );

        let mut s = ScriptedSearcher::new();
        s.add_response(hist.current_situation_hash(), tree);
        s.set_position(Player::Black, &board, &hist);
        let mut mask = vec![0i32; 26];
        mask[loc_to_pos(p(2, 2), 5, 5)] = 1;
        s.set_avoid_move_until_by_loc(mask.clone(), mask);
        s.run_whole_search(Player::Black).unwrap();

        let children = s.children_of(s.root_node());
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, p(1, 1));
    }

    #[test]
    fn unregistered_position_gets_fallback() {
        let board = Board::new(5, 5);
        let hist = BoardHistory::new(board.clone(), Player::Black, Rules::default(), 3);
        let mut s = ScriptedSearcher::new().with_fallback_visits(7);
        s.set_position(Player::Black, &board, &hist);
        s.run_whole_search(Player::Black).unwrap();
        assert_eq!(s.node_visits(s.root_node()), 7);
        assert!(s.children_of(s.root_node()).is_empty());
    }
}
