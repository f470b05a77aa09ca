//! A one-ply reference searcher.
//!
//! `FlatSearcher` spreads its visit budget over the root's legal moves in
//! proportion to the evaluator's symmetry-averaged policy, then evaluates
//! each child position once. It is deterministic, honors avoid masks and
//! root symmetry pruning, and exists so the book can run end to end
//! without a real MCTS behind it.

use std::sync::Arc;

use games_go::{Board, BoardHistory, Loc, Player, Symmetry};

use crate::evaluator::{loc_to_pos, NnEvaluator};
use crate::params::SearchParams;
use crate::searcher::{SearchError, SearchNodeRef, Searcher};
use crate::values::ReportedSearchValues;

struct FlatNode {
    next_pla: Player,
    visits: i64,
    values: ReportedSearchValues,
    sharp_score: f64,
    children: Vec<(Loc, usize)>,
}

pub struct FlatSearcher {
    nn: Arc<dyn NnEvaluator>,
    params: SearchParams,
    position: Option<(Player, Board, BoardHistory)>,
    symmetries: Vec<Symmetry>,
    avoid_black: Vec<i32>,
    avoid_white: Vec<i32>,
    nodes: Vec<FlatNode>,
}

impl FlatSearcher {
    pub fn new(nn: Arc<dyn NnEvaluator>, params: SearchParams) -> Self {
        FlatSearcher {
            nn,
            params,
            position: None,
            symmetries: vec![Symmetry::IDENTITY],
            avoid_black: Vec::new(),
            avoid_white: Vec::new(),
            nodes: Vec::new(),
        }
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

    /// Keep only one representative of each symmetry orbit of root moves.
    fn symmetry_prune(&self, moves: Vec<Loc>, board: &Board) -> Vec<Loc> {
        moves
            .iter()
            .copied()
            .filter(|&loc| {
                self.symmetries.iter().all(|&s| {
                    let image = s.apply_loc(loc, board.x_size(), board.y_size());
                    image >= loc || !moves.contains(&image)
                })
            })
            .collect()
    }

    fn values_from_eval(
        out: &crate::evaluator::NnOutput,
        visits: i64,
    ) -> ReportedSearchValues {
        ReportedSearchValues {
            win_value: (1.0 + out.win_loss_value) / 2.0,
            loss_value: (1.0 - out.win_loss_value) / 2.0,
            win_loss_value: out.win_loss_value,
            utility: out.win_loss_value,
            expected_score: out.score_mean,
            expected_score_stdev: out.score_stdev,
            weight: visits as f64,
            visits,
        }
    }
}

impl Searcher for FlatSearcher {
    fn set_position(&mut self, pla: Player, board: &Board, hist: &BoardHistory) {
        self.position = Some((pla, board.clone(), hist.clone()));
    }

    fn set_root_symmetry_pruning_only(&mut self, symmetries: Vec<Symmetry>) {
        self.symmetries = if symmetries.is_empty() {
            vec![Symmetry::IDENTITY]
        } else {
            symmetries
        };
    }

    fn set_avoid_move_until_by_loc(&mut self, black: Vec<i32>, white: Vec<i32>) {
        self.avoid_black = black;
        self.avoid_white = white;
    }

    fn set_params(&mut self, params: SearchParams) {
        self.params = params;
    }

    fn run_whole_search(&mut self, pla: Player) -> Result<(), SearchError> {
        let (_, board, hist) = self.position.clone().ok_or(SearchError::NoPosition)?;
        self.nodes.clear();

        if hist.is_game_finished {
            let wl = match hist.winner {
                Some(Player::White) => 1.0,
                Some(Player::Black) => -1.0,
                None => 0.0,
            };
            self.nodes.push(FlatNode {
                next_pla: pla,
                visits: 1,
                values: ReportedSearchValues::from_outcome(
                    wl,
                    hist.final_white_minus_black_score,
                    1,
                ),
                sharp_score: hist.final_white_minus_black_score,
                children: Vec::new(),
            });
            return Ok(());
        }

        let root_out = self.nn.full_symmetry_nn_output(&board, &hist, pla, false);

        let mut candidates: Vec<Loc> = board
            .all_points()
            .chain(std::iter::once(Loc::Pass))
            .filter(|&loc| hist.is_legal(loc, pla))
            .filter(|&loc| !self.is_avoided(loc, pla, &board))
            .collect();
        candidates = self.symmetry_prune(candidates, &board);

        let policy_sum: f64 = candidates
            .iter()
            .map(|&loc| root_out.policy_at(loc).max(0.0) as f64)
            .sum();

        // Root placeholder so children can be appended behind it.
        self.nodes.push(FlatNode {
            next_pla: pla,
            visits: 0,
            values: ReportedSearchValues::default(),
            sharp_score: 0.0,
            children: Vec::new(),
        });

        let budget = (self.params.max_visits - 1).max(1);
        let mut children = Vec::new();
        let mut total_visits = 1i64;
        let mut wl_sum = root_out.win_loss_value;
        let mut score_sum = root_out.score_mean;

        for loc in candidates {
            let p = root_out.policy_at(loc).max(0.0) as f64;
            if policy_sum <= 0.0 {
                continue;
            }
            let child_visits = (budget as f64 * p / policy_sum).round() as i64;
            if child_visits <= 0 {
                continue;
            }
            let mut child_hist = hist.clone();
            if child_hist.make_move(loc, pla).is_err() {
                continue;
            }
            let child_out = self.nn.full_symmetry_nn_output(
                child_hist.current_board(),
                &child_hist,
                pla.opponent(),
                false,
            );
            let values = Self::values_from_eval(&child_out, child_visits);
            wl_sum += values.win_loss_value * child_visits as f64;
            score_sum += values.expected_score * child_visits as f64;
            total_visits += child_visits;

            let child_id = self.nodes.len();
            self.nodes.push(FlatNode {
                next_pla: pla.opponent(),
                visits: child_visits,
                values,
                sharp_score: child_out.score_mean,
                children: Vec::new(),
            });
            children.push((loc, child_id));
        }

        let root = &mut self.nodes[0];
        root.children = children;
        root.visits = total_visits;
        root.values = ReportedSearchValues {
            win_value: (1.0 + wl_sum / total_visits as f64) / 2.0,
            loss_value: (1.0 - wl_sum / total_visits as f64) / 2.0,
            win_loss_value: wl_sum / total_visits as f64,
            utility: wl_sum / total_visits as f64,
            expected_score: score_sum / total_visits as f64,
            expected_score_stdev: root_out.score_stdev,
            weight: total_visits as f64,
            visits: total_visits,
        };
        root.sharp_score = score_sum / total_visits as f64;

        Ok(())
    }

    fn root_node(&self) -> SearchNodeRef {
        0
    }

    fn children_of(&self, node: SearchNodeRef) -> Vec<(Loc, SearchNodeRef)> {
        self.nodes[node].children.clone()
    }

    fn node_visits(&self, node: SearchNodeRef) -> i64 {
        self.nodes[node].visits
    }

    fn node_next_pla(&self, node: SearchNodeRef) -> Player {
        self.nodes[node].next_pla
    }

    fn play_selection_values(&self, node: SearchNodeRef) -> Option<(Vec<Loc>, Vec<f64>)> {
        let n = &self.nodes[node];
        if n.children.is_empty() {
            return None;
        }
        let locs = n.children.iter().map(|&(loc, _)| loc).collect();
        let values = n
            .children
            .iter()
            .map(|&(_, id)| self.nodes[id].visits as f64)
            .collect();
        Some((locs, values))
    }

    fn pruned_node_values(&self, node: SearchNodeRef) -> Option<ReportedSearchValues> {
        let n = &self.nodes[node];
        if n.visits <= 0 {
            return None;
        }
        Some(n.values)
    }

    fn sharp_score(&self, node: SearchNodeRef) -> Option<f64> {
        let n = &self.nodes[node];
        if n.visits <= 0 {
            return None;
        }
        Some(n.sharp_score)
    }

    fn shallow_average_shortterm_wl_and_score_error(&self, node: SearchNodeRef) -> (f64, f64) {
        let n = &self.nodes[node];
        let denom = (n.visits.max(1) as f64).sqrt();
        (0.5 / denom, n.values.expected_score_stdev / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UniformEvaluator;
    use games_go::Rules;

    fn searcher_at_start() -> FlatSearcher {
        let nn = Arc::new(UniformEvaluator::new());
        let params = SearchParams::default().with_max_visits(200);
        let mut s = FlatSearcher::new(nn, params);
        let board = Board::new(5, 5);
        let hist = BoardHistory::new(board.clone(), Player::Black, Rules::default(), 3);
        s.set_position(Player::Black, &board, &hist);
        s
    }

    #[test]
    fn search_without_position_fails() {
        let nn = Arc::new(UniformEvaluator::new());
        let mut s = FlatSearcher::new(nn, SearchParams::default());
        assert!(s.run_whole_search(Player::Black).is_err());
    }

    #[test]
    fn search_builds_one_ply_tree() {
        let mut s = searcher_at_start();
        s.run_whole_search(Player::Black).unwrap();
        let root = s.root_node();
        let children = s.children_of(root);
        assert!(!children.is_empty());
        for (_, child) in &children {
            assert!(s.node_visits(*child) > 0);
            assert!(s.children_of(*child).is_empty());
        }
        assert!(s.node_visits(root) > s.children_of(root).len() as i64);
    }

    #[test]
    fn avoid_mask_removes_moves_from_root() {
        let mut s = searcher_at_start();
        // Forbid everything except pass for black.
        let mut mask = vec![1i32; 26];
        mask[25] = 0;
        s.set_avoid_move_until_by_loc(mask.clone(), mask);
        s.run_whole_search(Player::Black).unwrap();
        let children = s.children_of(s.root_node());
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, Loc::Pass);
    }

    #[test]
    fn symmetry_pruning_thins_the_root() {
        let mut s = searcher_at_start();
        s.run_whole_search(Player::Black).unwrap();
        let unpruned = s.children_of(s.root_node()).len();

        let mut s = searcher_at_start();
        s.set_root_symmetry_pruning_only(Symmetry::all(5, 5));
        s.run_whole_search(Player::Black).unwrap();
        let pruned = s.children_of(s.root_node()).len();
        assert!(pruned < unpruned);
    }
}
