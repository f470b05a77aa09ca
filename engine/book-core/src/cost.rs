//! The expansion priority formula.
//!
//! Every candidate at a node (each in-book move, plus the opaque "best
//! move not yet in the book") gets a cost from the node's perspective.
//! A node's total expansion cost is the cheapest in-book path cost from
//! the root plus its own new-move candidate cost, minus bonuses. Lower
//! cost expands sooner. The formula is a pure function of stored node
//! state so the recompute pass is order-independent.

use games_go::Loc;

use crate::book::Book;
use crate::node::BookNode;
use crate::values::{cap_sharp_score, utility_for};

/// Floor for policy inside the log penalty.
const POLICY_EPSILON: f64 = 1e-12;

/// Cap on the UCB win/loss gap. Sentinel values would otherwise overflow
/// the seventh power.
const WL_LOSS_CAP: f64 = 4.0;

/// One ranked candidate at a node, perspective-adjusted so that larger
/// utility is always better for the player to move.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    /// Canonical move, or `None` for the not-yet-in-book candidate.
    pub loc: Option<Loc>,
    pub win_loss: f64,
    pub sharp_score: f64,
    pub wl_error: f64,
    pub score_error: f64,
    pub policy: f64,
    /// Structural index: how many moves were already expanded when this
    /// candidate was (or would be) added.
    pub moves_expanded: usize,
    pub utility: f64,
}

impl Book {
    /// All candidates at a node: the in-book moves in insertion order,
    /// then the new-move candidate built from `this_values_not_in_book`.
    pub(crate) fn candidates_at(&self, node: &BookNode) -> Vec<Candidate> {
        let p = &self.params;
        let sign = match node.pla {
            games_go::Player::White => 1.0,
            games_go::Player::Black => -1.0,
        };
        let mut out = Vec::with_capacity(node.moves_in_book.len() + 1);

        for (idx, (loc, mv)) in node.moves_in_book.iter().enumerate() {
            let child = &self.nodes[&mv.child_hash];
            let rv = &child.recursive_values;
            let sharp =
                cap_sharp_score(rv.score_mean, rv.sharp_score_mean, p.sharp_score_outlier_cap);
            out.push(Candidate {
                loc: Some(*loc),
                win_loss: sign * rv.win_loss_value,
                sharp_score: sign * sharp,
                wl_error: rv.win_loss_error,
                score_error: rv.score_error,
                policy: mv.raw_policy,
                moves_expanded: idx,
                utility: utility_for(
                    node.pla,
                    rv.win_loss_value,
                    sharp,
                    p.utility_per_score,
                ) + p.utility_per_policy_for_sorting * mv.raw_policy,
            });
        }

        let tv = &node.this_values_not_in_book;
        let sharp = cap_sharp_score(tv.score_mean, tv.sharp_score_mean, p.sharp_score_outlier_cap);
        out.push(Candidate {
            loc: None,
            win_loss: sign * tv.win_loss_value,
            sharp_score: sign * sharp,
            wl_error: tv.win_loss_error,
            score_error: tv.score_error,
            policy: tv.max_policy,
            moves_expanded: node.moves_in_book.len(),
            utility: utility_for(node.pla, tv.win_loss_value, sharp, p.utility_per_score)
                + p.utility_per_policy_for_sorting * tv.max_policy,
        });

        out
    }

    /// The reference move: the in-book candidate with the highest utility,
    /// or the new-move candidate when nothing is in the book yet.
    pub(crate) fn best_candidate<'a>(&self, candidates: &'a [Candidate]) -> &'a Candidate {
        candidates
            .iter()
            .filter(|c| c.loc.is_some())
            .max_by(|a, b| a.utility.partial_cmp(&b.utility).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or_else(|| candidates.last().expect("candidate list never empty"))
    }

    /// Cost of one candidate move against the node's reference move.
    pub(crate) fn cost_of_candidate(
        &self,
        cand: &Candidate,
        best: &Candidate,
        pass_favored: bool,
    ) -> f64 {
        let p = &self.params;
        let ef = p.error_factor;

        let wl_loss = ((best.win_loss + ef * best.wl_error)
            - (cand.win_loss + ef * cand.wl_error))
            .clamp(0.0, WL_LOSS_CAP);

        let score_loss = ((best.sharp_score + ef * best.score_error)
            - (cand.sharp_score + ef * cand.score_error))
            .clamp(0.0, p.score_loss_cap)
            * p.utility_per_score;

        // Moves almost as good as the best get their policy boosted so a
        // low raw prior does not bury a strong move.
        let mut policy = cand.policy.max(0.0);
        if p.policy_boost_soft_utility_scale > 0.0 && best.policy > 0.0 {
            let boost = best.policy
                * ((cand.utility - best.utility) / p.policy_boost_soft_utility_scale).exp();
            policy = policy.max(boost.min(1.0));
        }
        let log_policy_penalty = -(policy.max(POLICY_EPSILON)).ln();

        let me = cand.moves_expanded as f64;
        let pass_cost = if pass_favored && cand.loc != Some(Loc::Pass) {
            p.cost_when_pass_favored
        } else {
            0.0
        };

        p.cost_per_move
            + p.cost_per_ucb_win_loss_loss * wl_loss
            + p.cost_per_ucb_win_loss_loss_pow3 * wl_loss.powi(3)
            + p.cost_per_ucb_win_loss_loss_pow7 * wl_loss.powi(7)
            + p.cost_per_ucb_score_loss * score_loss
            + p.cost_per_log_policy * log_policy_penalty
            + p.cost_per_moves_expanded * me
            + p.cost_per_squared_moves_expanded * me * me
            + pass_cost
    }

    /// Only the win/loss component of a candidate's cost, used to award the
    /// biggest-WL-cost bonus.
    pub(crate) fn wl_cost_component(&self, cand: &Candidate, best: &Candidate) -> f64 {
        let p = &self.params;
        let ef = p.error_factor;
        let wl_loss = ((best.win_loss + ef * best.wl_error)
            - (cand.win_loss + ef * cand.wl_error))
            .clamp(0.0, WL_LOSS_CAP);
        p.cost_per_ucb_win_loss_loss * wl_loss
            + p.cost_per_ucb_win_loss_loss_pow3 * wl_loss.powi(3)
            + p.cost_per_ucb_win_loss_loss_pow7 * wl_loss.powi(7)
    }

    /// Whether the node's best in-book move is a pass.
    pub(crate) fn pass_is_favored(candidates: &[Candidate]) -> bool {
        candidates
            .iter()
            .filter(|c| c.loc.is_some())
            .max_by(|a, b| a.utility.partial_cmp(&b.utility).unwrap_or(std::cmp::Ordering::Equal))
            .map(|c| c.loc == Some(Loc::Pass))
            .unwrap_or(false)
    }

    /// The node's own expansion cost (bonuses applied, except the global
    /// biggest-WL-cost bonus) and its win/loss cost component.
    pub(crate) fn expansion_cost_of(&self, node: &BookNode) -> (f64, f64) {
        let p = &self.params;
        let candidates = self.candidates_at(node);
        let best = *self.best_candidate(&candidates);
        let pass_favored = Self::pass_is_favored(&candidates);
        let new_move = candidates.last().expect("candidate list never empty");

        let raw = self.cost_of_candidate(new_move, &best, pass_favored);
        let wl_component = self.wl_cost_component(new_move, &best);

        let rv = &node.recursive_values;
        let mut bonus = p.bonus_per_win_loss_error * rv.win_loss_error
            + p.bonus_per_score_error * rv.score_error
            + p.bonus_per_sharp_score_discrepancy
                * (rv.sharp_score_mean - rv.score_mean).abs();

        // Policy mass not yet covered by any expanded move or by the best
        // remaining move suggests the node is wider than it looks.
        let expanded_policy: f64 = node.moves_in_book.iter().map(|(_, mv)| mv.raw_policy).sum();
        let excess =
            (1.0 - expanded_policy - node.this_values_not_in_book.max_policy).max(0.0);
        bonus += p.bonus_per_excess_unexpanded_policy * excess;

        if node.on_wl_pv {
            bonus += p.bonus_for_wl_pv1;
        }
        if node.wl_pv_endpoint {
            bonus += p.bonus_for_wl_pv2;
        }
        if let Some(b) = self.bonus_by_hash.get(&node.hash) {
            bonus += *b;
        }

        // Bonuses may push the cost negative; that just means "expand as
        // soon as possible" and keeps bonus differences visible in the
        // final ordering.
        (raw - bonus, wl_component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BookParams;
    use games_go::{Board, Player, Rules};

    fn p(x: u8, y: u8) -> Loc {
        Loc::Point { x, y }
    }

    fn book_with_two_children() -> (Book, crate::hash::BookHash, crate::hash::BookHash) {
        let mut book = Book::new(
            crate::LATEST_BOOK_VERSION,
            Board::new(9, 9),
            Rules::default(),
            Player::Black,
            5,
            BookParams::default(),
        );
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (a, _) = book
            .play_and_add_move(&root, &mut hist, p(2, 2), 0.3)
            .unwrap();
        let mut hist2 = book.initial_hist();
        let (b, _) = book
            .play_and_add_move(&root, &mut hist2, p(4, 4), 0.2)
            .unwrap();
        (book, a.hash, b.hash)
    }

    #[test]
    fn candidates_include_every_move_plus_the_new_move() {
        let (book, _, _) = book_with_two_children();
        let root = book.node(book.root_hash()).unwrap();
        let candidates = book.candidates_at(root);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates.last().unwrap().loc, None);
        assert_eq!(candidates[0].moves_expanded, 0);
        assert_eq!(candidates[1].moves_expanded, 1);
        assert_eq!(candidates[2].moves_expanded, 2);
    }

    #[test]
    fn worse_moves_cost_more() {
        let (mut book, a, b) = book_with_two_children();
        // Child a is clearly better for black (the root player).
        book.node_mut(a).unwrap().recursive_values.win_loss_value = -0.5;
        book.node_mut(b).unwrap().recursive_values.win_loss_value = 0.5;

        let root = book.node(book.root_hash()).unwrap();
        let candidates = book.candidates_at(root);
        let best = *book.best_candidate(&candidates);
        let cost_a = book.cost_of_candidate(&candidates[0], &best, false);
        let cost_b = book.cost_of_candidate(&candidates[1], &best, false);
        assert!(cost_b > cost_a);
    }

    #[test]
    fn best_candidate_prefers_in_book_moves() {
        let (mut book, a, _) = book_with_two_children();
        book.node_mut(a).unwrap().recursive_values.win_loss_value = -0.4;
        let root_hash = book.root_hash();
        // Even with strong this-values, the reference move is in-book.
        book.node_mut(root_hash)
            .unwrap()
            .this_values_not_in_book
            .win_loss_value = -0.9;
        let root = book.node(root_hash).unwrap();
        let candidates = book.candidates_at(root);
        assert!(book.best_candidate(&candidates).loc.is_some());
    }

    #[test]
    fn hash_bonus_lowers_expansion_cost() {
        let (mut book, a, b) = book_with_two_children();
        // Make the siblings identical, then give one a bonus.
        for h in [a, b] {
            let n = book.node_mut(h).unwrap();
            n.this_values_not_in_book.max_policy = 0.2;
        }
        let mut bonuses = std::collections::HashMap::new();
        bonuses.insert(a, 5.0);
        book.set_bonus_by_hash(bonuses);

        let (cost_a, _) = book.expansion_cost_of(book.node(a).unwrap());
        let (cost_b, _) = book.expansion_cost_of(book.node(b).unwrap());
        assert!((cost_b - cost_a - 5.0).abs() < 1e-9);
    }

    #[test]
    fn sentinel_values_do_not_overflow_the_cost() {
        let (mut book, a, _) = book_with_two_children();
        let sentinel = crate::values::BookValues::no_moves_sentinel(Player::White);
        book.set_this_values(a, sentinel);
        let (cost, wl) = book.expansion_cost_of(book.node(a).unwrap());
        assert!(cost.is_finite());
        assert!(wl.is_finite());
    }

    #[test]
    fn pass_favored_penalizes_non_pass_candidates() {
        let mut book = Book::new(
            crate::LATEST_BOOK_VERSION,
            Board::new(9, 9),
            Rules::default(),
            Player::Black,
            5,
            BookParams::default(),
        );
        let root = book.get_root();
        let mut hist = book.initial_hist();
        book.play_and_add_move(&root, &mut hist, Loc::Pass, 0.5)
            .unwrap();
        let root_node = book.node(book.root_hash()).unwrap();
        let candidates = book.candidates_at(root_node);
        assert!(Book::pass_is_favored(&candidates));

        let best = *book.best_candidate(&candidates);
        let new_move = candidates.last().unwrap();
        let with_pass = book.cost_of_candidate(new_move, &best, true);
        let without = book.cost_of_candidate(new_move, &best, false);
        assert!(
            (with_pass - without - book.params().cost_when_pass_favored).abs() < 1e-9
        );
    }
}
