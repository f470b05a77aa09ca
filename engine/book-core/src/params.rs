//! The cost/bonus parameter set pinned per book file.
//!
//! These parameters define the expansion priority function (see `cost`).
//! They are written into the book file; loading a book with different
//! values is rejected unless the caller explicitly allows changing them,
//! because changed parameters invalidate every cached cost.

use serde::{Deserialize, Serialize};

/// Cost and bonus parameters of the priority function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookParams {
    /// Scale applied to error terms inside the UCB-style loss bounds.
    pub error_factor: f64,
    /// Flat cost per move along a path and per expansion.
    pub cost_per_move: f64,
    pub cost_per_ucb_win_loss_loss: f64,
    pub cost_per_ucb_win_loss_loss_pow3: f64,
    pub cost_per_ucb_win_loss_loss_pow7: f64,
    pub cost_per_ucb_score_loss: f64,
    pub cost_per_log_policy: f64,
    /// Structural penalty per move already expanded at a node.
    pub cost_per_moves_expanded: f64,
    pub cost_per_squared_moves_expanded: f64,
    /// Extra cost when the node's best move is a pass.
    pub cost_when_pass_favored: f64,
    pub bonus_per_win_loss_error: f64,
    pub bonus_per_score_error: f64,
    pub bonus_per_sharp_score_discrepancy: f64,
    pub bonus_per_excess_unexpanded_policy: f64,
    /// Bonus for every node on the win/loss principal variation.
    pub bonus_for_wl_pv1: f64,
    /// Additional bonus at the endpoint of the win/loss principal variation.
    pub bonus_for_wl_pv2: f64,
    /// Bonus for the single node contributing the largest win/loss cost.
    pub bonus_for_biggest_wl_cost: f64,
    /// Cap on the score component of the UCB loss.
    pub score_loss_cap: f64,
    /// Utility per point of score.
    pub utility_per_score: f64,
    /// Softening scale for policy-based utility boosts.
    pub policy_boost_soft_utility_scale: f64,
    /// Utility credited per unit of raw policy when ranking moves.
    pub utility_per_policy_for_sorting: f64,
    /// Visit ceiling under which side-effect nodes may be re-expanded.
    pub max_visits_for_re_expansion: f64,
    /// Cap on |sharp score - mean score| when computing utilities.
    pub sharp_score_outlier_cap: f64,
}

impl Default for BookParams {
    fn default() -> Self {
        BookParams {
            error_factor: 1.0,
            cost_per_move: 1.0,
            cost_per_ucb_win_loss_loss: 100.0,
            cost_per_ucb_win_loss_loss_pow3: 300.0,
            cost_per_ucb_win_loss_loss_pow7: 700.0,
            cost_per_ucb_score_loss: 10.0,
            cost_per_log_policy: 1.0,
            cost_per_moves_expanded: 0.5,
            cost_per_squared_moves_expanded: 0.1,
            cost_when_pass_favored: 10.0,
            bonus_per_win_loss_error: 1.0,
            bonus_per_score_error: 0.1,
            bonus_per_sharp_score_discrepancy: 0.5,
            bonus_per_excess_unexpanded_policy: 2.0,
            bonus_for_wl_pv1: 1.0,
            bonus_for_wl_pv2: 2.0,
            bonus_for_biggest_wl_cost: 1.0,
            score_loss_cap: 10.0,
            utility_per_score: 0.05,
            policy_boost_soft_utility_scale: 0.03,
            utility_per_policy_for_sorting: 0.1,
            max_visits_for_re_expansion: 0.0,
            sharp_score_outlier_cap: 10.0,
        }
    }
}

impl BookParams {
    /// Names of fields differing between two parameter sets, for the
    /// mismatch error and the change log.
    pub fn differing_fields(&self, other: &BookParams) -> Vec<(&'static str, f64, f64)> {
        let mut diffs = Vec::new();
        macro_rules! check {
            ($field:ident) => {
                if self.$field != other.$field {
                    diffs.push((stringify!($field), self.$field, other.$field));
                }
            };
        }
        check!(error_factor);
        check!(cost_per_move);
        check!(cost_per_ucb_win_loss_loss);
        check!(cost_per_ucb_win_loss_loss_pow3);
        check!(cost_per_ucb_win_loss_loss_pow7);
        check!(cost_per_ucb_score_loss);
        check!(cost_per_log_policy);
        check!(cost_per_moves_expanded);
        check!(cost_per_squared_moves_expanded);
        check!(cost_when_pass_favored);
        check!(bonus_per_win_loss_error);
        check!(bonus_per_score_error);
        check!(bonus_per_sharp_score_discrepancy);
        check!(bonus_per_excess_unexpanded_policy);
        check!(bonus_for_wl_pv1);
        check!(bonus_for_wl_pv2);
        check!(bonus_for_biggest_wl_cost);
        check!(score_loss_cap);
        check!(utility_per_score);
        check!(policy_boost_soft_utility_scale);
        check!(utility_per_policy_for_sorting);
        check!(max_visits_for_re_expansion);
        check!(sharp_score_outlier_cap);
        diffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_params_have_no_diffs() {
        let a = BookParams::default();
        assert!(a.differing_fields(&a.clone()).is_empty());
    }

    #[test]
    fn differing_fields_are_reported_by_name() {
        let a = BookParams::default();
        let mut b = a.clone();
        b.cost_per_move = 2.0;
        b.score_loss_cap = 5.0;
        let diffs = a.differing_fields(&b);
        assert_eq!(diffs.len(), 2);
        assert!(diffs.iter().any(|d| d.0 == "cost_per_move"));
        assert!(diffs.iter().any(|d| d.0 == "score_loss_cap"));
    }
}
