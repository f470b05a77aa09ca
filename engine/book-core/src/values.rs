//! Per-node value estimates.
//!
//! All win/loss and score values are from White's perspective: positive
//! favors White. Utility conversions flip the sign for Black so that every
//! player maximizes.

use serde::{Deserialize, Serialize};

use games_go::{BoardHistory, Player};

/// Sentinel magnitude for "no new move exists from this node".
pub const NO_MOVES_SENTINEL: f64 = 1e20;

/// The searcher's estimate of the best move from a node that is not yet in
/// the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookValues {
    pub win_loss_value: f64,
    pub score_mean: f64,
    pub sharp_score_mean: f64,
    pub win_loss_error: f64,
    pub score_error: f64,
    pub score_stdev: f64,
    pub max_policy: f64,
    pub weight: f64,
    pub visits: f64,
}

impl Default for BookValues {
    fn default() -> Self {
        BookValues {
            win_loss_value: 0.0,
            score_mean: 0.0,
            sharp_score_mean: 0.0,
            win_loss_error: 0.0,
            score_error: 0.0,
            score_stdev: 0.0,
            max_policy: 0.0,
            weight: 0.0,
            visits: 0.0,
        }
    }
}

impl BookValues {
    /// Pessimistic sentinel for a node with no new moves left: the worst
    /// possible outcome for the player to move.
    pub fn no_moves_sentinel(pla: Player) -> BookValues {
        let v = match pla {
            Player::White => -NO_MOVES_SENTINEL,
            Player::Black => NO_MOVES_SENTINEL,
        };
        BookValues {
            win_loss_value: v,
            score_mean: v,
            sharp_score_mean: v,
            ..BookValues::default()
        }
    }

    /// Values for a finished game, taken directly from the result.
    pub fn from_terminal(hist: &BoardHistory, visits: f64) -> BookValues {
        let (win_loss, score) = if hist.is_no_result {
            (0.0, 0.0)
        } else {
            let wl = match hist.winner {
                Some(Player::White) => 1.0,
                Some(Player::Black) => -1.0,
                None => 0.0,
            };
            (wl, hist.final_white_minus_black_score)
        };
        BookValues {
            win_loss_value: win_loss,
            score_mean: score,
            sharp_score_mean: score,
            win_loss_error: 0.0,
            score_error: 0.0,
            score_stdev: 0.0,
            max_policy: 1.0,
            weight: visits,
            visits,
        }
    }

    pub fn is_no_moves_sentinel(&self) -> bool {
        self.win_loss_value.abs() >= NO_MOVES_SENTINEL
    }
}

/// Values aggregated over the best line below a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecursiveValues {
    pub win_loss_value: f64,
    pub score_mean: f64,
    pub sharp_score_mean: f64,
    pub win_loss_error: f64,
    pub score_error: f64,
    pub score_stdev: f64,
    pub weight: f64,
    pub visits: f64,
}

impl RecursiveValues {
    pub fn from_this_values(v: &BookValues) -> RecursiveValues {
        RecursiveValues {
            win_loss_value: v.win_loss_value,
            score_mean: v.score_mean,
            sharp_score_mean: v.sharp_score_mean,
            win_loss_error: v.win_loss_error,
            score_error: v.score_error,
            score_stdev: v.score_stdev,
            weight: v.weight,
            visits: v.visits,
        }
    }
}

/// Utility of a set of values from White's fixed perspective.
pub fn utility_white(
    win_loss_value: f64,
    sharp_score: f64,
    utility_per_score: f64,
) -> f64 {
    win_loss_value + utility_per_score * sharp_score
}

/// Utility from the perspective of the player to move at a node.
pub fn utility_for(
    pla: Player,
    win_loss_value: f64,
    sharp_score: f64,
    utility_per_score: f64,
) -> f64 {
    let u = utility_white(win_loss_value, sharp_score, utility_per_score);
    match pla {
        Player::White => u,
        Player::Black => -u,
    }
}

/// Clamp a sharp score toward the plain mean so a single outlier estimate
/// cannot dominate the utility.
pub fn cap_sharp_score(score_mean: f64, sharp_score: f64, outlier_cap: f64) -> f64 {
    sharp_score.clamp(score_mean - outlier_cap, score_mean + outlier_cap)
}
