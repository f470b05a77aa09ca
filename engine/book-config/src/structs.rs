//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default
//! values. `GenbookConfig` maps one-to-one onto `genbook.toml`.

use book_core::BookParams;
use serde::{Deserialize, Serialize};

use crate::defaults;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// ============================================================================

fn d_log_level() -> String {
    defaults::LOG_LEVEL.into()
}
fn d_board_size_x() -> usize {
    defaults::BOARD_SIZE_X
}
fn d_board_size_y() -> usize {
    defaults::BOARD_SIZE_Y
}
fn d_rep_bound() -> usize {
    defaults::REP_BOUND
}
fn d_komi() -> f64 {
    defaults::KOMI
}
fn d_error_factor() -> f64 {
    defaults::ERROR_FACTOR
}
fn d_cost_per_move() -> f64 {
    defaults::COST_PER_MOVE
}
fn d_cost_per_ucb_wl() -> f64 {
    defaults::COST_PER_UCB_WIN_LOSS_LOSS
}
fn d_cost_per_ucb_wl_pow3() -> f64 {
    defaults::COST_PER_UCB_WIN_LOSS_LOSS_POW3
}
fn d_cost_per_ucb_wl_pow7() -> f64 {
    defaults::COST_PER_UCB_WIN_LOSS_LOSS_POW7
}
fn d_cost_per_ucb_score() -> f64 {
    defaults::COST_PER_UCB_SCORE_LOSS
}
fn d_cost_per_log_policy() -> f64 {
    defaults::COST_PER_LOG_POLICY
}
fn d_cost_per_moves_expanded() -> f64 {
    defaults::COST_PER_MOVES_EXPANDED
}
fn d_cost_per_squared_moves_expanded() -> f64 {
    defaults::COST_PER_SQUARED_MOVES_EXPANDED
}
fn d_cost_when_pass_favored() -> f64 {
    defaults::COST_WHEN_PASS_FAVORED
}
fn d_bonus_per_wl_error() -> f64 {
    defaults::BONUS_PER_WIN_LOSS_ERROR
}
fn d_bonus_per_score_error() -> f64 {
    defaults::BONUS_PER_SCORE_ERROR
}
fn d_bonus_per_sharp_discrepancy() -> f64 {
    defaults::BONUS_PER_SHARP_SCORE_DISCREPANCY
}
fn d_bonus_per_excess_policy() -> f64 {
    defaults::BONUS_PER_EXCESS_UNEXPANDED_POLICY
}
fn d_bonus_for_wl_pv1() -> f64 {
    defaults::BONUS_FOR_WL_PV1
}
fn d_bonus_for_wl_pv2() -> f64 {
    defaults::BONUS_FOR_WL_PV2
}
fn d_bonus_for_biggest_wl_cost() -> f64 {
    defaults::BONUS_FOR_BIGGEST_WL_COST
}
fn d_score_loss_cap() -> f64 {
    defaults::SCORE_LOSS_CAP
}
fn d_utility_per_score() -> f64 {
    defaults::UTILITY_PER_SCORE
}
fn d_policy_boost_soft_utility_scale() -> f64 {
    defaults::POLICY_BOOST_SOFT_UTILITY_SCALE
}
fn d_utility_per_policy_for_sorting() -> f64 {
    defaults::UTILITY_PER_POLICY_FOR_SORTING
}
fn d_max_visits_for_re_expansion() -> f64 {
    defaults::MAX_VISITS_FOR_RE_EXPANSION
}
fn d_sharp_score_outlier_cap() -> f64 {
    defaults::SHARP_SCORE_OUTLIER_CAP
}
fn d_max_visits() -> i64 {
    defaults::MAX_VISITS
}
fn d_cpuct_exploration() -> f64 {
    defaults::CPUCT_EXPLORATION
}
fn d_cpuct_exploration_log() -> f64 {
    defaults::CPUCT_EXPLORATION_LOG
}
fn d_wide_root_noise() -> f64 {
    defaults::WIDE_ROOT_NOISE
}
fn d_wide_root_noise_book_explore() -> f64 {
    defaults::WIDE_ROOT_NOISE_BOOK_EXPLORE
}
fn d_cpuct_exploration_log_book_explore() -> f64 {
    defaults::CPUCT_EXPLORATION_LOG_BOOK_EXPLORE
}
fn d_min_tree_visits_to_record() -> i64 {
    defaults::MIN_TREE_VISITS_TO_RECORD
}
fn d_max_depth_to_record() -> usize {
    defaults::MAX_DEPTH_TO_RECORD
}
fn d_max_visits_for_leaves() -> i64 {
    defaults::MAX_VISITS_FOR_LEAVES
}
fn d_num_game_threads() -> usize {
    defaults::NUM_GAME_THREADS
}
fn d_num_to_expand_per_iteration() -> usize {
    defaults::NUM_TO_EXPAND_PER_ITERATION
}
fn d_log_search_info() -> bool {
    defaults::LOG_SEARCH_INFO
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching genbook.toml
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct GenbookConfig {
    #[serde(default)]
    pub common: CommonSection,
    #[serde(default)]
    pub book: BookSection,
    #[serde(default)]
    pub cost: CostSection,
    #[serde(default)]
    pub search: SearchSection,
}

/// Common configuration shared by all commands
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CommonSection {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonSection {
    fn default() -> Self {
        Self {
            log_level: defaults::LOG_LEVEL.into(),
        }
    }
}

/// Board, rules, and hashing parameters pinned per book
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BookSection {
    #[serde(default = "d_board_size_x")]
    pub board_size_x: usize,
    #[serde(default = "d_board_size_y")]
    pub board_size_y: usize,
    #[serde(default = "d_rep_bound")]
    pub rep_bound: usize,
    #[serde(default = "d_komi")]
    pub komi: f64,
}

impl Default for BookSection {
    fn default() -> Self {
        Self {
            board_size_x: defaults::BOARD_SIZE_X,
            board_size_y: defaults::BOARD_SIZE_Y,
            rep_bound: defaults::REP_BOUND,
            komi: defaults::KOMI,
        }
    }
}

/// Cost/bonus parameters of the expansion priority function
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CostSection {
    #[serde(default = "d_error_factor")]
    pub error_factor: f64,
    #[serde(default = "d_cost_per_move")]
    pub cost_per_move: f64,
    #[serde(default = "d_cost_per_ucb_wl")]
    pub cost_per_ucb_win_loss_loss: f64,
    #[serde(default = "d_cost_per_ucb_wl_pow3")]
    pub cost_per_ucb_win_loss_loss_pow3: f64,
    #[serde(default = "d_cost_per_ucb_wl_pow7")]
    pub cost_per_ucb_win_loss_loss_pow7: f64,
    #[serde(default = "d_cost_per_ucb_score")]
    pub cost_per_ucb_score_loss: f64,
    #[serde(default = "d_cost_per_log_policy")]
    pub cost_per_log_policy: f64,
    #[serde(default = "d_cost_per_moves_expanded")]
    pub cost_per_moves_expanded: f64,
    #[serde(default = "d_cost_per_squared_moves_expanded")]
    pub cost_per_squared_moves_expanded: f64,
    #[serde(default = "d_cost_when_pass_favored")]
    pub cost_when_pass_favored: f64,
    #[serde(default = "d_bonus_per_wl_error")]
    pub bonus_per_win_loss_error: f64,
    #[serde(default = "d_bonus_per_score_error")]
    pub bonus_per_score_error: f64,
    #[serde(default = "d_bonus_per_sharp_discrepancy")]
    pub bonus_per_sharp_score_discrepancy: f64,
    #[serde(default = "d_bonus_per_excess_policy")]
    pub bonus_per_excess_unexpanded_policy: f64,
    #[serde(default = "d_bonus_for_wl_pv1")]
    pub bonus_for_wl_pv1: f64,
    #[serde(default = "d_bonus_for_wl_pv2")]
    pub bonus_for_wl_pv2: f64,
    #[serde(default = "d_bonus_for_biggest_wl_cost")]
    pub bonus_for_biggest_wl_cost: f64,
    #[serde(default = "d_score_loss_cap")]
    pub score_loss_cap: f64,
    #[serde(default = "d_utility_per_score")]
    pub utility_per_score: f64,
    #[serde(default = "d_policy_boost_soft_utility_scale")]
    pub policy_boost_soft_utility_scale: f64,
    #[serde(default = "d_utility_per_policy_for_sorting")]
    pub utility_per_policy_for_sorting: f64,
    #[serde(default = "d_max_visits_for_re_expansion")]
    pub max_visits_for_re_expansion: f64,
    #[serde(default = "d_sharp_score_outlier_cap")]
    pub sharp_score_outlier_cap: f64,
}

impl Default for CostSection {
    fn default() -> Self {
        Self {
            error_factor: defaults::ERROR_FACTOR,
            cost_per_move: defaults::COST_PER_MOVE,
            cost_per_ucb_win_loss_loss: defaults::COST_PER_UCB_WIN_LOSS_LOSS,
            cost_per_ucb_win_loss_loss_pow3: defaults::COST_PER_UCB_WIN_LOSS_LOSS_POW3,
            cost_per_ucb_win_loss_loss_pow7: defaults::COST_PER_UCB_WIN_LOSS_LOSS_POW7,
            cost_per_ucb_score_loss: defaults::COST_PER_UCB_SCORE_LOSS,
            cost_per_log_policy: defaults::COST_PER_LOG_POLICY,
            cost_per_moves_expanded: defaults::COST_PER_MOVES_EXPANDED,
            cost_per_squared_moves_expanded: defaults::COST_PER_SQUARED_MOVES_EXPANDED,
            cost_when_pass_favored: defaults::COST_WHEN_PASS_FAVORED,
            bonus_per_win_loss_error: defaults::BONUS_PER_WIN_LOSS_ERROR,
            bonus_per_score_error: defaults::BONUS_PER_SCORE_ERROR,
            bonus_per_sharp_score_discrepancy: defaults::BONUS_PER_SHARP_SCORE_DISCREPANCY,
            bonus_per_excess_unexpanded_policy: defaults::BONUS_PER_EXCESS_UNEXPANDED_POLICY,
            bonus_for_wl_pv1: defaults::BONUS_FOR_WL_PV1,
            bonus_for_wl_pv2: defaults::BONUS_FOR_WL_PV2,
            bonus_for_biggest_wl_cost: defaults::BONUS_FOR_BIGGEST_WL_COST,
            score_loss_cap: defaults::SCORE_LOSS_CAP,
            utility_per_score: defaults::UTILITY_PER_SCORE,
            policy_boost_soft_utility_scale: defaults::POLICY_BOOST_SOFT_UTILITY_SCALE,
            utility_per_policy_for_sorting: defaults::UTILITY_PER_POLICY_FOR_SORTING,
            max_visits_for_re_expansion: defaults::MAX_VISITS_FOR_RE_EXPANSION,
            sharp_score_outlier_cap: defaults::SHARP_SCORE_OUTLIER_CAP,
        }
    }
}

/// Searcher parameters and worker pool sizing
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SearchSection {
    #[serde(default = "d_max_visits")]
    pub max_visits: i64,
    #[serde(default = "d_cpuct_exploration")]
    pub cpuct_exploration: f64,
    #[serde(default = "d_cpuct_exploration_log")]
    pub cpuct_exploration_log: f64,
    #[serde(default = "d_wide_root_noise")]
    pub wide_root_noise: f64,
    #[serde(default = "d_wide_root_noise_book_explore")]
    pub wide_root_noise_book_explore: f64,
    #[serde(default = "d_cpuct_exploration_log_book_explore")]
    pub cpuct_exploration_log_book_explore: f64,
    #[serde(default = "d_min_tree_visits_to_record")]
    pub min_tree_visits_to_record: i64,
    #[serde(default = "d_max_depth_to_record")]
    pub max_depth_to_record: usize,
    #[serde(default = "d_max_visits_for_leaves")]
    pub max_visits_for_leaves: i64,
    #[serde(default = "d_num_game_threads")]
    pub num_game_threads: usize,
    #[serde(default = "d_num_to_expand_per_iteration")]
    pub num_to_expand_per_iteration: usize,
    #[serde(default = "d_log_search_info")]
    pub log_search_info: bool,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            max_visits: defaults::MAX_VISITS,
            cpuct_exploration: defaults::CPUCT_EXPLORATION,
            cpuct_exploration_log: defaults::CPUCT_EXPLORATION_LOG,
            wide_root_noise: defaults::WIDE_ROOT_NOISE,
            wide_root_noise_book_explore: defaults::WIDE_ROOT_NOISE_BOOK_EXPLORE,
            cpuct_exploration_log_book_explore: defaults::CPUCT_EXPLORATION_LOG_BOOK_EXPLORE,
            min_tree_visits_to_record: defaults::MIN_TREE_VISITS_TO_RECORD,
            max_depth_to_record: defaults::MAX_DEPTH_TO_RECORD,
            max_visits_for_leaves: defaults::MAX_VISITS_FOR_LEAVES,
            num_game_threads: defaults::NUM_GAME_THREADS,
            num_to_expand_per_iteration: defaults::NUM_TO_EXPAND_PER_ITERATION,
            log_search_info: defaults::LOG_SEARCH_INFO,
        }
    }
}

impl GenbookConfig {
    /// The cost section as the parameter set pinned into a book file.
    pub fn book_params(&self) -> BookParams {
        let c = &self.cost;
        BookParams {
            error_factor: c.error_factor,
            cost_per_move: c.cost_per_move,
            cost_per_ucb_win_loss_loss: c.cost_per_ucb_win_loss_loss,
            cost_per_ucb_win_loss_loss_pow3: c.cost_per_ucb_win_loss_loss_pow3,
            cost_per_ucb_win_loss_loss_pow7: c.cost_per_ucb_win_loss_loss_pow7,
            cost_per_ucb_score_loss: c.cost_per_ucb_score_loss,
            cost_per_log_policy: c.cost_per_log_policy,
            cost_per_moves_expanded: c.cost_per_moves_expanded,
            cost_per_squared_moves_expanded: c.cost_per_squared_moves_expanded,
            cost_when_pass_favored: c.cost_when_pass_favored,
            bonus_per_win_loss_error: c.bonus_per_win_loss_error,
            bonus_per_score_error: c.bonus_per_score_error,
            bonus_per_sharp_score_discrepancy: c.bonus_per_sharp_score_discrepancy,
            bonus_per_excess_unexpanded_policy: c.bonus_per_excess_unexpanded_policy,
            bonus_for_wl_pv1: c.bonus_for_wl_pv1,
            bonus_for_wl_pv2: c.bonus_for_wl_pv2,
            bonus_for_biggest_wl_cost: c.bonus_for_biggest_wl_cost,
            score_loss_cap: c.score_loss_cap,
            utility_per_score: c.utility_per_score,
            policy_boost_soft_utility_scale: c.policy_boost_soft_utility_scale,
            utility_per_policy_for_sorting: c.utility_per_policy_for_sorting,
            max_visits_for_re_expansion: c.max_visits_for_re_expansion,
            sharp_score_outlier_cap: c.sharp_score_outlier_cap,
        }
    }

    /// Serialized form written next to the book file as `<book>.cfg`.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
