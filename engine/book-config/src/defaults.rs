//! Default configuration values.
//!
//! Single source of truth for every default used by the generator. The
//! cost defaults are deliberately conservative: a fresh book explores the
//! principal variation before widening.

// Common defaults
pub const LOG_LEVEL: &str = "info";

// Book defaults
pub const BOARD_SIZE_X: usize = 19;
pub const BOARD_SIZE_Y: usize = 19;
pub const REP_BOUND: usize = 5;
pub const KOMI: f64 = 7.0;

// Cost/bonus defaults
pub const ERROR_FACTOR: f64 = 1.0;
pub const COST_PER_MOVE: f64 = 1.0;
pub const COST_PER_UCB_WIN_LOSS_LOSS: f64 = 100.0;
pub const COST_PER_UCB_WIN_LOSS_LOSS_POW3: f64 = 300.0;
pub const COST_PER_UCB_WIN_LOSS_LOSS_POW7: f64 = 700.0;
pub const COST_PER_UCB_SCORE_LOSS: f64 = 10.0;
pub const COST_PER_LOG_POLICY: f64 = 1.0;
pub const COST_PER_MOVES_EXPANDED: f64 = 0.5;
pub const COST_PER_SQUARED_MOVES_EXPANDED: f64 = 0.1;
pub const COST_WHEN_PASS_FAVORED: f64 = 10.0;
pub const BONUS_PER_WIN_LOSS_ERROR: f64 = 1.0;
pub const BONUS_PER_SCORE_ERROR: f64 = 0.1;
pub const BONUS_PER_SHARP_SCORE_DISCREPANCY: f64 = 0.5;
pub const BONUS_PER_EXCESS_UNEXPANDED_POLICY: f64 = 2.0;
pub const BONUS_FOR_WL_PV1: f64 = 1.0;
pub const BONUS_FOR_WL_PV2: f64 = 2.0;
pub const BONUS_FOR_BIGGEST_WL_COST: f64 = 1.0;
pub const SCORE_LOSS_CAP: f64 = 10.0;
pub const UTILITY_PER_SCORE: f64 = 0.05;
pub const POLICY_BOOST_SOFT_UTILITY_SCALE: f64 = 0.03;
pub const UTILITY_PER_POLICY_FOR_SORTING: f64 = 0.1;
pub const MAX_VISITS_FOR_RE_EXPANSION: f64 = 0.0;
pub const SHARP_SCORE_OUTLIER_CAP: f64 = 10.0;

// Search defaults
pub const MAX_VISITS: i64 = 1000;
pub const CPUCT_EXPLORATION: f64 = 1.0;
pub const CPUCT_EXPLORATION_LOG: f64 = 0.45;
pub const WIDE_ROOT_NOISE: f64 = 0.0;
pub const WIDE_ROOT_NOISE_BOOK_EXPLORE: f64 = 0.05;
pub const CPUCT_EXPLORATION_LOG_BOOK_EXPLORE: f64 = 1.0;
pub const MIN_TREE_VISITS_TO_RECORD: i64 = 40;
pub const MAX_DEPTH_TO_RECORD: usize = 2;
pub const MAX_VISITS_FOR_LEAVES: i64 = 300;
pub const NUM_GAME_THREADS: usize = 1;
pub const NUM_TO_EXPAND_PER_ITERATION: usize = 1;
pub const LOG_SEARCH_INFO: bool = false;
