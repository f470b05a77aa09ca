//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable
//! overrides.

use crate::structs::GenbookConfig;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Standard locations to search for genbook.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "genbook.toml",    // Current directory
    "../genbook.toml", // Parent directory (when running from a subdirectory)
];

/// Load the generator configuration from genbook.toml.
///
/// Searches in the following order:
/// 1. Path specified by the GENBOOK_CONFIG environment variable
/// 2. Current directory (genbook.toml)
/// 3. Parent directory (../genbook.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> GenbookConfig {
    if let Ok(path) = std::env::var("GENBOOK_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from GENBOOK_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "GENBOOK_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("No genbook.toml found, using built-in defaults");
    apply_env_overrides(GenbookConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &PathBuf) -> GenbookConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(GenbookConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(GenbookConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (usize, i64, f64, bool, ...)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: GENBOOK_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: GenbookConfig) -> GenbookConfig {
    // Common
    env_override!(config, common.log_level, "GENBOOK_COMMON_LOG_LEVEL");

    // Book
    env_override!(config, book.board_size_x, "GENBOOK_BOOK_BOARD_SIZE_X", parse);
    env_override!(config, book.board_size_y, "GENBOOK_BOOK_BOARD_SIZE_Y", parse);
    env_override!(config, book.rep_bound, "GENBOOK_BOOK_REP_BOUND", parse);
    env_override!(config, book.komi, "GENBOOK_BOOK_KOMI", parse);

    // Cost
    env_override!(config, cost.error_factor, "GENBOOK_COST_ERROR_FACTOR", parse);
    env_override!(config, cost.cost_per_move, "GENBOOK_COST_COST_PER_MOVE", parse);
    env_override!(
        config,
        cost.cost_per_ucb_win_loss_loss,
        "GENBOOK_COST_COST_PER_UCB_WIN_LOSS_LOSS",
        parse
    );
    env_override!(
        config,
        cost.cost_per_ucb_score_loss,
        "GENBOOK_COST_COST_PER_UCB_SCORE_LOSS",
        parse
    );
    env_override!(
        config,
        cost.cost_per_log_policy,
        "GENBOOK_COST_COST_PER_LOG_POLICY",
        parse
    );
    env_override!(
        config,
        cost.utility_per_score,
        "GENBOOK_COST_UTILITY_PER_SCORE",
        parse
    );

    // Search
    env_override!(config, search.max_visits, "GENBOOK_SEARCH_MAX_VISITS", parse);
    env_override!(
        config,
        search.max_visits_for_leaves,
        "GENBOOK_SEARCH_MAX_VISITS_FOR_LEAVES",
        parse
    );
    env_override!(
        config,
        search.num_game_threads,
        "GENBOOK_SEARCH_NUM_GAME_THREADS",
        parse
    );
    env_override!(
        config,
        search.num_to_expand_per_iteration,
        "GENBOOK_SEARCH_NUM_TO_EXPAND_PER_ITERATION",
        parse
    );
    env_override!(
        config,
        search.log_search_info,
        "GENBOOK_SEARCH_LOG_SEARCH_INFO",
        parse
    );

    config
}
