use crate::defaults;
use crate::loader::{apply_env_overrides, load_from_path};
use crate::structs::GenbookConfig;

#[test]
fn default_config_matches_defaults_module() {
    let config = GenbookConfig::default();
    assert_eq!(config.common.log_level, defaults::LOG_LEVEL);
    assert_eq!(config.book.board_size_x, defaults::BOARD_SIZE_X);
    assert_eq!(config.book.rep_bound, defaults::REP_BOUND);
    assert_eq!(config.cost.cost_per_move, defaults::COST_PER_MOVE);
    assert_eq!(config.search.max_visits, defaults::MAX_VISITS);
    assert_eq!(
        config.search.num_to_expand_per_iteration,
        defaults::NUM_TO_EXPAND_PER_ITERATION
    );
}

#[test]
fn partial_toml_fills_in_defaults() {
    let toml_text = r#"
[book]
board_size_x = 9
board_size_y = 9

[cost]
cost_per_move = 2.5
"#;
    let config: GenbookConfig = toml::from_str(toml_text).unwrap();
    assert_eq!(config.book.board_size_x, 9);
    assert_eq!(config.book.board_size_y, 9);
    // Untouched fields keep their defaults.
    assert_eq!(config.book.rep_bound, defaults::REP_BOUND);
    assert_eq!(config.cost.cost_per_move, 2.5);
    assert_eq!(
        config.cost.cost_per_ucb_win_loss_loss,
        defaults::COST_PER_UCB_WIN_LOSS_LOSS
    );
}

#[test]
fn empty_toml_is_all_defaults() {
    let config: GenbookConfig = toml::from_str("").unwrap();
    assert_eq!(config.search.num_game_threads, defaults::NUM_GAME_THREADS);
    assert!(!config.search.log_search_info);
}

#[test]
fn book_params_mirror_the_cost_section() {
    let mut config = GenbookConfig::default();
    config.cost.cost_per_move = 3.0;
    config.cost.score_loss_cap = 7.5;
    let params = config.book_params();
    assert_eq!(params.cost_per_move, 3.0);
    assert_eq!(params.score_loss_cap, 7.5);
    assert_eq!(params.error_factor, defaults::ERROR_FACTOR);
}

#[test]
fn config_round_trips_through_toml() {
    let config = GenbookConfig::default();
    let text = config.to_toml_string();
    let parsed: GenbookConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.cost.cost_per_move, config.cost.cost_per_move);
    assert_eq!(parsed.search.max_visits, config.search.max_visits);
}

#[test]
fn load_from_path_reads_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genbook.toml");
    std::fs::write(&path, "[search]\nmax_visits = 123\n").unwrap();
    let config = load_from_path(&path);
    assert_eq!(config.search.max_visits, 123);
}

#[test]
fn unparseable_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genbook.toml");
    std::fs::write(&path, "this is not toml [[[").unwrap();
    let config = load_from_path(&path);
    assert_eq!(config.search.max_visits, defaults::MAX_VISITS);
}

#[test]
fn env_override_applies_and_parses() {
    // Uses a variable no other test reads, since tests share the process
    // environment.
    std::env::set_var("GENBOOK_SEARCH_NUM_GAME_THREADS", "7");
    let config = apply_env_overrides(GenbookConfig::default());
    std::env::remove_var("GENBOOK_SEARCH_NUM_GAME_THREADS");
    assert_eq!(config.search.num_game_threads, 7);
}
