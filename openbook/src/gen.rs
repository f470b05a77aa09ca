//! The `genbook` command: load or create the book, then expand it for a
//! number of iterations or trace another book into it.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use book_config::GenbookConfig;
use book_core::{Book, BookHash, BookParams, LATEST_BOOK_VERSION};
use games_go::{Board, Player, Rules, MAX_LEN};
use search_api::{FlatSearcher, NnEvaluator, SearchParams, Searcher, UniformEvaluator};

use crate::bonus;
use crate::cli::GenbookArgs;
use crate::expand::{ExpandSettings, Expander};
use crate::trace;

fn search_params(config: &GenbookConfig) -> SearchParams {
    SearchParams {
        max_visits: config.search.max_visits,
        cpuct_exploration: config.search.cpuct_exploration,
        cpuct_exploration_log: config.search.cpuct_exploration_log,
        wide_root_noise: config.search.wide_root_noise,
    }
}

/// Reject or adopt differing cost/bonus parameters on a loaded book.
fn reconcile_book_params(book: &mut Book, new_params: &BookParams, allow: bool) -> Result<()> {
    let diffs = book.params().differing_fields(new_params);
    if diffs.is_empty() {
        return Ok(());
    }
    if !allow {
        let names: Vec<&str> = diffs.iter().map(|d| d.0).collect();
        bail!(
            "book parameters do not match: {} (pass --allow-changing-book-params to adopt \
             the new values)",
            names.join(", ")
        );
    }
    for (name, old, new) in &diffs {
        info!("changing {name} from {old} to {new}");
    }
    book.set_params(new_params.clone());
    Ok(())
}

/// Save the book plus the `<book>.cfg` sidecar holding the configuration.
fn save_book_and_config(book: &Book, path: &Path, config: &GenbookConfig) -> Result<()> {
    book.save_to_file(path)?;
    let mut cfg_path = path.as_os_str().to_owned();
    cfg_path.push(".cfg");
    std::fs::write(&cfg_path, config.to_toml_string())
        .with_context(|| format!("failed to write config sidecar next to {}", path.display()))?;
    Ok(())
}

/// The expansion driver: each round picks the cheapest frontier nodes,
/// expands them on the worker pool, then recomputes values and costs over
/// the dirty set. Saves every `save_every` rounds.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_expansion_iterations(
    expander: &Expander,
    num_iters: u32,
    save_every: u32,
    num_to_expand_per_iteration: usize,
    num_threads: usize,
    make_searcher: &(dyn Fn() -> Box<dyn Searcher> + Sync),
    book_path: &Path,
    config: &GenbookConfig,
) -> Result<()> {
    for iteration in 0..num_iters {
        if expander.stop.load(Ordering::Acquire) {
            break;
        }

        if iteration != 0 && save_every > 0 && iteration % save_every == 0 {
            info!(path = %book_path.display(), "saving to file");
            save_book_and_config(&*expander.lock_book()?, book_path, config)?;
        }

        info!(iteration, "beginning book expansion iteration");

        // Early iterations expand few nodes so the costs stay honest while
        // the book is still tiny.
        let count = ((1 + iteration / 2) as usize).min(num_to_expand_per_iteration);
        let nodes = expander.lock_book()?.get_next_n_to_expand(count);
        if nodes.is_empty() {
            info!("no expandable nodes remain");
            break;
        }

        let dirty: Mutex<Vec<BookHash>> = Mutex::new(nodes.iter().map(|n| n.hash).collect());
        let queue: Mutex<VecDeque<BookHash>> =
            Mutex::new(nodes.iter().map(|n| n.hash).collect());
        let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);

        std::thread::scope(|scope| {
            for _ in 0..num_threads.max(1) {
                scope.spawn(|| {
                    let mut searcher = make_searcher();
                    loop {
                        if expander.stop.load(Ordering::Acquire) {
                            return;
                        }
                        let Some(hash) = queue.lock().ok().and_then(|mut q| q.pop_front())
                        else {
                            return;
                        };
                        if let Err(e) = expander.expand_node(searcher.as_mut(), hash, &dirty) {
                            if let Ok(mut slot) = first_error.lock() {
                                slot.get_or_insert(e);
                            }
                            expander.stop.store(true, Ordering::Release);
                            return;
                        }
                    }
                });
            }
        });

        // A fatal integrity failure terminates without saving.
        if let Some(e) = first_error.into_inner().ok().flatten() {
            return Err(e);
        }

        // Complete the round's recompute even when stopping, so the book
        // stays consistent for the final save.
        let dirty = dirty
            .into_inner()
            .map_err(|e| anyhow!("dirty set lock poisoned: {e}"))?;
        expander.lock_book()?.recompute(&dirty);

        if expander.stop.load(Ordering::Acquire) {
            break;
        }
    }
    Ok(())
}

pub fn run_genbook(args: &GenbookArgs, config: &GenbookConfig) -> Result<()> {
    if args.trace_book_file.is_some() && args.num_iters > 0 {
        bail!("cannot specify --num-iters and --trace-book-file at the same time");
    }
    if args.html_dir.is_some() || args.html_dev_mode || args.html_min_visits > 0.0 {
        warn!("html export is not supported in this build; ignoring the html flags");
    }

    let (size_x, size_y) = (config.book.board_size_x, config.book.board_size_y);
    if !(2..=MAX_LEN).contains(&size_x) || !(2..=MAX_LEN).contains(&size_y) {
        bail!("board size {size_x}x{size_y} out of range");
    }
    let rules = Rules {
        komi: config.book.komi,
    };
    let rep_bound = config.book.rep_bound;

    let bonus_data = match &args.bonus_file {
        Some(path) => Some(bonus::load_bonus_file(path, size_x, size_y, rules, rep_bound)?),
        None => None,
    };
    let initial_board = bonus_data
        .as_ref()
        .map(|b| b.initial_board.clone())
        .unwrap_or_else(|| Board::new(size_x, size_y));
    let initial_pla = bonus_data
        .as_ref()
        .map(|b| b.initial_pla)
        .unwrap_or(Player::Black);

    let mut book = if args.book_file.exists() {
        let book = Book::load_from_file(&args.book_file)?;
        if book.initial_board.x_size() != size_x
            || book.initial_board.y_size() != size_y
            || book.rep_bound != rep_bound
            || book.rules != rules
        {
            bail!("book parameters do not match: board size, rep bound, or rules differ from the config");
        }
        if let Some(b) = &bonus_data {
            if book.initial_board != b.initial_board {
                bail!("book initial board and initial board in the bonus sgf do not match");
            }
            if book.initial_pla != b.initial_pla {
                bail!(
                    "book initial player ({}) and initial player in the bonus sgf ({}) do \
                     not match",
                    book.initial_pla,
                    b.initial_pla
                );
            }
        }
        info!(
            nodes = book.size(),
            version = book.book_version,
            "loaded preexisting book from {}",
            args.book_file.display()
        );
        book
    } else {
        info!(
            "initializing new book with starting position:\n{}",
            initial_board
        );
        let book = Book::new(
            LATEST_BOOK_VERSION,
            initial_board,
            rules,
            initial_pla,
            rep_bound,
            config.book_params(),
        );
        info!(path = %args.book_file.display(), "creating new book");
        save_book_and_config(&book, &args.book_file, config)?;
        book
    };

    reconcile_book_params(&mut book, &config.book_params(), args.allow_changing_book_params)?;

    let trace_book = match &args.trace_book_file {
        Some(path) => {
            let mut trace_book = Book::load_from_file(path)?;
            trace_book.recompute_everything();
            info!(
                nodes = trace_book.size(),
                min_visits = args.trace_book_min_visits,
                "loaded trace book from {}",
                path.display()
            );
            Some(trace_book)
        }
        None => None,
    };

    book.set_bonus_by_hash(
        bonus_data
            .map(|b| b.bonus_by_hash)
            .unwrap_or_default(),
    );
    book.recompute_everything();

    // No real neural net is wired in this build: the reference searcher
    // spreads its visit budget over the uniform symmetry-averaged policy.
    let nn: Arc<dyn NnEvaluator> = Arc::new(UniformEvaluator::new());
    let params = search_params(config);
    let make_searcher = {
        let nn = Arc::clone(&nn);
        let params = params.clone();
        move || -> Box<dyn Searcher> { Box::new(FlatSearcher::new(Arc::clone(&nn), params.clone())) }
    };

    let book = Mutex::new(book);
    let expander = Expander {
        book: &book,
        nn,
        params,
        settings: ExpandSettings::from_config(config),
        stop: crate::stop_flag(),
    };

    if let Some(trace_book) = &trace_book {
        trace::run_trace(
            &expander,
            trace_book,
            args.trace_book_min_visits,
            config.search.num_game_threads,
            &make_searcher,
        )?;
    } else {
        run_expansion_iterations(
            &expander,
            args.num_iters,
            args.save_every,
            config.search.num_to_expand_per_iteration,
            config.search.num_game_threads,
            &make_searcher,
            &args.book_file,
            config,
        )?;
    }

    if trace_book.is_some() || args.num_iters > 0 {
        info!(path = %args.book_file.display(), "saving to file");
        save_book_and_config(&*expander.lock_book()?, &args.book_file, config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use games_go::Loc;
    use search_api::{ScriptedNode, ScriptedSearcher, ScriptedTree};
    use std::sync::atomic::AtomicBool;

    fn p(x: u8, y: u8) -> Loc {
        Loc::Point { x, y }
    }

    fn small_config() -> GenbookConfig {
        let mut config = GenbookConfig::default();
        config.book.board_size_x = 9;
        config.book.board_size_y = 9;
        config.search.max_visits = 200;
        config.search.max_visits_for_leaves = 50;
        config.search.min_tree_visits_to_record = 40;
        config.search.num_game_threads = 1;
        config.search.num_to_expand_per_iteration = 1;
        config
    }

    fn genbook_args(book_file: std::path::PathBuf) -> GenbookArgs {
        GenbookArgs {
            book_file,
            log_file: None,
            num_iters: 1,
            save_every: 10,
            html_dir: None,
            trace_book_file: None,
            trace_book_min_visits: 0.0,
            allow_changing_book_params: false,
            bonus_file: None,
            html_dev_mode: false,
            html_min_visits: 0.0,
        }
    }

    #[test]
    fn one_iteration_builds_and_saves_a_book() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let config = small_config();

        run_genbook(&genbook_args(path.clone()), &config).unwrap();

        let book = Book::load_from_file(&path).unwrap();
        assert!(book.size() >= 2, "root expansion should add a child");
        let root = book.get_root();
        assert!(!book.moves_in_book(&root).is_empty());
        assert!(!book.node(book.root_hash()).unwrap().can_re_expand);
        // The sidecar config was written alongside.
        let mut cfg_path = path.as_os_str().to_owned();
        cfg_path.push(".cfg");
        assert!(std::path::PathBuf::from(cfg_path).exists());
    }

    #[test]
    fn changed_params_are_rejected_without_the_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let config = small_config();
        run_genbook(&genbook_args(path.clone()), &config).unwrap();

        let mut changed = config.clone();
        changed.cost.cost_per_move = 2.0;
        let mut args = genbook_args(path.clone());
        args.num_iters = 0;
        let err = run_genbook(&args, &changed);
        assert!(err.is_err());
        assert!(err
            .unwrap_err()
            .to_string()
            .contains("cost_per_move"));
    }

    #[test]
    fn changed_params_are_adopted_with_the_flag_and_costs_deepen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let mut config = small_config();
        config.search.num_to_expand_per_iteration = 2;
        let mut args = genbook_args(path.clone());
        args.num_iters = 4;
        run_genbook(&args, &config).unwrap();

        let before = Book::load_from_file(&path).unwrap();
        let costs_before: Vec<(BookHash, f64, usize)> = before
            .all_nodes()
            .iter()
            .map(|n| {
                let depth = before.history_reaching(n.hash).unwrap().2.len();
                (
                    n.hash,
                    before.node(n.hash).unwrap().total_expansion_cost,
                    depth,
                )
            })
            .collect();

        let mut changed = config.clone();
        changed.cost.cost_per_move = 2.0;
        let mut args = genbook_args(path.clone());
        args.num_iters = 0;
        args.allow_changing_book_params = true;
        run_genbook(&args, &changed).unwrap();

        // num_iters = 0 does not save, so reload and recompute to observe
        // the adopted parameters.
        let mut after = Book::load_from_file(&path).unwrap();
        reconcile_book_params(&mut after, &changed.book_params(), true).unwrap();
        after.recompute_everything();
        for (hash, cost_before, depth) in costs_before {
            let cost_after = after.node(hash).unwrap().total_expansion_cost;
            assert!(
                cost_after - cost_before >= depth as f64 - 1e-9,
                "node {hash} at depth {depth}: {cost_before} -> {cost_after}"
            );
        }
    }

    #[test]
    fn trace_and_iters_together_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = genbook_args(dir.path().join("book.json"));
        args.trace_book_file = Some(dir.path().join("other.json"));
        args.num_iters = 3;
        assert!(run_genbook(&args, &small_config()).is_err());
    }

    #[test]
    fn scripted_iteration_adds_both_children_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let config = small_config();

        let book = Book::new(
            LATEST_BOOK_VERSION,
            Board::new(9, 9),
            Rules::default(),
            Player::Black,
            5,
            config.book_params(),
        );
        let root_key = book.initial_hist().current_situation_hash();
        let mut base = ScriptedSearcher::new().with_fallback_visits(20);
        base.add_response(
            root_key,
            ScriptedTree::from_root(
                ScriptedNode::leaf(141, -0.1, -0.5)
                    .with_child(p(2, 2), ScriptedNode::leaf(100, -0.15, -1.0))
                    .with_child(p(4, 4), ScriptedNode::leaf(40, -0.05, -0.25)),
                Player::Black,
            ),
        );

        let book = Mutex::new(book);
        let stop = AtomicBool::new(false);
        let expander = Expander {
            book: &book,
            nn: Arc::new(UniformEvaluator::new()),
            params: search_params(&config),
            settings: ExpandSettings::from_config(&config),
            stop: &stop,
        };
        run_expansion_iterations(
            &expander,
            1,
            10,
            1,
            1,
            &move || -> Box<dyn Searcher> { Box::new(base.clone()) },
            &path,
            &config,
        )
        .unwrap();

        {
            let book = book.lock().unwrap();
            let root = book.get_root();
            assert_eq!(book.moves_in_book(&root).len(), 2);
            for (_, _, child_hash) in book.moves_in_book(&root) {
                assert!(book.node(child_hash).unwrap().this_values_not_in_book.visits > 0.0);
            }
            book.save_to_file(&path).unwrap();
        }

        let reloaded = Book::load_from_file(&path).unwrap();
        assert_eq!(reloaded.size(), 3);
        let path2 = dir.path().join("book2.json");
        reloaded.save_to_file(&path2).unwrap();
        assert_eq!(
            std::fs::read(&path).unwrap(),
            std::fs::read(&path2).unwrap()
        );
    }
}
