//! Trace mode: import every qualifying variation from another book.
//!
//! Two phases, each driven by the worker pool: first the move paths of the
//! source book's leaves are replayed into the target book (adding missing
//! moves plus high-policy siblings), then every touched node gets a leaf
//! search to fill in its values. An interrupted trace leaves the target
//! book unsaved.

use std::collections::{HashSet, VecDeque};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use book_core::{Book, BookHash};
use games_go::{BoardHistory, Loc};
use search_api::Searcher;

use crate::expand::Expander;

/// A sibling is widened into the book when its policy clearly exceeds the
/// traced move's.
fn sibling_widening_threshold(move_policy: f32) -> f32 {
    1.5 * move_policy + 0.05
}

fn progress_bar(len: u64) -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    Some(pb)
}

/// Replay one variation into the target book, adding the minimum moves
/// needed plus policy-favored siblings. Records touched hashes for the
/// later value-update phase.
fn add_variation_to_book_without_update(
    expander: &Expander,
    target_hist: &BoardHistory,
    to_update: &Mutex<HashSet<BookHash>>,
) -> Result<()> {
    let mut book = expander.lock_book()?;

    if target_hist.initial_board != book.initial_board
        || target_hist.initial_pla != book.initial_pla
    {
        bail!("trace variation does not start from this book's initial position");
    }

    let mut node = book.get_root();
    let mut hist = book.initial_hist();

    for mv in &target_hist.move_history {
        // Don't walk off the edge of the game under this ruleset.
        if hist.is_game_finished || hist.is_past_normal_phase_end {
            info!(hash = %node.hash, "skipping trace variation here since game over");
            book.mark_unexpandable(node.hash);
            break;
        }

        let pla = hist.presumed_next_pla();
        if mv.pla != pla {
            bail!("trace variation player got out of sync at node {}", node.hash);
        }

        // Illegal move, probably a ruleset mismatch between the books.
        if !hist.is_legal(mv.loc, pla) {
            info!(hash = %node.hash, mv = %mv.loc, "skipping trace variation here since illegal");
            break;
        }

        if !book.is_move_in_book(&node, mv.loc) {
            // We can follow existing moves through a frozen node, but we
            // may not add new ones.
            if !book.can_expand(&node) {
                info!(hash = %node.hash, "skipping trace variation here since nonexpandable");
                break;
            }

            // Release the book for the expensive symmetry-averaged
            // evaluation.
            drop(book);
            let out =
                expander
                    .nn
                    .full_symmetry_nn_output(hist.current_board(), &hist, pla, false);
            let move_policy = out.policy_at(mv.loc).max(0.0);
            let board = hist.current_board();
            let mut extra_moves: Vec<(Loc, f32)> = board
                .all_points()
                .chain(std::iter::once(Loc::Pass))
                .filter(|&loc| loc != mv.loc)
                .filter_map(|loc| {
                    let p = out.policy_at(loc);
                    (p > 0.0 && p > sibling_widening_threshold(move_policy))
                        .then_some((loc, p))
                })
                .collect();
            extra_moves
                .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            // Re-acquire and re-check: another worker may have added the
            // move, or a symmetry of it, in the meantime.
            book = expander.lock_book()?;
            let mut touched = to_update
                .lock()
                .map_err(|e| anyhow!("trace update set poisoned: {e}"))?;
            touched.insert(node.hash);

            if !book.is_move_in_book(&node, mv.loc) {
                let mut hist_copy = hist.clone();
                match book.play_and_add_move(&node, &mut hist_copy, mv.loc, move_policy as f64)
                {
                    Ok((child, is_transposing)) => {
                        if !is_transposing {
                            touched.insert(child.hash);
                        }
                    }
                    Err(e) => {
                        warn!(hash = %node.hash, mv = %mv.loc, error = %e, "could not add traced move");
                        break;
                    }
                }
            }
            for (loc, policy) in extra_moves {
                if !book.is_move_in_book(&node, loc) {
                    let mut hist_copy = hist.clone();
                    if let Ok((child, is_transposing)) =
                        book.play_and_add_move(&node, &mut hist_copy, loc, policy as f64)
                    {
                        if !is_transposing {
                            touched.insert(child.hash);
                        }
                    }
                }
            }
        }

        node = book.follow(&node, mv.loc)?;
        hist.make_move(mv.loc, pla)
            .expect("move was checked legal above");
    }

    Ok(())
}

/// Import every leaf of `trace_book` with at least `min_visits` recursive
/// visits, then leaf-search all touched nodes and recompute.
pub fn run_trace(
    expander: &Expander,
    trace_book: &Book,
    min_visits: f64,
    num_threads: usize,
    make_searcher: &(dyn Fn() -> Box<dyn Searcher> + Sync),
) -> Result<()> {
    let leaves = trace_book.all_leaves(min_visits);
    info!(leaves = leaves.len(), min_visits, "tracing book");

    let to_update: Mutex<HashSet<BookHash>> = Mutex::new(HashSet::new());
    let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);

    // Phase 1: replay variations.
    {
        let queue: Mutex<VecDeque<BookHash>> =
            Mutex::new(leaves.iter().map(|n| n.hash).collect());
        let added = AtomicI64::new(0);
        let total = leaves.len();
        let bar = progress_bar(total as u64);

        std::thread::scope(|scope| {
            for _ in 0..num_threads.max(1) {
                scope.spawn(|| loop {
                    if expander.stop.load(Ordering::Acquire) {
                        return;
                    }
                    let Some(hash) = queue.lock().ok().and_then(|mut q| q.pop_front()) else {
                        return;
                    };
                    let result = trace_book.history_reaching(hash).map_err(|e| anyhow!(e));
                    let result = result.and_then(|(_, hist, _)| {
                        add_variation_to_book_without_update(expander, &hist, &to_update)
                    });
                    if let Err(e) = result {
                        if let Ok(mut slot) = first_error.lock() {
                            slot.get_or_insert(e);
                        }
                        expander.stop.store(true, Ordering::Release);
                        return;
                    }
                    let n = added.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref bar) = bar {
                        bar.inc(1);
                    }
                    if n % 400 == 0 {
                        info!(added = n, total, "tracing book variations");
                    }
                });
            }
        });
        if let Some(ref bar) = bar {
            bar.finish_and_clear();
        }
        info!(added = added.load(Ordering::Relaxed), total, "traced book variations");
    }

    if let Some(e) = first_error.lock().ok().and_then(|mut s| s.take()) {
        return Err(e);
    }

    // Phase 2: leaf-search every touched node.
    {
        let mut hashes: Vec<BookHash> = to_update
            .lock()
            .map_err(|e| anyhow!("trace update set poisoned: {e}"))?
            .iter()
            .copied()
            .collect();
        hashes.sort();
        let total = hashes.len();
        let queue: Mutex<VecDeque<BookHash>> = Mutex::new(hashes.into_iter().collect());
        let updated = AtomicI64::new(0);
        let bar = progress_bar(total as u64);

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
                        if let Err(e) =
                            expander.search_and_update_node_this_values(searcher.as_mut(), hash)
                        {
                            if let Ok(mut slot) = first_error.lock() {
                                slot.get_or_insert(e);
                            }
                            expander.stop.store(true, Ordering::Release);
                            return;
                        }
                        let n = updated.fetch_add(1, Ordering::Relaxed) + 1;
                        if let Some(ref bar) = bar {
                            bar.inc(1);
                        }
                        if n % 100 == 0 {
                            info!(updated = n, total, "updating traced nodes");
                        }
                    }
                });
            }
        });
        if let Some(ref bar) = bar {
            bar.finish_and_clear();
        }
    }

    if let Some(e) = first_error.lock().ok().and_then(|mut s| s.take()) {
        return Err(e);
    }
    if expander.stop.load(Ordering::Acquire) {
        bail!("trace book incomplete, exiting without saving");
    }

    info!("recomputing recursive values for entire book");
    expander.lock_book()?.recompute_everything();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use book_core::BookParams;
    use games_go::{Board, Player, Rules};
    use search_api::{ScriptedSearcher, SearchParams, UniformEvaluator};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn p(x: u8, y: u8) -> Loc {
        Loc::Point { x, y }
    }

    fn new_book() -> Book {
        Book::new(
            book_core::LATEST_BOOK_VERSION,
            Board::new(9, 9),
            Rules::default(),
            Player::Black,
            5,
            BookParams::default(),
        )
    }

    /// A source book with one line of four moves, leaf visits above the
    /// trace threshold.
    fn source_book() -> Book {
        let mut book = new_book();
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let mut node = root;
        for (i, &loc) in [p(2, 2), p(6, 6), p(4, 2), p(2, 4)].iter().enumerate() {
            let (child, _) = book
                .play_and_add_move(&node, &mut hist, loc, 0.2 - 0.01 * i as f64)
                .unwrap();
            node = child;
        }
        let leaf_hash = node.hash;
        book.set_this_values(
            leaf_hash,
            book_core::BookValues {
                win_loss_value: 0.1,
                score_mean: 0.5,
                sharp_score_mean: 0.5,
                win_loss_error: 0.1,
                score_error: 0.5,
                score_stdev: 1.0,
                max_policy: 0.3,
                weight: 50.0,
                visits: 50.0,
            },
        );
        book.recompute_everything();
        book
    }

    #[test]
    fn trace_imports_the_variation_path() {
        let source = source_book();
        let target = Mutex::new(new_book());
        let stop = AtomicBool::new(false);
        let expander = Expander {
            book: &target,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default().with_max_visits(100),
            settings: crate::expand::ExpandSettings {
                max_depth_to_record: 2,
                min_tree_visits_to_record: 40,
                max_visits_for_leaves: 50,
                wide_root_noise_book_explore: 0.05,
                cpuct_exploration_log_book_explore: 1.0,
                log_search_info: false,
            },
            stop: &stop,
        };

        run_trace(&expander, &source, 10.0, 1, &|| -> Box<dyn Searcher> {
            Box::new(ScriptedSearcher::new().with_fallback_visits(25))
        })
        .unwrap();

        let target = target.lock().unwrap();
        // The four-move path exists in the target book.
        assert!(target.size() >= 5);
        let mut node = target.get_root();
        for &loc in &[p(2, 2), p(6, 6), p(4, 2), p(2, 4)] {
            assert!(target.is_move_in_book(&node, loc), "missing {loc}");
            node = target.follow(&node, loc).unwrap();
        }
        // Every node along the path has values from the update phase.
        let mut node = target.get_root();
        for &loc in &[p(2, 2), p(6, 6), p(4, 2)] {
            let data = target.node(node.hash).unwrap();
            assert!(data.this_values_not_in_book.visits > 0.0);
            node = target.follow(&node, loc).unwrap();
        }
        // A recompute after tracing changes nothing: the trace already
        // recomputed.
        let costs: Vec<f64> = target
            .all_nodes()
            .iter()
            .map(|n| target.node(n.hash).unwrap().total_expansion_cost)
            .collect();
        drop(target);
        let mut relocked = expander.lock_book().unwrap();
        relocked.recompute_everything();
        let costs_after: Vec<f64> = relocked
            .all_nodes()
            .iter()
            .map(|n| relocked.node(n.hash).unwrap().total_expansion_cost)
            .collect();
        assert_eq!(costs, costs_after);
    }

    #[test]
    fn trace_skips_leaves_below_visit_threshold() {
        let source = source_book();
        let target = Mutex::new(new_book());
        let stop = AtomicBool::new(false);
        let expander = Expander {
            book: &target,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default(),
            settings: crate::expand::ExpandSettings {
                max_depth_to_record: 2,
                min_tree_visits_to_record: 40,
                max_visits_for_leaves: 50,
                wide_root_noise_book_explore: 0.05,
                cpuct_exploration_log_book_explore: 1.0,
                log_search_info: false,
            },
            stop: &stop,
        };

        // Threshold above the leaf's 50 visits: nothing to trace.
        run_trace(&expander, &source, 1000.0, 1, &|| -> Box<dyn Searcher> {
            Box::new(ScriptedSearcher::new())
        })
        .unwrap();
        assert_eq!(target.lock().unwrap().size(), 1);
    }

    #[test]
    fn interrupted_trace_is_an_error() {
        let source = source_book();
        let target = Mutex::new(new_book());
        let stop = AtomicBool::new(true);
        let expander = Expander {
            book: &target,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default(),
            settings: crate::expand::ExpandSettings {
                max_depth_to_record: 2,
                min_tree_visits_to_record: 40,
                max_visits_for_leaves: 50,
                wide_root_noise_book_explore: 0.05,
                cpuct_exploration_log_book_explore: 1.0,
                log_search_info: false,
            },
            stop: &stop,
        };

        let result = run_trace(&expander, &source, 10.0, 1, &|| -> Box<dyn Searcher> {
            Box::new(ScriptedSearcher::new())
        });
        assert!(result.is_err());
    }
}
