//! Node expansion: drive the external searcher and graft its results.
//!
//! One `Expander` is shared by all worker threads; each worker owns its
//! searcher. The book mutex is held only in short critical sections and is
//! always released around NN evaluation and searches; any state another
//! worker could have changed is re-checked after re-acquisition.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use tracing::{info, warn};

use book_core::hash::get_hash_and_symmetry;
use book_core::{Book, BookHash, BookValues, SymNode};
use games_go::{Board, BoardHistory, Loc, Player};
use search_api::{loc_to_pos, NnEvaluator, SearchNodeRef, SearchParams, Searcher};

/// Knobs for the expansion pass, taken from the search section of the
/// config.
#[derive(Debug, Clone)]
pub struct ExpandSettings {
    pub max_depth_to_record: usize,
    pub min_tree_visits_to_record: i64,
    pub max_visits_for_leaves: i64,
    pub wide_root_noise_book_explore: f64,
    pub cpuct_exploration_log_book_explore: f64,
    pub log_search_info: bool,
}

impl ExpandSettings {
    pub fn from_config(config: &book_config::GenbookConfig) -> Self {
        let s = &config.search;
        ExpandSettings {
            max_depth_to_record: s.max_depth_to_record,
            min_tree_visits_to_record: s.min_tree_visits_to_record,
            max_visits_for_leaves: s.max_visits_for_leaves,
            wide_root_noise_book_explore: s.wide_root_noise_book_explore,
            cpuct_exploration_log_book_explore: s.cpuct_exploration_log_book_explore,
            log_search_info: s.log_search_info,
        }
    }
}

/// Shared expansion state. Workers call `expand_node`; everything else is
/// plumbing around the book mutex and the searcher.
pub struct Expander<'a> {
    pub book: &'a Mutex<Book>,
    pub nn: Arc<dyn NnEvaluator>,
    pub params: SearchParams,
    pub settings: ExpandSettings,
    pub stop: &'a AtomicBool,
}

impl<'a> Expander<'a> {
    pub(crate) fn lock_book(&self) -> Result<MutexGuard<'a, Book>> {
        self.book
            .lock()
            .map_err(|e| anyhow!("book lock poisoned: {e}"))
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Build the avoid mask for moves already in the book at this node,
    /// unless this is a re-expansion. Returns (mask, whether any legal new
    /// move remains, whether this is a re-expansion). Call with the book
    /// locked.
    fn find_new_moves_already_locked(
        &self,
        book: &Book,
        hist: &BoardHistory,
        node: &SymNode,
        allow_re_expansion: bool,
    ) -> (Vec<i32>, bool, bool) {
        let board = hist.current_board();
        let node_data = book.node(node.hash).expect("node exists");
        let is_re_expansion = allow_re_expansion
            && node_data.can_re_expand
            && node_data.recursive_values.visits < book.params().max_visits_for_re_expansion;
        let pla = hist.presumed_next_pla();

        let mut avoid = vec![0i32; board.x_size() * board.y_size() + 1];
        let mut has_new_move = false;
        for loc in board.all_points().chain(std::iter::once(Loc::Pass)) {
            if hist.is_legal(loc, pla) {
                if !is_re_expansion && book.is_move_in_book(node, loc) {
                    avoid[loc_to_pos(loc, board.x_size(), board.y_size())] = 1;
                } else {
                    has_new_move = true;
                }
            }
        }
        (avoid, has_new_move, is_re_expansion)
    }

    /// Set search params and avoid masks, dividing cpuct by the remaining
    /// policy mass so the search stays as exploratory as it would be on the
    /// full move set.
    fn set_params_and_avoid_moves_compensating_cpuct(
        &self,
        searcher: &mut dyn Searcher,
        mut params: SearchParams,
        avoid: &[i32],
        board: &Board,
        hist: &BoardHistory,
        pla: Player,
    ) {
        let out = self.nn.full_symmetry_nn_output(board, hist, pla, false);
        let mut policy_mass_remaining = 0.0f64;
        for (pos, &p) in out.policy_probs.iter().enumerate() {
            if avoid.get(pos).copied().unwrap_or(0) <= 0 && p > 0.0 {
                policy_mass_remaining += p as f64;
            }
        }
        let policy_mass_remaining = policy_mass_remaining.clamp(1e-5, 1.0);
        let compensation =
            policy_mass_remaining.powf(1.0 / (4.0 * params.wide_root_noise + 1.0));
        params.cpuct_exploration /= compensation;
        params.cpuct_exploration_log /= compensation;
        searcher.set_params(params);
        searcher.set_avoid_move_until_by_loc(avoid.to_vec(), avoid.to_vec());
    }

    fn set_node_values_no_moves(&self, hash: BookHash, pla: Player) -> Result<()> {
        let mut book = self.lock_book()?;
        book.set_this_values(hash, BookValues::no_moves_sentinel(pla));
        book.mark_unexpandable(hash);
        Ok(())
    }

    fn set_node_values_terminal(&self, hash: BookHash, hist: &BoardHistory) -> Result<()> {
        debug_assert!(hist.is_game_finished);
        let mut book = self.lock_book()?;
        book.set_this_values(
            hash,
            BookValues::from_terminal(hist, self.settings.max_visits_for_leaves as f64),
        );
        book.mark_unexpandable(hash);
        Ok(())
    }

    /// Record a finished search's values into a node. The book is locked
    /// only for the final write; the NN evaluation runs unlocked.
    fn set_node_values_from_finished_search(
        &self,
        hash: BookHash,
        searcher: &dyn Searcher,
        search_node: SearchNodeRef,
        board: &Board,
        hist: &BoardHistory,
        pla: Player,
        avoid: &[i32],
    ) -> Result<()> {
        let Some(values) = searcher.pruned_node_values(search_node) else {
            warn!(hash = %hash, "search node carried no values; skipping value update");
            return Ok(());
        };
        let sharp_score = searcher
            .sharp_score(search_node)
            .unwrap_or(values.expected_score);
        let (win_loss_error, score_error) =
            searcher.shallow_average_shortterm_wl_and_score_error(search_node);

        // Full-symmetry policy, with already-expanded moves masked so the
        // recorded maximum is over the *remaining* moves.
        let out = self.nn.full_symmetry_nn_output(board, hist, pla, false);
        let mut max_policy = 0.0f64;
        for (pos, &p) in out.policy_probs.iter().enumerate() {
            if avoid.get(pos).copied().unwrap_or(0) <= 0 && (p as f64) > max_policy {
                max_policy = p as f64;
            }
        }

        let mut book = self.lock_book()?;
        book.set_this_values(
            hash,
            BookValues {
                win_loss_value: values.win_loss_value,
                score_mean: values.expected_score,
                sharp_score_mean: sharp_score,
                win_loss_error,
                score_error,
                score_stdev: values.expected_score_stdev,
                max_policy,
                weight: values.weight,
                visits: values.visits as f64,
            },
        );
        Ok(())
    }

    /// Run a short capped search with in-book moves masked out and refresh
    /// the node's `this_values_not_in_book`.
    ///
    /// A failed board reconstruction here is fatal: the node would be left
    /// permanently stale and there is no way to put the book back into a
    /// good state.
    pub fn search_and_update_node_this_values(
        &self,
        searcher: &mut dyn Searcher,
        hash: BookHash,
    ) -> Result<()> {
        let (node, hist, symmetries) = {
            let book = self.lock_book()?;
            match book.history_reaching(hash) {
                Ok((node, hist, _)) => {
                    let symmetries = book.stabilizer_symmetries(&node);
                    (node, hist, symmetries)
                }
                Err(e) => {
                    bail!(
                        "failed to reconstruct board history for node {hash} during value \
                         update; terminating since the book cannot be left consistent: {e}"
                    );
                }
            }
        };

        let pla = hist.presumed_next_pla();
        searcher.set_position(pla, hist.current_board(), &hist);
        searcher.set_root_symmetry_pruning_only(symmetries);

        if hist.is_game_finished {
            return self.set_node_values_terminal(hash, &hist);
        }

        let (avoid, found_new_moves, _) = {
            let book = self.lock_book()?;
            self.find_new_moves_already_locked(&book, &hist, &node, false)
        };

        if !found_new_moves {
            return self.set_node_values_no_moves(hash, pla);
        }

        let mut params = self.params.clone();
        params.max_visits = params.max_visits.min(self.settings.max_visits_for_leaves);
        self.set_params_and_avoid_moves_compensating_cpuct(
            searcher,
            params,
            &avoid,
            hist.current_board(),
            &hist,
            pla,
        );
        if let Err(e) = searcher.run_whole_search(pla) {
            warn!(hash = %hash, error = %e, "leaf search failed; freezing node");
            let mut book = self.lock_book()?;
            book.mark_unexpandable(hash);
            return Ok(());
        }

        if self.settings.log_search_info {
            info!(hash = %hash, visits = searcher.node_visits(searcher.root_node()), "quick search on remaining moves");
        }

        self.set_node_values_from_finished_search(
            hash,
            searcher,
            searcher.root_node(),
            hist.current_board(),
            &hist,
            pla,
            &avoid,
        )
    }

    /// Walk the finished search tree, grafting each sufficiently-visited
    /// move into the book. Returns whether any child was added directly to
    /// this node.
    #[allow(clippy::too_many_arguments)]
    fn expand_from_search_result_recursively(
        &self,
        searcher: &dyn Searcher,
        search_node: SearchNodeRef,
        node: SymNode,
        hist: &BoardHistory,
        max_depth: usize,
        to_search: &mut HashSet<BookHash>,
        to_update: &mut HashSet<BookHash>,
        recursed: &mut HashSet<SearchNodeRef>,
    ) -> Result<bool> {
        if max_depth == 0 {
            return Ok(false);
        }
        // Transpositions inside the search tree are handled once.
        if !recursed.insert(search_node) {
            return Ok(false);
        }

        let Some((locs, selection_values)) = searcher.play_selection_values(search_node) else {
            return Ok(false);
        };
        let best_idx = selection_values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let best_loc = locs[best_idx];

        let children = searcher.children_of(search_node);
        if children.is_empty() {
            return Ok(false);
        }

        let pla = hist.presumed_next_pla();
        let board = hist.current_board().clone();
        // Full-symmetry policy for the priors recorded into the book.
        let out = self.nn.full_symmetry_nn_output(&board, hist, pla, false);

        let mut anything_added = false;
        let mut any_recursion = false;

        for (move_loc, child_ref) in children {
            let child_visits = searcher.node_visits(child_ref);
            if move_loc != best_loc && child_visits < self.settings.min_tree_visits_to_record {
                continue;
            }
            let raw_policy = out.policy_at(move_loc).max(0.0) as f64;

            let mut next_hist = hist.clone();
            let child: SymNode;
            let mut overwrite_child_values = false;
            {
                let mut book = self.lock_book()?;
                // Another worker may have grafted this move since the
                // search ran; re-check under the lock.
                if book.is_move_in_book(&node, move_loc) {
                    if !next_hist.is_legal(move_loc, pla) {
                        warn!(
                            parent = %node.hash,
                            mv = %move_loc,
                            "in-book move is illegal on reconstruction; freezing node"
                        );
                        book.mark_unexpandable(node.hash);
                        continue;
                    }
                    child = book
                        .follow(&node, move_loc)
                        .expect("move is in book under the lock");
                    next_hist
                        .make_move(move_loc, pla)
                        .expect("move was checked legal above");
                    let child_node = book.node(child.hash).expect("child exists");
                    // Overwrite a leaf's values only when this search saw
                    // it with more visits than whatever wrote them before.
                    if child_node.num_unique_moves_in_book() == 0
                        && child_node.recursive_values.visits < child_visits as f64
                    {
                        overwrite_child_values = true;
                    }
                } else {
                    match book.play_and_add_move(&node, &mut next_hist, move_loc, raw_policy) {
                        Ok((new_child, is_transposing)) => {
                            child = new_child;
                            to_update.insert(child.hash);
                            info!(
                                parent = %node.hash,
                                child = %child.hash,
                                mv = %move_loc,
                                "adding move to book"
                            );
                            anything_added = true;
                            let child_node = book.node(child.hash).expect("child exists");
                            overwrite_child_values = !is_transposing
                                || (child_node.num_unique_moves_in_book() == 0
                                    && child_node.recursive_values.visits
                                        < child_visits as f64);
                        }
                        Err(e) => {
                            warn!(
                                parent = %node.hash,
                                mv = %move_loc,
                                error = %e,
                                "searcher proposed an illegal move; freezing node"
                            );
                            book.mark_unexpandable(node.hash);
                            continue;
                        }
                    }
                }
            }

            if overwrite_child_values {
                // The child's own search did not avoid any moves.
                self.set_node_values_from_finished_search(
                    child.hash,
                    searcher,
                    child_ref,
                    next_hist.current_board(),
                    &next_hist,
                    pla.opponent(),
                    &[],
                )?;
            }

            if child_visits >= self.settings.min_tree_visits_to_record {
                any_recursion = true;
                self.expand_from_search_result_recursively(
                    searcher,
                    child_ref,
                    child,
                    &next_hist,
                    max_depth - 1,
                    to_search,
                    to_update,
                    recursed,
                )?;
            }
        }

        if anything_added || any_recursion {
            to_update.insert(node.hash);
        }
        if anything_added {
            to_search.insert(node.hash);
        }
        Ok(anything_added)
    }

    /// Expand one frontier node: run a full search with in-book moves
    /// masked, graft the resulting children, then leaf-search every node
    /// that gained a move. Soft failures freeze the node and return Ok;
    /// integrity violations are fatal.
    pub fn expand_node(
        &self,
        searcher: &mut dyn Searcher,
        hash: BookHash,
        new_and_changed: &Mutex<Vec<BookHash>>,
    ) -> Result<()> {
        let (node, hist, moves, symmetries, book_version, total_cost) = {
            let book = self.lock_book()?;
            match book.history_reaching(hash) {
                Ok((node, hist, moves)) => {
                    let symmetries = book.stabilizer_symmetries(&node);
                    let cost = book.node(hash).expect("node exists").total_expansion_cost;
                    (node, hist, moves, symmetries, book.book_version, cost)
                }
                Err(e) => {
                    drop(book);
                    warn!(
                        hash = %hash,
                        error = %e,
                        "failed to reconstruct board history; freezing node, but something \
                         is probably wrong"
                    );
                    let mut book = self.lock_book()?;
                    book.mark_unexpandable(hash);
                    return Ok(());
                }
            }
        };

        // Integrity check. Older book versions carried hashes that cannot
        // be reproduced, so only verify on version 2 and later.
        if book_version >= 2 {
            let (rehash, _, _) = get_hash_and_symmetry(&hist, book_version);
            if rehash != hash {
                let moves_str: Vec<String> = moves.iter().map(|m| m.to_string()).collect();
                bail!(
                    "book failed integrity check: node {hash} re-hashes to {rehash} when \
                     walked to (moves: {})",
                    moves_str.join(" ")
                );
            }
        }

        if hist.is_game_finished || hist.is_past_normal_phase_end {
            let mut book = self.lock_book()?;
            book.mark_unexpandable(hash);
            return Ok(());
        }

        let pla = hist.presumed_next_pla();
        searcher.set_position(pla, hist.current_board(), &hist);
        searcher.set_root_symmetry_pruning_only(symmetries);

        info!(hash = %hash, cost = total_cost, "expanding");

        let (avoid, found_new_moves, is_re_expansion) = {
            let book = self.lock_book()?;
            self.find_new_moves_already_locked(&book, &hist, &node, true)
        };
        if !found_new_moves {
            let mut book = self.lock_book()?;
            book.mark_unexpandable(hash);
            return Ok(());
        }

        let mut this_params = self.params.clone();
        this_params.wide_root_noise = self.settings.wide_root_noise_book_explore;
        this_params.cpuct_exploration_log = self.settings.cpuct_exploration_log_book_explore;
        self.set_params_and_avoid_moves_compensating_cpuct(
            searcher,
            this_params,
            &avoid,
            hist.current_board(),
            &hist,
            pla,
        );
        if let Err(e) = searcher.run_whole_search(pla) {
            warn!(hash = %hash, error = %e, "search failed; freezing node");
            let mut book = self.lock_book()?;
            book.mark_unexpandable(hash);
            return Ok(());
        }

        if self.stopped() {
            return Ok(());
        }

        if self.settings.log_search_info {
            info!(
                hash = %hash,
                visits = searcher.node_visits(searcher.root_node()),
                "search result"
            );
        }

        let mut to_search = HashSet::new();
        let mut to_update = HashSet::new();
        let mut recursed = HashSet::new();
        let anything_added = self.expand_from_search_result_recursively(
            searcher,
            searcher.root_node(),
            node,
            &hist,
            self.settings.max_depth_to_record,
            &mut to_search,
            &mut to_update,
            &mut recursed,
        )?;

        // Leaf-search every node that gained a move, in sorted order for
        // determinism.
        let mut to_search: Vec<BookHash> = to_search.into_iter().collect();
        to_search.sort();
        for h in to_search {
            self.search_and_update_node_this_values(searcher, h)?;
        }

        {
            let mut book = self.lock_book()?;
            let mut dirty = new_and_changed
                .lock()
                .map_err(|e| anyhow!("dirty set lock poisoned: {e}"))?;
            to_update.insert(hash);
            let mut to_update: Vec<BookHash> = to_update.into_iter().collect();
            to_update.sort();
            dirty.extend(to_update);
            // Only nodes never expanded on their own merit may be
            // re-expanded later.
            book.clear_can_re_expand(hash);
        }

        if !anything_added && !is_re_expansion {
            warn!(
                hash = %hash,
                "search contributed no new move despite legal moves existing outside the \
                 book; freezing node"
            );
            let mut book = self.lock_book()?;
            book.mark_unexpandable(hash);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use book_core::BookParams;
    use games_go::Rules;
    use search_api::{ScriptedNode, ScriptedSearcher, ScriptedTree, UniformEvaluator};

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

    fn settings() -> ExpandSettings {
        ExpandSettings {
            max_depth_to_record: 2,
            min_tree_visits_to_record: 40,
            max_visits_for_leaves: 50,
            wide_root_noise_book_explore: 0.05,
            cpuct_exploration_log_book_explore: 1.0,
            log_search_info: false,
        }
    }

    /// Scripted root search: best move at 100 visits plus one sibling at
    /// 40 visits, as in the one-iteration smoke scenario.
    fn scripted_for_root(book: &Book) -> ScriptedSearcher {
        let hist = book.initial_hist();
        let tree = ScriptedTree::from_root(
            ScriptedNode::leaf(141, -0.1, -0.5)
                .with_child(p(2, 2), ScriptedNode::leaf(100, -0.15, -1.0))
                .with_child(p(4, 4), ScriptedNode::leaf(40, -0.05, -0.25)),
            Player::Black,
        );
        let mut searcher = ScriptedSearcher::new();
        searcher.add_response(hist.current_situation_hash(), tree);
        searcher
    }

    #[test]
    fn expanding_the_root_grafts_both_children() {
        let book = Mutex::new(new_book());
        let stop = AtomicBool::new(false);
        let expander = Expander {
            book: &book,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default().with_max_visits(200),
            settings: settings(),
            stop: &stop,
        };

        let root_hash = book.lock().unwrap().root_hash();
        let mut searcher = scripted_for_root(&book.lock().unwrap());
        let dirty = Mutex::new(Vec::new());

        expander
            .expand_node(&mut searcher, root_hash, &dirty)
            .unwrap();

        let book = book.lock().unwrap();
        let root = book.get_root();
        assert_eq!(book.moves_in_book(&root).len(), 2);
        assert!(book.is_move_in_book(&root, p(2, 2)));
        assert!(book.is_move_in_book(&root, p(4, 4)));
        // The root was expanded on its own merit.
        assert!(!book.node(root_hash).unwrap().can_re_expand);
        // Both children carry values written from the search.
        for (_, _, child_hash) in book.moves_in_book(&root) {
            let child = book.node(child_hash).unwrap();
            assert!(child.this_values_not_in_book.visits > 0.0);
            assert!(child.can_re_expand);
        }
        // The dirty set contains the root and both children.
        assert_eq!(dirty.lock().unwrap().len(), 3);
    }

    #[test]
    fn terminal_node_is_frozen_not_searched() {
        let mut book = new_book();
        // Drive the root position to a finished game: pass, pass.
        let root = book.get_root();
        let mut hist = book.initial_hist();
        let (one_pass, _) = book
            .play_and_add_move(&root, &mut hist, Loc::Pass, 0.5)
            .unwrap();
        let (done, _) = book
            .play_and_add_move(&one_pass, &mut hist, Loc::Pass, 0.5)
            .unwrap();
        let done_hash = done.hash;

        let book = Mutex::new(book);
        let stop = AtomicBool::new(false);
        let expander = Expander {
            book: &book,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default(),
            settings: settings(),
            stop: &stop,
        };
        let mut searcher = ScriptedSearcher::new();
        let dirty = Mutex::new(Vec::new());

        expander
            .expand_node(&mut searcher, done_hash, &dirty)
            .unwrap();

        let book = book.lock().unwrap();
        assert!(!book.node(done_hash).unwrap().can_expand);
        assert!(book.node(done_hash).unwrap().moves_in_book.is_empty());
    }

    #[test]
    fn leaf_update_refreshes_root_values_after_expansion() {
        let book = Mutex::new(new_book());
        let stop = AtomicBool::new(false);
        let expander = Expander {
            book: &book,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default(),
            settings: settings(),
            stop: &stop,
        };

        // Expand the root, then leaf-update it with a scripted searcher
        // that finds nothing; the root still has legal moves, so values
        // come from the fallback search rather than the sentinel.
        let root_hash = book.lock().unwrap().root_hash();
        let mut searcher = scripted_for_root(&book.lock().unwrap());
        let dirty = Mutex::new(Vec::new());
        expander
            .expand_node(&mut searcher, root_hash, &dirty)
            .unwrap();

        let this_values = book
            .lock()
            .unwrap()
            .node(root_hash)
            .unwrap()
            .this_values_not_in_book;
        assert!(!this_values.is_no_moves_sentinel());
        assert!(this_values.visits > 0.0);
    }

    #[test]
    fn node_with_every_legal_move_in_book_gets_the_sentinel() {
        // On an empty 2x2 board, every point is a stabilizer image of
        // (0,0); with the pass also in book, no new move remains.
        let mut book = Book::new(
            book_core::LATEST_BOOK_VERSION,
            Board::new(2, 2),
            Rules::default(),
            Player::Black,
            5,
            BookParams::default(),
        );
        let root = book.get_root();
        let root_hash = root.hash;
        let mut hist = book.initial_hist();
        book.play_and_add_move(&root, &mut hist, p(0, 0), 0.2)
            .unwrap();
        let mut hist2 = book.initial_hist();
        book.play_and_add_move(&root, &mut hist2, Loc::Pass, 0.1)
            .unwrap();

        let book = Mutex::new(book);
        let stop = AtomicBool::new(false);
        let expander = Expander {
            book: &book,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default(),
            settings: settings(),
            stop: &stop,
        };
        let mut searcher = ScriptedSearcher::new();
        expander
            .search_and_update_node_this_values(&mut searcher, root_hash)
            .unwrap();

        let book = book.lock().unwrap();
        let node = book.node(root_hash).unwrap();
        assert!(node.this_values_not_in_book.is_no_moves_sentinel());
        // Black to move: the sentinel is the worst outcome for black.
        assert!(node.this_values_not_in_book.win_loss_value > 0.0);
        assert!(!node.can_expand);
    }

    #[test]
    fn stop_flag_aborts_before_grafting() {
        let book = Mutex::new(new_book());
        let stop = AtomicBool::new(true);
        let expander = Expander {
            book: &book,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default(),
            settings: settings(),
            stop: &stop,
        };

        let root_hash = book.lock().unwrap().root_hash();
        let mut searcher = scripted_for_root(&book.lock().unwrap());
        let dirty = Mutex::new(Vec::new());
        expander
            .expand_node(&mut searcher, root_hash, &dirty)
            .unwrap();

        // Nothing was grafted: the stop flag was already set when the
        // search finished.
        let book = book.lock().unwrap();
        assert_eq!(book.size(), 1);
        assert!(dirty.lock().unwrap().is_empty());
    }

    #[test]
    fn second_expansion_of_same_node_freezes_it_when_nothing_new() {
        let book = Mutex::new(new_book());
        let stop = AtomicBool::new(false);
        let expander = Expander {
            book: &book,
            nn: Arc::new(UniformEvaluator::new()),
            params: SearchParams::default().with_max_visits(200),
            settings: settings(),
            stop: &stop,
        };

        let root_hash = book.lock().unwrap().root_hash();
        let dirty = Mutex::new(Vec::new());
        let mut searcher = scripted_for_root(&book.lock().unwrap());
        expander
            .expand_node(&mut searcher, root_hash, &dirty)
            .unwrap();
        assert!(book.lock().unwrap().node(root_hash).unwrap().can_expand);

        // Re-expanding with a searcher that returns the same two moves
        // (now avoided, so filtered out) contributes nothing new.
        let mut searcher = scripted_for_root(&book.lock().unwrap());
        expander
            .expand_node(&mut searcher, root_hash, &dirty)
            .unwrap();
        assert!(!book.lock().unwrap().node(root_hash).unwrap().can_expand);
    }
}
