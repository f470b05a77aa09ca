//! The searcher contract the book drives.
//!
//! A `Searcher` is owned by exactly one worker thread; the book configures
//! it, runs a whole search, then walks the resulting tree through the
//! node-handle accessors. Handles are only valid until the next
//! `run_whole_search`.

use games_go::{Board, BoardHistory, Loc, Player, Symmetry};
use thiserror::Error;

use crate::params::SearchParams;
use crate::values::ReportedSearchValues;

/// Opaque handle to a node of the searcher's most recent tree.
pub type SearchNodeRef = usize;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no position set before search")]
    NoPosition,

    #[error("search produced no root")]
    EmptySearch,

    #[error("searcher failure: {0}")]
    Internal(String),
}

/// External NN-guided MCTS, abstracted.
pub trait Searcher: Send {
    /// Set the position to search from.
    fn set_position(&mut self, pla: Player, board: &Board, hist: &BoardHistory);

    /// Restrict root move generation to symmetry-distinct moves under the
    /// given stabilizer symmetries of the root position.
    fn set_root_symmetry_pruning_only(&mut self, symmetries: Vec<Symmetry>);

    /// Per-location avoid masks (indexed by policy position, pass last).
    /// A positive entry forbids that move at the root for that player.
    fn set_avoid_move_until_by_loc(&mut self, black: Vec<i32>, white: Vec<i32>);

    fn set_params(&mut self, params: SearchParams);

    /// Run until the visit budget is exhausted.
    fn run_whole_search(&mut self, pla: Player) -> Result<(), SearchError>;

    /// Root of the most recent search.
    fn root_node(&self) -> SearchNodeRef;

    /// Children of a node as (move, child handle) pairs.
    fn children_of(&self, node: SearchNodeRef) -> Vec<(Loc, SearchNodeRef)>;

    fn node_visits(&self, node: SearchNodeRef) -> i64;

    fn node_next_pla(&self, node: SearchNodeRef) -> Player;

    /// Moves and play-selection values at a node; `None` for terminal nodes.
    fn play_selection_values(&self, node: SearchNodeRef) -> Option<(Vec<Loc>, Vec<f64>)>;

    /// Aggregate values at a node with pruning applied; `None` when the
    /// node carries no usable statistics.
    fn pruned_node_values(&self, node: SearchNodeRef) -> Option<ReportedSearchValues>;

    /// A score estimate less sensitive to tail outcomes than the mean.
    fn sharp_score(&self, node: SearchNodeRef) -> Option<f64>;

    /// Shallow-averaged short-term (win/loss error, score error).
    fn shallow_average_shortterm_wl_and_score_error(&self, node: SearchNodeRef) -> (f64, f64);
}
