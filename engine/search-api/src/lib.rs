//! Abstract searcher and evaluator contracts for the opening book engine.
//!
//! The book never runs MCTS itself. It drives an external searcher through
//! the [`Searcher`] trait and reads symmetry-averaged policy from an
//! [`NnEvaluator`]. Two implementations ship with this crate:
//!
//! - [`FlatSearcher`]: a one-ply reference searcher that distributes its
//!   visit budget by evaluator policy. It satisfies the contract end to end
//!   without a neural network and is what the binary wires by default.
//! - [`ScriptedSearcher`]: a deterministic searcher whose responses are
//!   registered per position, used by the book's tests.

pub mod evaluator;
pub mod flat;
pub mod params;
pub mod scripted;
pub mod searcher;
pub mod values;

pub use evaluator::{loc_to_pos, pos_to_loc, NnEvaluator, NnOutput, UniformEvaluator};
pub use flat::FlatSearcher;
pub use params::SearchParams;
pub use scripted::{ScriptedNode, ScriptedSearcher, ScriptedTree};
pub use searcher::{SearchError, SearchNodeRef, Searcher};
pub use values::ReportedSearchValues;
