//! Go rules, board, and symmetry primitives for the opening book engine.
//!
//! This crate is the concrete "rules / board" collaborator of the book:
//! - `Board`: stones, captures, simple ko, Zobrist position hashing
//! - `BoardHistory`: move sequence, positional superko within a repetition
//!   window, two-pass game end, area scoring
//! - `Symmetry`: the dihedral symmetry group of the board and its action on
//!   locations and whole boards
//!
//! Everything here is deterministic: Zobrist tables are generated from a
//! fixed seed so position hashes are stable across processes and runs.

pub mod board;
pub mod history;
pub mod symmetry;

pub use board::{Board, Loc, Player, BLACK, EMPTY, WHITE};
pub use history::{BoardHistory, IllegalMoveError, Move, Rules};
pub use symmetry::Symmetry;

/// Largest supported board edge length.
pub const MAX_LEN: usize = 19;
