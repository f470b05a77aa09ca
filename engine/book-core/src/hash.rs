//! Canonical position hashing under symmetry and the repetition window.
//!
//! A position's `BookHash` is computed by hashing the recent situation
//! window (up to `rep_bound + 1` positions) under every symmetry of the
//! board and taking the minimum. The minimizing symmetry aligns the
//! caller's orientation to the canonical one, and the symmetries that
//! reproduce the same hash form the stabilizer subgroup used for move
//! deduplication and root symmetry pruning.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use games_go::{BoardHistory, Player, Symmetry};

/// Canonical 128-bit identifier of a book position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookHash(pub [u64; 2]);

impl BookHash {
    pub const ZERO: BookHash = BookHash([0, 0]);

    fn from_u128(v: u128) -> BookHash {
        BookHash([(v >> 64) as u64, v as u64])
    }
}

impl fmt::Display for BookHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.0[0], self.0[1])
    }
}

impl std::str::FromStr for BookHash {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hi, lo) = s.split_at(s.len().saturating_sub(16));
        Ok(BookHash([
            u64::from_str_radix(hi, 16)?,
            u64::from_str_radix(lo, 16)?,
        ]))
    }
}

impl Serialize for BookHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BookHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// SplitMix-style combine of a running hash with one value.
fn mix(state: u128, value: u128) -> u128 {
    let mut x = state ^ value.wrapping_mul(0x9e3779b97f4a7c15f39cc0605cedc835);
    x ^= x >> 67;
    x = x.wrapping_mul(0xff51afd7ed558ccd1a85ec53c4c9f2e3);
    x ^= x >> 61;
    x
}

/// Hash of the current position as seen through one symmetry.
///
/// When no position in the repetition window can recur (no recent capture,
/// no active ko), only the current situation is hashed, so transposing move
/// orders converge to one node. Otherwise the whole window is folded in,
/// keeping positions distinct whenever superko could make their legal moves
/// differ.
fn position_hash(hist: &BoardHistory, sym: Symmetry, book_version: u32) -> u128 {
    let mut state = mix(book_version as u128, 0x0b00c);
    if hist.recent_window_is_repeatable() {
        let boards = hist.recent_boards();
        let players = hist.recent_players();
        for (board, &pla) in boards.iter().zip(players) {
            let transformed = board.transformed(sym);
            state = mix(state, transformed.situation_hash(pla));
        }
    } else {
        let transformed = hist.current_board().transformed(sym);
        state = mix(state, transformed.situation_hash(hist.presumed_next_pla()));
    }
    // Pass state distinguishes the one-pass position from the same board
    // before the pass.
    state = mix(state, hist.consecutive_passes() as u128 + 1);
    state
}

/// Canonicalize the current position of `hist`.
///
/// Returns the canonical hash, the symmetry that maps the caller's
/// orientation to the canonical one, and the stabilizer symmetries of the
/// canonical position.
pub fn get_hash_and_symmetry(
    hist: &BoardHistory,
    book_version: u32,
) -> (BookHash, Symmetry, Vec<Symmetry>) {
    let board = hist.current_board();
    let syms = Symmetry::all(board.x_size(), board.y_size());

    let hashes: Vec<(Symmetry, u128)> = syms
        .iter()
        .map(|&s| (s, position_hash(hist, s, book_version)))
        .collect();

    let &(align, min_hash) = hashes
        .iter()
        .min_by(|a, b| a.1.cmp(&b.1).then(a.0 .0.cmp(&b.0 .0)))
        .expect("symmetry list is never empty");

    // s stabilizes the canonical position iff applying s after the
    // alignment reproduces the canonical hash.
    let stabilizers: Vec<Symmetry> = syms
        .iter()
        .copied()
        .filter(|&s| {
            let composed = s.compose(align);
            hashes
                .iter()
                .find(|&&(t, _)| t == composed)
                .map(|&(_, h)| h == min_hash)
                .unwrap_or(false)
        })
        .collect();

    (BookHash::from_u128(min_hash), align, stabilizers)
}

/// Player to move at the current position (convenience for callers that
/// only hold a history).
pub fn next_player(hist: &BoardHistory) -> Player {
    hist.presumed_next_pla()
}
