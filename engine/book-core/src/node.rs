//! Stored book nodes and the symbolic node view.

use serde::{Deserialize, Serialize};

use games_go::{Loc, Player, Symmetry};

use crate::hash::BookHash;
use crate::values::{BookValues, RecursiveValues};

/// An edge from a node to a child, stored in the parent's canonical
/// orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookMove {
    pub child_hash: BookHash,
    /// Raw symmetry-averaged policy prior at the time the move was added.
    pub raw_policy: f64,
    /// Maps the parent's canonical orientation, after this move is played,
    /// to the child's canonical orientation.
    pub child_symmetry: Symmetry,
}

/// A node of the book, keyed by its canonical hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookNode {
    pub hash: BookHash,
    pub pla: Player,
    /// In-book moves in insertion order, keys in canonical orientation.
    /// At most one representative per stabilizer orbit appears.
    pub moves_in_book: Vec<(Loc, BookMove)>,
    /// Incoming edges as (parent hash, canonical move at the parent).
    /// The first entry is the primary path used for board reconstruction.
    pub parents: Vec<(BookHash, Loc)>,
    /// Stabilizer subgroup of the canonical position.
    pub symmetries: Vec<Symmetry>,
    pub this_values_not_in_book: BookValues,
    pub recursive_values: RecursiveValues,
    /// False for terminal or exhausted nodes; monotone once false.
    pub can_expand: bool,
    /// One-shot: nodes start re-expandable because they are created as side
    /// effects of another node's search; cleared permanently once this node
    /// is expanded on its own merit.
    pub can_re_expand: bool,
    /// Cached priority; lower expands sooner.
    pub total_expansion_cost: f64,

    /// Cheapest in-book path cost from the root. Recomputed by the cost
    /// pass; not persisted.
    #[serde(skip)]
    pub min_cost_from_root: f64,
    /// Whether this node lies on the win/loss principal variation.
    #[serde(skip)]
    pub on_wl_pv: bool,
    /// Whether this node is the endpoint of the win/loss PV.
    #[serde(skip)]
    pub wl_pv_endpoint: bool,
}

impl BookNode {
    pub fn new(hash: BookHash, pla: Player, symmetries: Vec<Symmetry>) -> BookNode {
        BookNode {
            hash,
            pla,
            moves_in_book: Vec::new(),
            parents: Vec::new(),
            symmetries,
            this_values_not_in_book: BookValues::default(),
            recursive_values: RecursiveValues::default(),
            can_expand: true,
            can_re_expand: true,
            total_expansion_cost: 0.0,
            min_cost_from_root: f64::INFINITY,
            on_wl_pv: false,
            wl_pv_endpoint: false,
        }
    }

    /// Find the stored edge for a canonical move, looking through the
    /// stabilizer orbit of the key.
    pub fn find_move(
        &self,
        canonical_loc: Loc,
        x_size: usize,
        y_size: usize,
    ) -> Option<(Loc, &BookMove, Symmetry)> {
        for &stab in &self.symmetries {
            let image = stab.apply_loc(canonical_loc, x_size, y_size);
            if let Some((stored, mv)) = self
                .moves_in_book
                .iter()
                .find(|(stored, _)| *stored == image)
            {
                return Some((*stored, mv, stab));
            }
        }
        None
    }

    pub fn num_unique_moves_in_book(&self) -> usize {
        self.moves_in_book.len()
    }
}

/// A node paired with the symmetry mapping its canonical orientation to
/// the caller's orientation. Cheap to copy; all move-taking operations on
/// the book translate through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymNode {
    pub hash: BookHash,
    /// Applied to the canonical orientation, yields the caller's.
    pub symmetry: Symmetry,
}

impl SymNode {
    pub fn new(hash: BookHash, symmetry: Symmetry) -> SymNode {
        SymNode { hash, symmetry }
    }

    /// The canonical-orientation view of a node.
    pub fn canonical(hash: BookHash) -> SymNode {
        SymNode {
            hash,
            symmetry: Symmetry::IDENTITY,
        }
    }

    /// Translate a move from the caller's orientation to canonical.
    pub fn to_canonical(&self, loc: Loc, x_size: usize, y_size: usize) -> Loc {
        self.symmetry.inverse().apply_loc(loc, x_size, y_size)
    }

    /// Translate a canonical move to the caller's orientation.
    pub fn to_user(&self, loc: Loc, x_size: usize, y_size: usize) -> Loc {
        self.symmetry.apply_loc(loc, x_size, y_size)
    }
}
