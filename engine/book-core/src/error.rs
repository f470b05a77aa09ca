//! Book error types.

use thiserror::Error;

use crate::hash::BookHash;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("no node with hash {0} in the book")]
    UnknownHash(BookHash),

    #[error("move {loc} is illegal at node {hash}")]
    IllegalMove { hash: BookHash, loc: String },

    #[error("move {loc} is not in the book at node {hash}")]
    MoveNotInBook { hash: BookHash, loc: String },

    #[error("failed to reconstruct the board history reaching node {0}")]
    HistoryReconstruction(BookHash),

    #[error(
        "book integrity check failed: node {stored} re-hashes to {recomputed} when walked to"
    )]
    IntegrityCheck {
        stored: BookHash,
        recomputed: BookHash,
    },

    #[error("unsupported book version {0}")]
    UnsupportedVersion(u32),

    #[error("book parameters do not match: {0}")]
    ParamMismatch(String),

    #[error("corrupt book file: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
