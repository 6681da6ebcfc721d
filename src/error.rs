//! Error types for the solver.
//!
//! Conflicts and missing candidates are ordinary outcomes of the matching
//! loop and never leave the scheduler; everything in [`SolverError`] is
//! something a caller has to look at.

use std::path::PathBuf;
use thiserror::Error;

/// Why a token/candidate pair cannot be bound under the current mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MappingConflict {
    /// The cipher symbol already maps to a different plain symbol.
    #[error("origin {symbol:?} already maps to {mapped_to:?}, candidate wants {attempted:?}")]
    OriginAlreadyMapped {
        symbol: char,
        mapped_to: char,
        attempted: char,
    },

    /// The plain symbol is already the image of another cipher symbol.
    #[error("target {target:?} already taken by {held_by:?}, candidate wants it for {attempted_by:?}")]
    TargetAlreadyTaken {
        target: char,
        held_by: char,
        attempted_by: char,
    },

    /// Token and candidate do not align symbol for symbol.
    #[error("length mismatch: token has {token} symbols, candidate has {candidate}")]
    LengthMismatch { token: usize, candidate: usize },
}

/// Top-level error type for loading inputs and persisting state.
#[derive(Debug, Error)]
pub enum SolverError {
    /// A required input file does not exist
    #[error("input file not found: {0}")]
    MissingInputFile(PathBuf),

    /// A vocabulary is not a word -> rank mapping
    #[error("malformed vocabulary {name}: {reason}")]
    MalformedVocabulary { name: String, reason: String },

    /// A checkpoint artifact could not be written
    #[error("failed to write checkpoint {path}: {source}")]
    CheckpointWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A checkpoint artifact exists but does not describe a valid mapping
    #[error("corrupt checkpoint: {0}")]
    CheckpointCorrupt(String),

    /// Configuration values out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session encoding error: {0}")]
    Session(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, SolverError>;
