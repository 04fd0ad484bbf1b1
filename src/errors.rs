//! Error types for the tokenfit command line tool.
//!
//! Condensing and chunking never fail; these cover reading inputs and
//! writing JSON.

use std::path::PathBuf;

/// Top-level error type for tokenfit operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenfitError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Map an error to its exit code.
pub fn exit_code(error: &TokenfitError) -> i32 {
    match error {
        TokenfitError::PathNotFound(_) => 3,
        TokenfitError::Io(_) => 1,
        TokenfitError::Json(_) => 1,
    }
}
