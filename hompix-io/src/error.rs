//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed.
    #[error("settings error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed line in a text input.
    #[error("{path}:{line}: {reason}")]
    InvalidFormat {
        /// Offending file.
        path: String,
        /// One-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// Capture stream could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] hompix_tpx::Error),

    /// Worker pool could not be started.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] hompix_core::Error),
}

impl Error {
    /// Returns true for errors reported to the user as warnings.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Decode(e) if e.is_warning())
    }
}
