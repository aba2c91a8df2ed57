//! Error types for hompix-core.

use thiserror::Error;

/// Result type alias for hompix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for hompix operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid import settings.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Not enough events to build the requested analytic.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Channel line fit could not be computed.
    #[error("line fit failed: {0}")]
    FitError(String),
}
