//! Error types for scalp-exit.

use thiserror::Error;

/// Exit engine error types.
///
/// Collaborator failures surface as `Submission` and are handled
/// per-position; they never abort a cycle.
#[derive(Debug, Error)]
pub enum ExitError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Order submission failed: {0}")]
    Submission(String),

    #[error("Portfolio collaborator failed: {0}")]
    Portfolio(String),

    #[error(transparent)]
    Core(#[from] scalp_core::CoreError),
}

/// Result type alias for exit operations.
pub type ExitResult<T> = std::result::Result<T, ExitError>;
