//! Git protocol error types.

use thiserror::Error;

/// Errors that can occur during git protocol framing.
#[derive(Debug, Error)]
pub enum GitError {
    /// Invalid pkt-line format.
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    /// Unrecognized transport service name.
    #[error("unknown transport service: {0}")]
    UnknownService(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
