//! Process bridge error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from spawning or supervising a git transport subprocess.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The repository directory was missing before any spawn was attempted.
    #[error("repository path missing: {0}")]
    RepositoryPathMissing(PathBuf),

    /// The git binary could not be started.
    #[error("failed to spawn git transport: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The subprocess finished with a non-zero exit code.
    #[error("git transport exited with code {code}")]
    NonZeroExit { code: i32 },

    /// I/O error while talking to the subprocess.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
