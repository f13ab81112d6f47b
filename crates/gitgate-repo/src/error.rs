//! Repository resolution error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving a repository.
#[derive(Debug, Error)]
pub enum LocateError {
    /// No resolution rule matched the routing context.
    #[error("repository not resolvable from request")]
    NotResolvable,

    /// An owner or repository component failed validation.
    #[error("invalid repository component: {0:?}")]
    InvalidName(String),

    /// The resolved path does not hold a bare repository.
    #[error("repository path missing: {0}")]
    RepositoryPathMissing(PathBuf),
}
