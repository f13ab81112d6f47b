//! Repository resolution for Gitgate.
//!
//! Maps the routing context of an inbound request (path parameters, bearer
//! credential, raw URL path) to a [`RepositoryRef`] and a filesystem location
//! under the configured repository root. The authoritative repository list
//! belongs to an external metadata store; this crate only answers "which
//! bare repository directory does this request mean, and does it exist".

mod error;
mod locator;
mod reference;
mod token;

pub use error::LocateError;
pub use locator::{RepoLocator, RouteContext};
pub use reference::RepositoryRef;
pub use token::{TokenError, TokenVerifier};

/// Result type for repository resolution.
pub type Result<T> = std::result::Result<T, LocateError>;
