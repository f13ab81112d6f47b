//! Repository reference type.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::LocateError;

/// A logical `(owner, repo)` pair resolved from request routing input.
///
/// The repository name always carries a `.git` suffix internally so that one
/// reference maps to exactly one on-disk directory regardless of which URL
/// shape the client used. Constructed per request; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    owner: String,
    name: String,
}

impl RepositoryRef {
    /// Builds a reference from raw routing components, appending `.git` to
    /// the repository name if absent.
    ///
    /// Both components are validated before any filesystem use: empty
    /// strings, path separators, NUL bytes, and dot-prefixed names (which
    /// cover `.` and `..` traversal) are rejected.
    pub fn new(owner: &str, repo: &str) -> Result<Self, LocateError> {
        validate_component(owner)?;
        validate_component(repo)?;

        let name = if repo.ends_with(".git") {
            repo.to_string()
        } else {
            format!("{repo}.git")
        };

        Ok(Self {
            owner: owner.to_string(),
            name,
        })
    }

    /// Owner login.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Normalized repository directory name, with `.git` suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Repository name without the `.git` suffix.
    pub fn short_name(&self) -> &str {
        self.name.strip_suffix(".git").unwrap_or(&self.name)
    }

    /// The repository directory under `root`: `root/owner/name`.
    pub fn dir_path(&self, root: &Path) -> PathBuf {
        root.join(&self.owner).join(&self.name)
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn validate_component(component: &str) -> Result<(), LocateError> {
    let invalid = component.is_empty()
        || component.starts_with('.')
        || component
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0');

    if invalid {
        return Err(LocateError::InvalidName(component.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_suffix_normalization() {
        let a = RepositoryRef::new("alice", "demo").unwrap();
        let b = RepositoryRef::new("alice", "demo.git").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name(), "demo.git");
        assert_eq!(a.short_name(), "demo");
    }

    #[test]
    fn test_dir_path_under_owner_root() {
        let r = RepositoryRef::new("alice", "demo").unwrap();
        assert_eq!(
            r.dir_path(Path::new("/srv/repos")),
            PathBuf::from("/srv/repos/alice/demo.git")
        );
    }

    #[test]
    fn test_rejects_traversal_components() {
        assert!(RepositoryRef::new("../etc", "demo").is_err());
        assert!(RepositoryRef::new("alice", "../../x").is_err());
        assert!(RepositoryRef::new("alice", "a/b").is_err());
        assert!(RepositoryRef::new("alice", "a\\b").is_err());
        assert!(RepositoryRef::new("", "demo").is_err());
        assert!(RepositoryRef::new("alice", "").is_err());
        assert!(RepositoryRef::new("alice", ".hidden").is_err());
        assert!(RepositoryRef::new("alice", "x\0y").is_err());
    }

    #[test]
    fn test_allows_interior_dots_and_dashes() {
        assert!(RepositoryRef::new("alice-dev", "my.project").is_ok());
    }
}
