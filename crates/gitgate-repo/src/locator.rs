//! Repository locator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{LocateError, RepositoryRef, TokenVerifier};

/// Path segments that can never name an owner or a repository because they
/// collide with API namespaces or transport service verbs.
const RESERVED_SEGMENTS: &[&str] = &["api", "info", "git-upload-pack", "git-receive-pack"];

/// Immutable snapshot of the routing input one request carries.
///
/// Handlers build this once from whatever the router bound and pass it by
/// reference; nothing downstream mutates request state.
#[derive(Debug, Default, Clone, Copy)]
pub struct RouteContext<'a> {
    /// Explicitly bound `owner` path parameter.
    pub owner: Option<&'a str>,
    /// Explicitly bound `repo` path parameter.
    pub repo: Option<&'a str>,
    /// Bearer credential from the `Authorization` header.
    pub bearer: Option<&'a str>,
    /// Raw URL path, for the generic two-segment fallback.
    pub path: Option<&'a str>,
}

/// Resolves routing context to repository directories under a single root.
pub struct RepoLocator {
    root: PathBuf,
    tokens: Option<Arc<dyn TokenVerifier>>,
}

impl RepoLocator {
    /// Creates a locator over `root` without bearer-token support.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tokens: None,
        }
    }

    /// Creates a locator that can derive the owner from a bearer token.
    pub fn with_token_verifier(root: impl Into<PathBuf>, tokens: Arc<dyn TokenVerifier>) -> Self {
        Self {
            root: root.into(),
            tokens: Some(tokens),
        }
    }

    /// Repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a routing context to a [`RepositoryRef`].
    ///
    /// Resolution order, first match wins:
    /// 1. explicit `owner` and `repo` parameters;
    /// 2. bearer token plus `repo` parameter, owner taken from the verified
    ///    identity (an invalid token falls through, it does not abort);
    /// 3. generic `/owner/repo` path whose segments avoid the reserved set;
    /// 4. otherwise `NotResolvable`.
    pub fn resolve(&self, ctx: &RouteContext<'_>) -> Result<RepositoryRef, LocateError> {
        if let (Some(owner), Some(repo)) = (ctx.owner, ctx.repo) {
            return RepositoryRef::new(owner, repo);
        }

        if let (Some(token), Some(repo)) = (ctx.bearer, ctx.repo) {
            if let Some(tokens) = &self.tokens {
                match tokens.verify(token) {
                    Ok(login) => return RepositoryRef::new(&login, repo),
                    Err(e) => {
                        tracing::debug!(error = %e, "bearer token rejected, trying path resolution");
                    }
                }
            }
        }

        if let Some(path) = ctx.path {
            if let Some(r) = resolve_generic_path(path) {
                return r;
            }
        }

        Err(LocateError::NotResolvable)
    }

    /// Resolves a reference to the absolute directory of an existing bare
    /// repository.
    ///
    /// Fails with `RepositoryPathMissing` when the directory does not hold a
    /// bare repository (no `HEAD` file), and with `NotResolvable` if the
    /// canonical path escapes the repository root.
    pub fn locate_existing(&self, repo: &RepositoryRef) -> Result<PathBuf, LocateError> {
        let dir = repo.dir_path(&self.root);
        if !dir.join("HEAD").is_file() {
            return Err(LocateError::RepositoryPathMissing(dir));
        }

        let canonical = dir
            .canonicalize()
            .map_err(|_| LocateError::RepositoryPathMissing(dir.clone()))?;
        let root = self
            .root
            .canonicalize()
            .map_err(|_| LocateError::RepositoryPathMissing(self.root.clone()))?;

        if !canonical.starts_with(&root) {
            tracing::warn!(path = %canonical.display(), "resolved repository escapes root");
            return Err(LocateError::NotResolvable);
        }

        Ok(canonical)
    }
}

/// Rule 3: a generic `/owner/repo...` path where neither leading segment is
/// reserved. Returns None when the shape does not apply at all.
fn resolve_generic_path(path: &str) -> Option<Result<RepositoryRef, LocateError>> {
    let mut segments = path.trim_start_matches('/').splitn(3, '/');
    let owner = segments.next().filter(|s| !s.is_empty())?;
    let repo = segments.next().filter(|s| !s.is_empty())?;

    if RESERVED_SEGMENTS.contains(&owner) || RESERVED_SEGMENTS.contains(&repo) {
        return None;
    }

    Some(RepositoryRef::new(owner, repo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenError;

    struct FakeVerifier {
        login: Option<String>,
    }

    impl TokenVerifier for FakeVerifier {
        fn verify(&self, _token: &str) -> Result<String, TokenError> {
            self.login.clone().ok_or(TokenError::Invalid)
        }
    }

    fn locator_with(login: Option<&str>) -> RepoLocator {
        RepoLocator::with_token_verifier(
            "/srv/repos",
            Arc::new(FakeVerifier {
                login: login.map(String::from),
            }),
        )
    }

    #[test]
    fn test_explicit_pair_wins_over_token() {
        let locator = locator_with(Some("token-owner"));
        let ctx = RouteContext {
            owner: Some("alice"),
            repo: Some("demo"),
            bearer: Some("tok"),
            path: None,
        };
        let r = locator.resolve(&ctx).unwrap();
        assert_eq!(r.owner(), "alice");
    }

    #[test]
    fn test_token_rule_supplies_owner() {
        let locator = locator_with(Some("bob"));
        let ctx = RouteContext {
            repo: Some("demo"),
            bearer: Some("tok"),
            ..Default::default()
        };
        let r = locator.resolve(&ctx).unwrap();
        assert_eq!(r.owner(), "bob");
        assert_eq!(r.name(), "demo.git");
    }

    #[test]
    fn test_invalid_token_falls_through_to_path() {
        let locator = locator_with(None);
        let ctx = RouteContext {
            repo: Some("demo"),
            bearer: Some("bad"),
            path: Some("/carol/demo/info/refs"),
            ..Default::default()
        };
        let r = locator.resolve(&ctx).unwrap();
        assert_eq!(r.owner(), "carol");
    }

    #[test]
    fn test_generic_path_rule() {
        let locator = RepoLocator::new("/srv/repos");
        let ctx = RouteContext {
            path: Some("/carol/demo.git/git-upload-pack"),
            ..Default::default()
        };
        let r = locator.resolve(&ctx).unwrap();
        assert_eq!(r.owner(), "carol");
        assert_eq!(r.name(), "demo.git");
    }

    #[test]
    fn test_reserved_segments_rejected() {
        let locator = RepoLocator::new("/srv/repos");
        for path in ["/api/demo", "/info/refs", "/alice/git-upload-pack"] {
            let ctx = RouteContext {
                path: Some(path),
                ..Default::default()
            };
            assert!(
                matches!(locator.resolve(&ctx), Err(LocateError::NotResolvable)),
                "path {path:?} should not resolve"
            );
        }
    }

    #[test]
    fn test_nothing_matches() {
        let locator = RepoLocator::new("/srv/repos");
        let ctx = RouteContext::default();
        assert!(matches!(
            locator.resolve(&ctx),
            Err(LocateError::NotResolvable)
        ));
    }

    #[test]
    fn test_traversal_rejected_before_filesystem() {
        let locator = RepoLocator::new("/srv/repos");
        let ctx = RouteContext {
            owner: Some("../etc"),
            repo: Some("passwd"),
            ..Default::default()
        };
        assert!(matches!(
            locator.resolve(&ctx),
            Err(LocateError::InvalidName(_))
        ));
    }

    #[test]
    fn test_locate_existing_requires_bare_repo() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = RepoLocator::new(tmp.path());
        let r = RepositoryRef::new("alice", "demo").unwrap();

        assert!(matches!(
            locator.locate_existing(&r),
            Err(LocateError::RepositoryPathMissing(_))
        ));

        let dir = tmp.path().join("alice/demo.git");
        std::fs::create_dir_all(&dir).unwrap();
        // Directory alone is not enough.
        assert!(locator.locate_existing(&r).is_err());

        std::fs::write(dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        let located = locator.locate_existing(&r).unwrap();
        assert!(located.is_absolute());
        assert!(located.ends_with("alice/demo.git"));
    }
}
