//! SSH exec command grammar.
//!
//! The only commands accepted on an exec channel are
//! `git-upload-pack '<path>'` and `git-receive-pack '<path>'` with the path
//! in single or double quotes. Everything else is rejected before any
//! subprocess is spawned, so the allow-list is exhaustive by construction.

use gitgate_git::TransportService;

/// A validated exec command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// `git-upload-pack '<path>'`
    Upload {
        /// Quoted path as the client sent it.
        path: String,
    },
    /// `git-receive-pack '<path>'`
    Receive {
        /// Quoted path as the client sent it.
        path: String,
    },
}

impl ParsedCommand {
    /// The transport service this command maps to.
    pub fn service(&self) -> TransportService {
        match self {
            Self::Upload { .. } => TransportService::UploadPack,
            Self::Receive { .. } => TransportService::ReceivePack,
        }
    }

    /// The raw quoted path.
    pub fn path(&self) -> &str {
        match self {
            Self::Upload { path } | Self::Receive { path } => path,
        }
    }

    /// Repository name: the path's final segment, `.git` suffix stripped.
    pub fn repo_name(&self) -> &str {
        let last = self
            .path()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        last.strip_suffix(".git").unwrap_or(last)
    }

    /// Owner: the path segment before the repository name, when present.
    pub fn owner(&self) -> Option<&str> {
        let trimmed = self.path().trim_start_matches('/').trim_end_matches('/');
        let mut rev = trimmed.rsplit('/');
        rev.next()?;
        rev.next().filter(|s| !s.is_empty())
    }
}

/// Parses a raw exec command string against the allow-list grammar.
///
/// Returns `None` for anything that is not exactly a git transport verb
/// followed by one quoted, non-empty path.
pub fn parse_command(raw: &str) -> Option<ParsedCommand> {
    let raw = raw.trim();

    let (verb_is_upload, rest) = if let Some(rest) = raw.strip_prefix("git-upload-pack") {
        (true, rest)
    } else if let Some(rest) = raw.strip_prefix("git-receive-pack") {
        (false, rest)
    } else {
        return None;
    };

    // The verb must be followed by whitespace, then the quoted path.
    if !rest.starts_with(|c: char| c.is_ascii_whitespace()) {
        return None;
    }
    let arg = rest.trim();

    let quote = match arg.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return None,
    };
    let inner = &arg[1..];
    let path = inner.strip_suffix(quote)?;

    // One argument, nothing after the closing quote, no embedded quotes.
    if path.is_empty() || path.contains(quote) || path.contains('\n') {
        return None;
    }

    Some(if verb_is_upload {
        ParsedCommand::Upload {
            path: path.to_string(),
        }
    } else {
        ParsedCommand::Receive {
            path: path.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_upload_pack_single_quoted() {
        let cmd = parse_command("git-upload-pack '/x/y.git'").unwrap();
        assert_eq!(cmd.service(), TransportService::UploadPack);
        assert_eq!(cmd.path(), "/x/y.git");
        assert_eq!(cmd.repo_name(), "y");
        assert_eq!(cmd.owner(), Some("x"));
    }

    #[test]
    fn parse_receive_pack_double_quoted() {
        let cmd = parse_command("git-receive-pack \"alice/demo.git\"").unwrap();
        assert_eq!(cmd.service(), TransportService::ReceivePack);
        assert_eq!(cmd.repo_name(), "demo");
        assert_eq!(cmd.owner(), Some("alice"));
    }

    #[test]
    fn unquoted_path_rejected() {
        assert!(parse_command("git-upload-pack /x/y.git").is_none());
    }

    #[test]
    fn arbitrary_commands_rejected() {
        assert!(parse_command("rm -rf /").is_none());
        assert!(parse_command("git-upload-packx 'a/b'").is_none());
        assert!(parse_command("scp 'a/b'").is_none());
        assert!(parse_command("").is_none());
    }

    #[test]
    fn empty_or_mismatched_quotes_rejected() {
        assert!(parse_command("git-upload-pack ''").is_none());
        assert!(parse_command("git-upload-pack '/x/y.git").is_none());
        assert!(parse_command("git-upload-pack '/x/y.git\"").is_none());
        assert!(parse_command("git-upload-pack '/x/y' extra").is_none());
    }

    #[test]
    fn owner_absent_for_single_segment_path() {
        let cmd = parse_command("git-upload-pack 'demo.git'").unwrap();
        assert_eq!(cmd.repo_name(), "demo");
        assert_eq!(cmd.owner(), None);
    }

    #[test]
    fn deep_path_uses_last_two_segments() {
        let cmd = parse_command("git-upload-pack '/srv/git/alice/demo.git'").unwrap();
        assert_eq!(cmd.repo_name(), "demo");
        assert_eq!(cmd.owner(), Some("alice"));
    }
}
