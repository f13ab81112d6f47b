//! Git transport subprocess bridge.
//!
//! Spawns `git upload-pack` / `git receive-pack` against a resolved bare
//! repository and exposes the child's stdio as async streams. Every call
//! creates exactly one OS process; handles are owned by the request that
//! spawned them and are never shared or pooled. A transport subprocess can
//! block indefinitely waiting on stdin, so an orphaned child is a
//! correctness bug: handles kill on drop and expose forceful termination
//! for the disconnect path.

mod error;

pub use error::BridgeError;

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use gitgate_git::TransportService;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// How the transport binary is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    /// Emit the ref advertisement and exit; stdin is not fed.
    AdvertiseOnly,
    /// One stateless negotiation round, stdin wired to the caller.
    StatelessRpc,
}

/// Terminal state of a transport subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited on its own with this code.
    Exited(i32),
    /// Terminated by a signal.
    Killed,
}

impl ExitOutcome {
    /// True for a zero exit code.
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Self::Exited(code),
            None => Self::Killed,
        }
    }
}

/// Factory for git transport subprocesses.
///
/// Constructed once at startup and handed to the HTTP and SSH handlers as an
/// explicit collaborator, so tests can point it at a different binary.
pub struct ProcessBridge {
    git_binary: PathBuf,
}

impl Default for ProcessBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessBridge {
    /// Creates a bridge that invokes `git` from `PATH`.
    pub fn new() -> Self {
        Self {
            git_binary: PathBuf::from("git"),
        }
    }

    /// Creates a bridge around a specific git binary.
    pub fn with_binary(git_binary: impl Into<PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    /// Spawns the transport service against `repo_path`.
    ///
    /// The path must already be resolved and absolute; it is re-checked here
    /// so a vanished repository fails fast without invoking the subprocess.
    pub fn spawn(
        &self,
        service: TransportService,
        repo_path: &Path,
        mode: SpawnMode,
    ) -> Result<ProcessHandle> {
        self.spawn_with_env(service, repo_path, mode, &[])
    }

    /// Like [`ProcessBridge::spawn`], with extra environment variables for
    /// the child (e.g. `GIT_PROTOCOL` passthrough on the SSH path).
    pub fn spawn_with_env(
        &self,
        service: TransportService,
        repo_path: &Path,
        mode: SpawnMode,
        env: &[(&str, &str)],
    ) -> Result<ProcessHandle> {
        if !repo_path.join("HEAD").is_file() {
            return Err(BridgeError::RepositoryPathMissing(repo_path.to_path_buf()));
        }

        let mut cmd = Command::new(&self.git_binary);
        cmd.arg(service.binary_arg());
        cmd.arg("--stateless-rpc");
        if mode == SpawnMode::AdvertiseOnly {
            cmd.arg("--advertise-refs");
        }
        cmd.arg(repo_path);

        for (key, value) in env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(BridgeError::SpawnFailed)?;
        tracing::debug!(
            service = %service,
            mode = ?mode,
            path = %repo_path.display(),
            pid = ?child.id(),
            "spawned git transport"
        );

        Ok(ProcessHandle { child })
    }

    /// Plain ref listing for the non-smart `info/refs` branch.
    ///
    /// Runs a one-shot `for-each-ref` instead of the advertise-refs path and
    /// returns `<oid>\t<refname>` lines as text.
    pub async fn list_refs(&self, repo_path: &Path) -> Result<String> {
        if !repo_path.join("HEAD").is_file() {
            return Err(BridgeError::RepositoryPathMissing(repo_path.to_path_buf()));
        }

        let output = Command::new(&self.git_binary)
            .arg("--git-dir")
            .arg(repo_path)
            .arg("for-each-ref")
            .arg("--format=%(objectname)\t%(refname)")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(BridgeError::SpawnFailed)?;

        if !output.status.success() {
            return Err(BridgeError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// One spawned transport subprocess.
///
/// Owned exclusively by the request that spawned it. Dropping the handle
/// kills the child; [`ProcessHandle::wait`] reaps it.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
}

impl ProcessHandle {
    /// Takes the child's stdin. Dropping the returned handle closes the pipe
    /// and signals EOF to the child.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Takes the child's stdout stream.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Takes the child's stderr stream.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// OS process id, while the child is running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Sends a forceful kill signal without waiting for the child to exit.
    ///
    /// Callers invoke this when the owning network connection closes; the
    /// child is reaped by a subsequent [`ProcessHandle::wait`] or on drop.
    pub fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            // Already exited; wait() will pick up the status.
            tracing::debug!(error = %e, "kill signal not delivered");
        }
    }

    /// Waits for the child to exit and reaps it.
    pub async fn wait(&mut self) -> Result<ExitOutcome> {
        let status = self.child.wait().await?;
        Ok(ExitOutcome::from(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_fails_before_spawn() {
        let bridge = ProcessBridge::new();
        let err = bridge
            .spawn(
                TransportService::UploadPack,
                Path::new("/nonexistent/repo.git"),
                SpawnMode::AdvertiseOnly,
            )
            .unwrap_err();
        assert!(matches!(err, BridgeError::RepositoryPathMissing(_)));
    }

    #[test]
    fn test_exit_outcome_mapping() {
        assert!(ExitOutcome::Exited(0).success());
        assert!(!ExitOutcome::Exited(128).success());
        assert!(!ExitOutcome::Killed.success());
    }
}
