//! Per-connection SSH session handler.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use gitgate_bridge::{ProcessBridge, SpawnMode};
use gitgate_repo::{RepoLocator, RepositoryRef};
use russh::server::{Auth, Handler, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use russh_keys::key::PublicKey;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{parse_command, ParsedCommand, SshAuthorizer};

/// Per-connection session state.
///
/// One exec request maps to at most one transport subprocess; its stdin is
/// parked here so the `data`/`channel_eof` callbacks can forward client
/// bytes and signal EOF.
pub struct SshSession {
    locator: Arc<RepoLocator>,
    bridge: Arc<ProcessBridge>,
    authorizer: Arc<dyn SshAuthorizer>,
    peer_addr: Option<SocketAddr>,
    child_stdin: Option<tokio::process::ChildStdin>,
    /// `GIT_PROTOCOL` value sent by the client via SSH env request.
    git_protocol: Option<String>,
}

impl SshSession {
    /// Creates a session for one incoming connection.
    pub fn new(
        locator: Arc<RepoLocator>,
        bridge: Arc<ProcessBridge>,
        authorizer: Arc<dyn SshAuthorizer>,
        peer_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            locator,
            bridge,
            authorizer,
            peer_addr,
            child_stdin: None,
            git_protocol: None,
        }
    }

    /// Resolves the repository named by a parsed command to an existing bare
    /// repository directory.
    fn resolve_repo(&self, cmd: &ParsedCommand) -> Result<std::path::PathBuf, String> {
        // SSH paths carry the owner as the penultimate segment; a repository
        // without one cannot live under the per-owner root.
        let owner = cmd
            .owner()
            .ok_or_else(|| format!("repository not found: {}", cmd.path()))?;
        let repo_ref = RepositoryRef::new(owner, cmd.repo_name())
            .map_err(|_| format!("invalid repository path: {}", cmd.path()))?;
        self.locator
            .locate_existing(&repo_ref)
            .map_err(|_| format!("repository not found: {repo_ref}"))
    }
}

/// Sends exit-status, EOF, and close in the order RFC 4254 requires. Git's
/// SSH client treats a close without exit-status as a transport failure.
fn finish_channel(session: &mut Session, channel_id: ChannelId, exit_status: u32) {
    session.exit_status_request(channel_id, exit_status);
    session.eof(channel_id);
    session.close(channel_id);
}

fn reject_channel(session: &mut Session, channel_id: ChannelId, message: &str) {
    session.extended_data(
        channel_id,
        1,
        CryptoVec::from_slice(format!("ERROR: {message}\n").as_bytes()),
    );
    finish_channel(session, channel_id, 1);
}

#[async_trait::async_trait]
impl Handler for SshSession {
    type Error = anyhow::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if self.authorizer.authorize_password(user, password) {
            Ok(Auth::Accept)
        } else {
            info!(peer = ?self.peer_addr, user = %user, "password auth rejected");
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }

    async fn auth_publickey(&mut self, user: &str, key: &PublicKey) -> Result<Auth, Self::Error> {
        if self.authorizer.authorize_public_key(user, key) {
            Ok(Auth::Accept)
        } else {
            info!(peer = ?self.peer_addr, user = %user, "public-key auth rejected");
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    /// Git clients send `GIT_PROTOCOL=version=2` before the exec request to
    /// negotiate protocol v2.
    async fn env_request(
        &mut self,
        _channel: ChannelId,
        variable_name: &str,
        variable_value: &str,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if variable_name == "GIT_PROTOCOL" {
            debug!(value = %variable_value, "captured GIT_PROTOCOL from client");
            self.git_protocol = Some(variable_value.to_string());
        }
        Ok(())
    }

    /// Channel data preserves client send order into the transport's stdin.
    async fn data(
        &mut self,
        _channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Some(ref mut stdin) = self.child_stdin {
            if let Err(e) = stdin.write_all(data).await {
                debug!(error = %e, "transport stdin closed");
                self.child_stdin.take();
            }
        }
        Ok(())
    }

    /// Client EOF closes the transport's stdin so it can finish the round.
    async fn channel_eof(
        &mut self,
        _channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.child_stdin.take();
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel_id: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let raw = String::from_utf8_lossy(data);
        info!(peer = ?self.peer_addr, command = %raw, "SSH exec request");

        let Some(cmd) = parse_command(&raw) else {
            warn!(command = %raw, "rejected SSH exec command");
            reject_channel(
                session,
                channel_id,
                "only git-upload-pack and git-receive-pack are supported",
            );
            return Ok(());
        };

        let repo_path = match self.resolve_repo(&cmd) {
            Ok(path) => path,
            Err(message) => {
                warn!(path = %cmd.path(), "SSH repository resolution failed");
                reject_channel(session, channel_id, &message);
                return Ok(());
            }
        };

        let mut env = Vec::new();
        if let Some(proto) = &self.git_protocol {
            env.push(("GIT_PROTOCOL", proto.as_str()));
        }

        let mut handle = match self.bridge.spawn_with_env(
            cmd.service(),
            &repo_path,
            SpawnMode::StatelessRpc,
            &env,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, path = %repo_path.display(), "failed to start git transport");
                reject_channel(session, channel_id, "failed to start git transport");
                return Ok(());
            }
        };

        // Park stdin for the data/channel_eof callbacks; the pump below owns
        // stdout and stderr.
        self.child_stdin = handle.take_stdin();
        let stdout = handle.take_stdout();
        let stderr = handle.take_stderr();
        let service = cmd.service();
        let handle_tx = session.handle();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 65536];

            if let Some(mut stdout) = stdout {
                // Transport stdout preserves order onto the channel.
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) => break,
                        Ok(n) => {
                            if handle_tx
                                .data(channel_id, CryptoVec::from_slice(&buf[..n]))
                                .await
                                .is_err()
                            {
                                // Channel gone: the client disconnected.
                                // Kill the transport rather than let it block
                                // on a dead peer.
                                handle.terminate();
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "error reading transport stdout");
                            break;
                        }
                    }
                }
            }

            let exit_code = match handle.wait().await {
                Ok(outcome) => {
                    if !outcome.success() {
                        warn!(service = %service, outcome = ?outcome, "git transport finished with error");
                    }
                    match outcome {
                        gitgate_bridge::ExitOutcome::Exited(code) => code.max(0) as u32,
                        gitgate_bridge::ExitOutcome::Killed => 1,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to reap git transport");
                    1
                }
            };

            // Stderr goes to the channel's side band, never stdout.
            if let Some(mut stderr) = stderr {
                let mut err_buf = Vec::new();
                let _ = stderr.read_to_end(&mut err_buf).await;
                if !err_buf.is_empty() {
                    let _ = handle_tx
                        .extended_data(channel_id, 1, CryptoVec::from_slice(&err_buf))
                        .await;
                }
            }

            // RFC 4254: exit-status, EOF, close.
            let _ = handle_tx.exit_status_request(channel_id, exit_code).await;
            let _ = handle_tx.eof(channel_id).await;
            let _ = handle_tx.close(channel_id).await;
        });

        Ok(())
    }
}
