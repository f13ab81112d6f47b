//! SSH listener bootstrap and host identity key material.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use gitgate_bridge::ProcessBridge;
use gitgate_repo::RepoLocator;
use russh::server::{self, Server};
use russh::MethodSet;
use russh_keys::key::KeyPair;
use tracing::{info, warn};

use crate::{SshAuthorizer, SshSession};

/// Top-level SSH server that hands each connection to an [`SshSession`].
pub struct SshServer {
    locator: Arc<RepoLocator>,
    bridge: Arc<ProcessBridge>,
    authorizer: Arc<dyn SshAuthorizer>,
}

impl SshServer {
    /// Creates a server over the shared gateway collaborators.
    pub fn new(
        locator: Arc<RepoLocator>,
        bridge: Arc<ProcessBridge>,
        authorizer: Arc<dyn SshAuthorizer>,
    ) -> Self {
        Self {
            locator,
            bridge,
            authorizer,
        }
    }
}

impl server::Server for SshServer {
    type Handler = SshSession;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> Self::Handler {
        info!(peer = ?peer_addr, "new SSH client connection");
        SshSession::new(
            Arc::clone(&self.locator),
            Arc::clone(&self.bridge),
            Arc::clone(&self.authorizer),
            peer_addr,
        )
    }
}

/// Loads the host private key from `path`, or generates and persists a fresh
/// Ed25519 key.
///
/// An unreadable or unparsable key file is deleted and replaced; the
/// listener must not start with a host identity it cannot use, so any
/// remaining failure here is fatal to startup.
pub fn load_or_generate_host_key(path: &Path) -> Result<KeyPair> {
    if path.exists() {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read host key at {}", path.display()))?;
        match russh_keys::decode_secret_key(&pem, None) {
            Ok(key) => {
                info!(path = %path.display(), "loaded SSH host key");
                return Ok(key);
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "host key file is not a usable private key, regenerating"
                );
                std::fs::remove_file(path).with_context(|| {
                    format!("failed to remove invalid host key at {}", path.display())
                })?;
            }
        }
    }

    let key = KeyPair::generate_ed25519();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let mut pem = Vec::new();
    russh_keys::encode_pkcs8_pem(&key, &mut pem).context("failed to encode host key")?;
    std::fs::write(path, &pem)
        .with_context(|| format!("failed to persist host key at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .context("failed to restrict host key permissions")?;
    }

    info!(path = %path.display(), "generated new SSH host key");
    Ok(key)
}

/// Starts the SSH listener with an already-loaded host key. Runs until the
/// server shuts down or fails.
pub async fn run_ssh_server(
    listen_addr: SocketAddr,
    host_key: KeyPair,
    locator: Arc<RepoLocator>,
    bridge: Arc<ProcessBridge>,
    authorizer: Arc<dyn SshAuthorizer>,
) -> Result<()> {
    let russh_config = Arc::new(server::Config {
        keys: vec![host_key],
        methods: MethodSet::PUBLICKEY | MethodSet::PASSWORD,
        inactivity_timeout: Some(Duration::from_secs(600)),
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::from_secs(0)),
        ..Default::default()
    });

    info!(address = %listen_addr, "starting SSH listener");

    let mut ssh_server = SshServer::new(locator, bridge, authorizer);
    ssh_server
        .run_on_address(russh_config, listen_addr)
        .await
        .context("SSH listener exited with error")?;

    Ok(())
}
