//! Gitgate node - git transport gateway.
//!
//! This is the main entry point for serving bare repositories over the
//! smart HTTP protocol and, optionally, over SSH.

use anyhow::Context;
use clap::Parser;
use gitgate_bridge::ProcessBridge;
use gitgate_http::{create_router, AppState};
use gitgate_repo::RepoLocator;
use gitgate_ssh::{load_or_generate_host_key, run_ssh_server, DenyAll};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::Config;

/// Gitgate node - git repository hosting gateway
#[derive(Parser, Debug)]
#[command(name = "gitgate-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Smart HTTP listen address
    #[arg(long, env = "GITGATE_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: SocketAddr,

    /// Root directory for bare repositories (owner/repo.git)
    #[arg(long, env = "GITGATE_REPO_ROOT", default_value = "./repositories")]
    repo_root: PathBuf,

    /// Enable the SSH listener
    #[arg(long, env = "GITGATE_SSH_ENABLED")]
    ssh: bool,

    /// SSH listen port
    #[arg(long, env = "GITGATE_SSH_PORT", default_value_t = 2222)]
    ssh_port: u16,

    /// SSH host private key file
    #[arg(long, env = "GITGATE_HOST_KEY", default_value = "./ssh-host-key.pem")]
    host_key: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Config {
            http_addr: args.http_addr,
            repo_root: args.repo_root.clone(),
            ssh_enabled: args.ssh,
            ssh_port: args.ssh_port,
            host_key_path: args.host_key.clone(),
            log_level: args.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from(&args);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gitgate={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting gitgate node");
    tracing::info!(
        http_addr = %config.http_addr,
        repo_root = %config.repo_root.display(),
        ssh_enabled = config.ssh_enabled,
        "Node configuration"
    );

    std::fs::create_dir_all(&config.repo_root).with_context(|| {
        format!(
            "failed to create repository root {}",
            config.repo_root.display()
        )
    })?;

    // The gateway collaborators are built once and injected everywhere.
    let locator = Arc::new(RepoLocator::new(&config.repo_root));
    let bridge = Arc::new(ProcessBridge::new());

    if config.ssh_enabled {
        // Host identity is loaded before the listener task starts; a node
        // without a usable host key must not come up at all.
        let host_key = load_or_generate_host_key(&config.host_key_path)
            .context("failed to load or generate SSH host key")?;
        let ssh_addr = config.ssh_addr();
        let locator = Arc::clone(&locator);
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            if let Err(e) =
                run_ssh_server(ssh_addr, host_key, locator, bridge, Arc::new(DenyAll)).await
            {
                tracing::error!(error = %e, "SSH listener failed");
            }
        });
    }

    let state = AppState { locator, bridge };
    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    tracing::info!(address = %config.http_addr, "serving smart HTTP");
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server exited with error")?;

    Ok(())
}
