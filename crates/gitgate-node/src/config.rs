//! Node configuration types.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Effective configuration of a running gateway node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Smart HTTP listen address.
    pub http_addr: SocketAddr,
    /// Root directory holding `owner/repo.git` bare repositories.
    pub repo_root: PathBuf,
    /// Whether the SSH listener is enabled.
    pub ssh_enabled: bool,
    /// SSH listen port.
    pub ssh_port: u16,
    /// Host private key file for the SSH listener.
    pub host_key_path: PathBuf,
    /// Log level.
    pub log_level: String,
}

impl Config {
    /// SSH listen address: all interfaces on the configured port.
    pub fn ssh_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.ssh_port))
    }
}
