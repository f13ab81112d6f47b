//! SSH transport gateway.
//!
//! Accepts inbound SSH connections, gates them through an injected
//! authorization collaborator, and serves `git-upload-pack` /
//! `git-receive-pack` exec requests by bridging channel data to a transport
//! subprocess. The SSH crypto stack itself is `russh`; this crate only owns
//! the command grammar, the channel-to-subprocess wiring, and host identity
//! key material.

mod auth;
mod command;
mod server;
mod session;

pub use auth::{DenyAll, SshAuthorizer};
pub use command::{parse_command, ParsedCommand};
pub use server::{load_or_generate_host_key, run_ssh_server, SshServer};
pub use session::SshSession;
