//! Git wire protocol framing for Gitgate.
//!
//! This crate implements the pkt-line framing used by git's smart transports
//! and the transport service vocabulary shared by the HTTP and SSH gateways.
//! Negotiation payloads themselves are never interpreted here; they are
//! opaque bytes passed through to the git transport subprocess.

mod error;
mod pktline;
mod service;

pub use error::GitError;
pub use pktline::{service_prelude, PktLine};
pub use service::TransportService;

/// Result type for git protocol operations.
pub type Result<T> = std::result::Result<T, GitError>;
