//! Git smart HTTP gateway.
//!
//! Implements the three smart HTTP operations (ref advertisement,
//! upload-pack, receive-pack) by bridging request and response bodies to git
//! transport subprocesses. Bodies are streamed in both directions; nothing is
//! buffered whole, because negotiation payloads can be entire repository
//! packs.

mod error;
mod routes;

pub use error::HttpError;
pub use routes::{create_router, AppState};
