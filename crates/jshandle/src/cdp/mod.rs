//! CDP (Chrome DevTools Protocol) session capability
//!
//! The handle core never owns a connection. It is handed something that can
//! `send(method, params)` and treats every call as one suspension point.

pub mod protocol;
pub mod session;

pub use protocol::is_context_destroyed;
pub use session::{CdpError, CdpSession, Result};
