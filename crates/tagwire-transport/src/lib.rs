//! Blocking TCP stream transport.
//!
//! This is the lowest layer of tagwire: bind/listen/accept/connect over TCP
//! with per-call read and write timeouts. Everything else builds on top of
//! the [`WireStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::WireStream;
pub use tcp::{wake_address, TcpTransport, DEFAULT_BACKLOG};
