//! Message peers over TCP.
//!
//! [`PeerListener`] accepts one peer at a time; [`PeerConnector`] dials a
//! listener. Both send and receive whole [`Value`]s. The runtimes in
//! [`runtime`] drive either role on a background thread and report lifecycle
//! events through handler traits.
//!
//! [`Value`]: tagwire_codec::Value

pub mod config;
pub mod connector;
pub mod error;
pub mod link;
pub mod listener;
pub mod runtime;

pub use config::{ConnectorConfig, ListenerConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT};
pub use connector::PeerConnector;
pub use error::{PeerError, Result};
pub use link::{PeerSender, ShutdownHandle};
pub use listener::PeerListener;
pub use runtime::{
    ConnectorHandler, ConnectorRuntime, Finished, ListenerHandler, ListenerRuntime, Responder,
};
