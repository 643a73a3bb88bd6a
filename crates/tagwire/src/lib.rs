//! Typed JSON messages over length-prefixed TCP streams.
//!
//! tagwire carries values that plain JSON cannot (binary blobs, complex
//! numbers and arrays, datasets, series) through tagged wrapper objects, and
//! delivers them as whole messages over a TCP connection.
//!
//! # Crate Structure
//!
//! - [`transport`]: Blocking TCP bind/accept/connect with timeouts
//! - [`codec`]: Value model and the tagged-wrapper codec
//! - [`frame`]: 4-byte big-endian length-prefixed framing
//! - [`peer`]: Listener and connector peers plus threaded runtimes (behind `peer` feature)
//!
//! ```text
//! use tagwire::codec::Value;
//! use tagwire::peer::PeerConnector;
//!
//! let reply = PeerConnector::connect("127.0.0.1", 9000)?
//!     .send(&Value::bytes(vec![0xff, 0x00]))?
//!     .receive_and_close(None)?;
//! ```

/// Re-export transport types.
pub mod transport {
    pub use tagwire_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use tagwire_codec::*;
}

/// Re-export frame types.
pub mod frame {
    pub use tagwire_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use tagwire_peer::*;
}

pub use tagwire_codec::{Codec, Value};
