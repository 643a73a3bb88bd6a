//! Length-prefixed message framing.
//!
//! Every message is framed with a 4-byte big-endian payload length followed
//! by the payload: UTF-8 JSON text produced by the value codec.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use message::{decode_message, encode_message};
pub use reader::FrameReader;
pub use writer::FrameWriter;
