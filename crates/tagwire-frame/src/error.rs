use tagwire_codec::CodecError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// No frame started before the read timeout elapsed.
    #[error("timed out waiting for a frame")]
    ReceiveTimeout,

    /// The value could not be turned into a payload.
    #[error("encode error: {0}")]
    Encode(#[source] CodecError),

    /// The payload could not be turned back into a value.
    #[error("decode error: {0}")]
    Decode(#[source] CodecError),
}

impl FrameError {
    /// Returns true if the underlying connection should be considered gone.
    pub fn is_transport(&self) -> bool {
        matches!(self, FrameError::Io(_) | FrameError::ConnectionClosed)
    }
}

impl From<tagwire_transport::TransportError> for FrameError {
    fn from(err: tagwire_transport::TransportError) -> Self {
        match err {
            tagwire_transport::TransportError::Io(io)
            | tagwire_transport::TransportError::Accept(io) => FrameError::Io(io),
            tagwire_transport::TransportError::Bind { source, .. }
            | tagwire_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
