use tagwire_codec::CodecError;
use tagwire_frame::FrameError;
use tagwire_transport::TransportError;

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error (I/O, oversized frame, encode or decode failure).
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// Codec setup failed, e.g. a custom kind collides with a built-in one.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The listener has no connected peer.
    #[error("no peer connected")]
    NoPeerConnected,

    /// The connector has no open connection.
    #[error("not connected")]
    NotConnected,

    /// No message started before the receive timeout elapsed.
    #[error("timed out waiting for a message")]
    ReceiveTimeout,

    /// The peer was shut down.
    #[error("peer is closed")]
    Closed,

    /// The runtime thread could not be started.
    #[error("failed to spawn runtime thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The runtime thread panicked.
    #[error("runtime thread panicked")]
    TaskPanicked,
}

impl PeerError {
    /// Returns true if the error means the connection is gone.
    ///
    /// Runtimes treat these as a disconnect rather than an unhandled error.
    pub fn is_disconnect(&self) -> bool {
        match self {
            PeerError::Transport(_) => true,
            PeerError::Frame(err) => err.is_transport(),
            _ => false,
        }
    }
}

impl From<FrameError> for PeerError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ReceiveTimeout => PeerError::ReceiveTimeout,
            other => PeerError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
