/// Errors that can occur while encoding or decoding values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value has no wire representation.
    #[error("value cannot be encoded: {0}")]
    UnencodableValue(String),

    /// A tagged wrapper names a kind this codec does not know.
    #[error("unknown decode kind '{0}'")]
    UnknownDecodeKind(String),

    /// A tagged wrapper's content does not have the shape its kind requires.
    #[error("malformed {kind} content: {reason}")]
    MalformedContent { kind: String, reason: String },

    /// An array shape does not match its element count.
    #[error("shape {shape:?} does not match {len} elements")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    /// A custom kind collides with a built-in kind.
    #[error("kind '{0}' is reserved for built-in values")]
    ReservedKind(String),

    /// JSON text serialization or parsing failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    pub(crate) fn malformed(kind: &str, reason: impl Into<String>) -> Self {
        CodecError::MalformedContent {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
