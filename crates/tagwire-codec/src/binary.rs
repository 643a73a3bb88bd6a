//! Binary blobs as lowercase hex.

use crate::error::{CodecError, Result};

pub(crate) fn encode_hex(data: &[u8]) -> serde_json::Value {
    serde_json::Value::String(hex::encode(data))
}

pub(crate) fn decode_hex(kind: &str, content: &serde_json::Value) -> Result<Vec<u8>> {
    let text = content
        .as_str()
        .ok_or_else(|| CodecError::malformed(kind, "content must be a hex string"))?;
    hex::decode(text).map_err(|err| CodecError::malformed(kind, err.to_string()))
}
