//! Complex scalars and complex arrays.
//!
//! Both forms pack each element as two little-endian `f32` (real, imaginary)
//! and base64 the result. A scalar travels inline as a string:
//!
//! ```text
//! "c" + base64(re_le_f32 ++ im_le_f32)      // always 13 characters
//! ```
//!
//! Arrays travel in a `numpy_complex` wrapper with an explicit `_shape`.

use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_complex::Complex32;

use crate::error::{CodecError, Result};
use crate::kind::NUMPY_COMPLEX;
use crate::value::NdArray;

/// Leading character of the inline complex encoding.
pub const INLINE_SENTINEL: char = 'c';

const PAIR_SIZE: usize = 8;

/// Exact length of every inline complex string, derived from the zero pair.
pub static INLINE_LEN: LazyLock<usize> =
    LazyLock::new(|| encode_inline(Complex32::new(0.0, 0.0)).len());

/// Encode a scalar as its inline string form.
pub fn encode_inline(value: Complex32) -> String {
    let mut packed = [0u8; PAIR_SIZE];
    packed[..4].copy_from_slice(&value.re.to_le_bytes());
    packed[4..].copy_from_slice(&value.im.to_le_bytes());

    let mut out = String::with_capacity(1 + 12);
    out.push(INLINE_SENTINEL);
    STANDARD.encode_string(packed, &mut out);
    out
}

/// Decode an inline complex string.
///
/// Returns `None` unless `text` has the inline length, starts with the
/// sentinel, and its remainder is base64 of exactly one `f32` pair. Strings
/// that meet all three conditions are indistinguishable from encoded scalars.
pub fn decode_inline(text: &str) -> Option<Complex32> {
    if text.len() != *INLINE_LEN || !text.starts_with(INLINE_SENTINEL) {
        return None;
    }
    let packed = STANDARD.decode(&text[1..]).ok()?;
    if packed.len() != PAIR_SIZE {
        return None;
    }
    Some(read_pair(&packed))
}

/// Pack array elements as base64 of interleaved `f32` pairs.
pub(crate) fn encode_array_content(data: &[Complex32]) -> String {
    let mut packed = Vec::with_capacity(data.len() * PAIR_SIZE);
    for value in data {
        packed.extend_from_slice(&value.re.to_le_bytes());
        packed.extend_from_slice(&value.im.to_le_bytes());
    }
    STANDARD.encode(packed)
}

/// Rebuild a complex array from its shape and base64 content.
pub(crate) fn decode_array(
    shape: &serde_json::Value,
    content: &serde_json::Value,
) -> Result<NdArray<Complex32>> {
    let shape = parse_shape(shape)?;
    let text = content
        .as_str()
        .ok_or_else(|| CodecError::malformed(NUMPY_COMPLEX, "content must be a base64 string"))?;
    let packed = STANDARD
        .decode(text)
        .map_err(|err| CodecError::malformed(NUMPY_COMPLEX, err.to_string()))?;
    if packed.len() % PAIR_SIZE != 0 {
        return Err(CodecError::malformed(
            NUMPY_COMPLEX,
            format!("{} bytes is not a whole number of f32 pairs", packed.len()),
        ));
    }

    let data = packed.chunks_exact(PAIR_SIZE).map(read_pair).collect();
    NdArray::new(shape, data).map_err(|err| CodecError::malformed(NUMPY_COMPLEX, err.to_string()))
}

fn parse_shape(shape: &serde_json::Value) -> Result<Vec<usize>> {
    let dims = shape
        .as_array()
        .ok_or_else(|| CodecError::malformed(NUMPY_COMPLEX, "_shape must be a sequence"))?;
    dims.iter()
        .map(|dim| {
            dim.as_u64()
                .and_then(|d| usize::try_from(d).ok())
                .ok_or_else(|| {
                    CodecError::malformed(NUMPY_COMPLEX, format!("invalid dimension {dim}"))
                })
        })
        .collect()
}

fn read_pair(bytes: &[u8]) -> Complex32 {
    let mut re = [0u8; 4];
    let mut im = [0u8; 4];
    re.copy_from_slice(&bytes[..4]);
    im.copy_from_slice(&bytes[4..PAIR_SIZE]);
    Complex32::new(f32::from_le_bytes(re), f32::from_le_bytes(im))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_length_is_thirteen() {
        assert_eq!(*INLINE_LEN, 13);
        assert_eq!(encode_inline(Complex32::new(3.0, 4.0)).len(), 13);
    }

    #[test]
    fn inline_roundtrip() {
        let encoded = encode_inline(Complex32::new(3.0, 4.0));
        assert!(encoded.starts_with('c'));
        assert_eq!(decode_inline(&encoded), Some(Complex32::new(3.0, 4.0)));
    }

    #[test]
    fn ordinary_strings_are_not_complex() {
        assert_eq!(decode_inline("hello"), None);
        assert_eq!(decode_inline("cancellations"), None);
        assert_eq!(decode_inline("xAAAAAAAAAAA="), None);
    }

    #[test]
    fn lookalike_string_is_misread() {
        // Documented hazard: right length, sentinel and a valid 8-byte payload.
        assert_eq!(decode_inline("cAAAAAAAAAAA="), Some(Complex32::new(0.0, 0.0)));
    }

    #[test]
    fn array_content_roundtrip() {
        let data = vec![Complex32::new(1.0, -1.0), Complex32::new(0.5, 2.0)];
        let content = serde_json::Value::String(encode_array_content(&data));
        let arr = decode_array(&serde_json::json!([2, 1]), &content).unwrap();
        assert_eq!(arr.shape(), &[2, 1]);
        assert_eq!(arr.data(), data.as_slice());
    }

    #[test]
    fn array_rejects_truncated_payload() {
        let content = serde_json::Value::String(STANDARD.encode([0u8; 6]));
        let err = decode_array(&serde_json::json!([1]), &content).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContent { .. }));
    }

    #[test]
    fn array_rejects_wrong_shape() {
        let content =
            serde_json::Value::String(encode_array_content(&[Complex32::new(1.0, 1.0)]));
        let err = decode_array(&serde_json::json!([2]), &content).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContent { .. }));
    }

    #[test]
    fn array_rejects_negative_dimension() {
        let content = serde_json::Value::String(String::new());
        let err = decode_array(&serde_json::json!([-1]), &content).unwrap_err();
        assert!(matches!(err, CodecError::MalformedContent { .. }));
    }
}
