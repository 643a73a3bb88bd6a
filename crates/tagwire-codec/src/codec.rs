use std::collections::BTreeSet;

use tracing::trace;

use crate::binary::{decode_hex, encode_hex};
use crate::complex::{decode_array, decode_inline, encode_array_content, encode_inline};
use crate::error::{CodecError, Result};
use crate::kind::{WireKind, CONTENT_KEY, DECODE_TYPE_KEY, SHAPE_KEY};
use crate::table::{decode_data_frame, decode_series, encode_data_frame, encode_series};
use crate::value::{element_count, number_value, CustomValue, NdArray, Value};

/// Converts between [`Value`] and the JSON tree.
///
/// The built-in kinds are always available. Applications add their own
/// tagged kinds with [`Codec::register_kind`]; a wrapper naming a kind that
/// is neither built in nor registered fails to decode.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    custom_kinds: BTreeSet<String>,
}

impl Codec {
    /// Codec with only the built-in kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an application kind for decoding.
    pub fn register_kind(&mut self, kind: impl Into<String>) -> Result<()> {
        let kind = kind.into();
        if WireKind::is_reserved(&kind) {
            return Err(CodecError::ReservedKind(kind));
        }
        self.custom_kinds.insert(kind);
        Ok(())
    }

    /// Builder form of [`Codec::register_kind`].
    pub fn with_kind(mut self, kind: impl Into<String>) -> Result<Self> {
        self.register_kind(kind)?;
        Ok(self)
    }

    /// Codec with every kind in `kinds` registered.
    pub fn with_kinds<I, S>(kinds: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut codec = Self::new();
        for kind in kinds {
            codec.register_kind(kind)?;
        }
        Ok(codec)
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.custom_kinds.contains(kind)
    }

    /// Registered application kinds, sorted.
    pub fn custom_kinds(&self) -> impl Iterator<Item = &str> {
        self.custom_kinds.iter().map(String::as_str)
    }

    /// Encode a value into the JSON tree.
    pub fn encode(&self, value: &Value) -> Result<serde_json::Value> {
        let kind = WireKind::of(value);
        match value {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Integer(n) => Ok(serde_json::Value::from(*n)),
            Value::Float(f) => encode_float(*f),
            Value::String(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Array(items) => Ok(serde_json::Value::Array(
                items.iter().map(|v| self.encode(v)).collect::<Result<_>>()?,
            )),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), self.encode(value)?);
                }
                Ok(serde_json::Value::Object(out))
            }
            Value::RealArray(array) => encode_nested(array),
            Value::Bytes(data) | Value::ByteArray(data) => Ok(wrap(kind, encode_hex(data))),
            Value::Complex(c) => Ok(serde_json::Value::String(encode_inline(*c))),
            Value::ComplexArray(array) => {
                let mut wrapper = wrap(
                    kind,
                    serde_json::Value::String(encode_array_content(array.data())),
                );
                if let serde_json::Value::Object(map) = &mut wrapper {
                    map.insert(SHAPE_KEY.to_string(), serde_json::Value::from(array.shape().to_vec()));
                }
                Ok(wrapper)
            }
            Value::DataFrame(frame) => Ok(wrap(kind, encode_data_frame(self, frame)?)),
            Value::Series(series) => Ok(wrap(kind, encode_series(self, series)?)),
            Value::Custom(custom) => self.encode_custom(custom),
        }
    }

    /// Decode a JSON tree, reconstructing wrapped and inline values at any depth.
    pub fn decode(&self, tree: serde_json::Value) -> Result<Value> {
        match tree {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => Ok(number_value(&n)),
            serde_json::Value::String(s) => Ok(match decode_inline(&s) {
                Some(c) => Value::Complex(c),
                None => Value::String(s),
            }),
            serde_json::Value::Array(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| self.decode(item))
                    .collect::<Result<_>>()?,
            )),
            serde_json::Value::Object(map) => {
                if let Some(tag) = wrapper_tag(&map) {
                    trace!(kind = %tag, "decoding tagged wrapper");
                    return self.decode_wrapper(tag, map);
                }
                let mut out = std::collections::BTreeMap::new();
                for (key, value) in map {
                    out.insert(key, self.decode(value)?);
                }
                Ok(Value::Object(out))
            }
        }
    }

    /// Encode a value straight to JSON text bytes.
    pub fn to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        let tree = self.encode(value)?;
        Ok(serde_json::to_vec(&tree)?)
    }

    /// Parse JSON text bytes and decode the result.
    pub fn from_slice(&self, bytes: &[u8]) -> Result<Value> {
        let tree: serde_json::Value = serde_json::from_slice(bytes)?;
        self.decode(tree)
    }

    fn encode_custom(&self, custom: &CustomValue) -> Result<serde_json::Value> {
        if WireKind::is_reserved(&custom.kind) {
            return Err(CodecError::UnencodableValue(format!(
                "custom kind '{}' collides with a built-in kind",
                custom.kind
            )));
        }
        let content = self.encode(&custom.content)?;
        Ok(wrap_tag(&custom.kind, content))
    }

    fn decode_wrapper(
        &self,
        tag: String,
        mut map: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Value> {
        let content = map.remove(CONTENT_KEY).unwrap_or(serde_json::Value::Null);

        match WireKind::from_tag(&tag) {
            Some(WireKind::Bytes) => Ok(Value::Bytes(decode_hex(&tag, &content)?)),
            Some(WireKind::ByteArray) => Ok(Value::ByteArray(decode_hex(&tag, &content)?)),
            Some(WireKind::NumpyComplex) => {
                let shape = map.remove(SHAPE_KEY).unwrap_or(serde_json::Value::Null);
                Ok(Value::ComplexArray(decode_array(&shape, &content)?))
            }
            Some(WireKind::DataFrame) => Ok(Value::DataFrame(decode_data_frame(self, content)?)),
            Some(WireKind::Series) => Ok(Value::Series(decode_series(self, content)?)),
            None if self.is_registered(&tag) => Ok(Value::Custom(CustomValue {
                kind: tag,
                content: Box::new(self.decode(content)?),
            })),
            _ => Err(CodecError::UnknownDecodeKind(tag)),
        }
    }
}

/// A mapping is a wrapper when it has a string kind tag and a content key.
fn wrapper_tag(map: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    if !map.contains_key(CONTENT_KEY) {
        return None;
    }
    match map.get(DECODE_TYPE_KEY) {
        Some(serde_json::Value::String(tag)) => Some(tag.clone()),
        _ => None,
    }
}

fn wrap(kind: WireKind, content: serde_json::Value) -> serde_json::Value {
    wrap_tag(kind.tag().unwrap_or_default(), content)
}

fn wrap_tag(tag: &str, content: serde_json::Value) -> serde_json::Value {
    let mut map = serde_json::Map::with_capacity(3);
    map.insert(
        DECODE_TYPE_KEY.to_string(),
        serde_json::Value::String(tag.to_string()),
    );
    map.insert(CONTENT_KEY.to_string(), content);
    serde_json::Value::Object(map)
}

fn encode_float(f: f64) -> Result<serde_json::Value> {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .ok_or_else(|| CodecError::UnencodableValue(format!("non-finite float {f}")))
}

/// Flatten a real array into nested sequences following its shape.
fn encode_nested(array: &NdArray<f64>) -> Result<serde_json::Value> {
    fn nest(shape: &[usize], data: &[f64]) -> Result<serde_json::Value> {
        match shape.split_first() {
            None => match data.first() {
                Some(f) => encode_float(*f),
                None => Err(CodecError::UnencodableValue(
                    "array has no element for its shape".to_string(),
                )),
            },
            Some((&len, rest)) => {
                let stride = element_count(rest).unwrap_or(0);
                let mut items = Vec::with_capacity(len);
                for i in 0..len {
                    let start = i * stride;
                    let chunk = data.get(start..start + stride).ok_or_else(|| {
                        CodecError::UnencodableValue("array data shorter than its shape".to_string())
                    })?;
                    items.push(nest(rest, chunk)?);
                }
                Ok(serde_json::Value::Array(items))
            }
        }
    }
    nest(array.shape(), array.data())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::complex::INLINE_LEN;
    use crate::value::{DataFrame, Series};
    use crate::Complex32;

    fn roundtrip(codec: &Codec, value: &Value) -> Value {
        let bytes = codec.to_vec(value).unwrap();
        codec.from_slice(&bytes).unwrap()
    }

    #[test]
    fn bytes_inside_object_use_wrapper() {
        let codec = Codec::new();
        let value = Value::object([("a", Value::bytes(vec![0xFF, 0x00]))]);

        let tree = codec.encode(&value).unwrap();
        assert_eq!(
            tree,
            json!({"a": {"_decode_type": "bytes", "_content": "ff00"}})
        );
        assert_eq!(codec.decode(tree).unwrap(), value);
    }

    #[test]
    fn byte_array_keeps_its_kind() {
        let codec = Codec::new();
        let value = Value::byte_array(b"\x01\x02".to_vec());
        let tree = codec.encode(&value).unwrap();
        assert_eq!(tree[DECODE_TYPE_KEY], "bytearray");
        assert_eq!(codec.decode(tree).unwrap(), value);
    }

    #[test]
    fn complex_scalar_is_inline_string() {
        let codec = Codec::new();
        let value = Value::Complex(Complex32::new(3.0, 4.0));
        let tree = codec.encode(&value).unwrap();

        let text = tree.as_str().unwrap();
        assert_eq!(text.len(), *INLINE_LEN);
        assert!(text.starts_with('c'));
        assert_eq!(codec.decode(tree).unwrap(), value);
    }

    #[test]
    fn sentinel_string_without_f32_pair_stays_text() {
        let codec = Codec::new();
        let tree = json!(["cancellations", "c!!!!!!!!!!!!"]);
        assert_eq!(
            codec.decode(tree).unwrap(),
            Value::Array(vec![Value::from("cancellations"), Value::from("c!!!!!!!!!!!!")])
        );
    }

    #[test]
    fn complex_array_roundtrip_keeps_shape() {
        let codec = Codec::new();
        let array = NdArray::new(
            vec![2, 2],
            vec![
                Complex32::new(1.0, 0.0),
                Complex32::new(0.0, 1.0),
                Complex32::new(-1.5, 2.25),
                Complex32::new(0.0, 0.0),
            ],
        )
        .unwrap();
        let value = Value::ComplexArray(array);

        let tree = codec.encode(&value).unwrap();
        assert_eq!(tree[DECODE_TYPE_KEY], "numpy_complex");
        assert_eq!(tree[SHAPE_KEY], json!([2, 2]));
        assert_eq!(roundtrip(&codec, &value), value);
    }

    #[test]
    fn real_array_becomes_nested_sequences() {
        let codec = Codec::new();
        let array = NdArray::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.5]).unwrap();
        let tree = codec.encode(&Value::RealArray(array)).unwrap();
        assert_eq!(tree, json!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.5]]));

        // Shape is not transmitted: the decoded form is plain nesting.
        let decoded = codec.decode(tree).unwrap();
        let rows = decoded.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].as_array().unwrap()[2], Value::Float(6.5));
    }

    #[test]
    fn zero_dimensional_real_array_is_scalar() {
        let codec = Codec::new();
        let array = NdArray::new(vec![], vec![2.5]).unwrap();
        assert_eq!(codec.encode(&Value::RealArray(array)).unwrap(), json!(2.5));
    }

    #[test]
    fn data_frame_and_series_roundtrip() {
        let codec = Codec::new();
        let frame = DataFrame::new()
            .with_column("t", [0.0, 0.5, 1.0])
            .with_column("sensor", ["a", "a", "a"])
            .with_column("raw", [Value::bytes(vec![1u8]), Value::bytes(vec![2u8]), Value::bytes(vec![3u8])]);
        let series = Series::new().with("x", 1).with("y", Value::Complex(Complex32::new(0.0, -1.0)));
        let value = Value::Array(vec![Value::DataFrame(frame), Value::Series(series)]);

        assert_eq!(roundtrip(&codec, &value), value);
    }

    #[test]
    fn nested_wrappers_decode_at_depth() {
        let codec = Codec::new();
        let tree = json!({
            "outer": [
                {"inner": {"_decode_type": "bytes", "_content": "0a0b"}},
                "plain"
            ]
        });
        let value = codec.decode(tree).unwrap();
        let inner = value.get("outer").unwrap().as_array().unwrap()[0]
            .get("inner")
            .unwrap();
        assert_eq!(inner, &Value::bytes(vec![0x0a, 0x0b]));
    }

    #[test]
    fn unknown_kind_fails() {
        let codec = Codec::new();
        let err = codec
            .decode(json!({"_decode_type": "Mystery", "_content": 1}))
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownDecodeKind(ref k) if k == "Mystery"));
    }

    #[test]
    fn partial_wrapper_keys_pass_through() {
        let codec = Codec::new();
        let tree = json!({"_decode_type": "bytes", "other": 1});
        let value = codec.decode(tree).unwrap();
        assert_eq!(value.get("_decode_type"), Some(&Value::from("bytes")));

        let tree = json!({"_decode_type": 7, "_content": "ff"});
        assert!(matches!(codec.decode(tree).unwrap(), Value::Object(_)));
    }

    #[test]
    fn non_finite_float_is_unencodable() {
        let codec = Codec::new();
        let err = codec
            .encode(&Value::Array(vec![Value::Float(f64::NAN)]))
            .unwrap_err();
        assert!(matches!(err, CodecError::UnencodableValue(_)));

        let array = NdArray::from_vec(vec![1.0, f64::INFINITY]);
        assert!(codec.encode(&Value::RealArray(array)).is_err());
    }

    #[test]
    fn custom_kind_requires_registration() {
        let value = Value::custom("Point", Value::object([("x", 1), ("y", 2)]));

        let plain = Codec::new();
        let tree = plain.encode(&value).unwrap();
        assert_eq!(tree[DECODE_TYPE_KEY], "Point");
        assert!(matches!(
            plain.decode(tree.clone()),
            Err(CodecError::UnknownDecodeKind(_))
        ));

        let codec = Codec::new().with_kind("Point").unwrap();
        assert_eq!(codec.decode(tree).unwrap(), value);
    }

    #[test]
    fn builtin_kind_cannot_be_registered() {
        let err = Codec::new().with_kind("bytes").unwrap_err();
        assert!(matches!(err, CodecError::ReservedKind(_)));
        assert!(Codec::with_kinds(["A", "B"]).unwrap().is_registered("B"));
    }

    #[test]
    fn custom_value_with_reserved_kind_is_unencodable() {
        let codec = Codec::new();
        let err = codec.encode(&Value::custom("Series", 1)).unwrap_err();
        assert!(matches!(err, CodecError::UnencodableValue(_)));
    }

    #[test]
    fn malformed_json_text_is_an_error() {
        let codec = Codec::new();
        assert!(matches!(codec.from_slice(b"{not json"), Err(CodecError::Json(_))));
    }

    #[test]
    fn native_values_roundtrip_unchanged() {
        let codec = Codec::new();
        let value = Value::from(json!({
            "name": "sensor",
            "ok": true,
            "n": -3,
            "ratio": 0.25,
            "tags": ["x", "y"],
            "none": null
        }));
        assert_eq!(roundtrip(&codec, &value), value);
    }
}
