//! Wire kinds and reserved wrapper keys.

use crate::value::Value;

/// Reserved key naming the decode kind of a tagged wrapper.
pub const DECODE_TYPE_KEY: &str = "_decode_type";

/// Reserved key holding a tagged wrapper's kind-specific payload.
pub const CONTENT_KEY: &str = "_content";

/// Reserved key holding the shape of a complex array wrapper.
pub const SHAPE_KEY: &str = "_shape";

/// Kind tag for immutable binary blobs.
pub const BYTES: &str = "bytes";

/// Kind tag for mutable binary blobs.
pub const BYTE_ARRAY: &str = "bytearray";

/// Kind tag for complex-valued arrays.
pub const NUMPY_COMPLEX: &str = "numpy_complex";

/// Kind tag for tabular datasets.
pub const DATA_FRAME: &str = "DataFrame";

/// Kind tag for labeled one-dimensional series.
pub const SERIES: &str = "Series";

/// How a value is represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    /// Plain JSON: null, bool, number, string, sequence, mapping.
    Native,
    /// Real array flattened into nested sequences.
    NestedList,
    /// Tagged wrapper, hex content.
    Bytes,
    /// Tagged wrapper, hex content.
    ByteArray,
    /// Sentinel-prefixed base64 string.
    ComplexInline,
    /// Tagged wrapper, shape + base64 content.
    NumpyComplex,
    /// Tagged wrapper, column mapping.
    DataFrame,
    /// Tagged wrapper, label mapping.
    Series,
    /// Tagged wrapper with an application-registered kind.
    Custom,
}

impl WireKind {
    /// Classify the top level of a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null
            | Value::Bool(_)
            | Value::Integer(_)
            | Value::Float(_)
            | Value::String(_)
            | Value::Array(_)
            | Value::Object(_) => WireKind::Native,
            Value::RealArray(_) => WireKind::NestedList,
            Value::Bytes(_) => WireKind::Bytes,
            Value::ByteArray(_) => WireKind::ByteArray,
            Value::Complex(_) => WireKind::ComplexInline,
            Value::ComplexArray(_) => WireKind::NumpyComplex,
            Value::DataFrame(_) => WireKind::DataFrame,
            Value::Series(_) => WireKind::Series,
            Value::Custom(_) => WireKind::Custom,
        }
    }

    /// The `_decode_type` tag of a built-in wrapper kind.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            WireKind::Bytes => Some(BYTES),
            WireKind::ByteArray => Some(BYTE_ARRAY),
            WireKind::NumpyComplex => Some(NUMPY_COMPLEX),
            WireKind::DataFrame => Some(DATA_FRAME),
            WireKind::Series => Some(SERIES),
            WireKind::Native | WireKind::NestedList | WireKind::ComplexInline | WireKind::Custom => {
                None
            }
        }
    }

    /// Look up a built-in wrapper kind by its tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            BYTES => Some(WireKind::Bytes),
            BYTE_ARRAY => Some(WireKind::ByteArray),
            NUMPY_COMPLEX => Some(WireKind::NumpyComplex),
            DATA_FRAME => Some(WireKind::DataFrame),
            SERIES => Some(WireKind::Series),
            _ => None,
        }
    }

    /// Returns true if `tag` is owned by a built-in kind.
    pub fn is_reserved(tag: &str) -> bool {
        Self::from_tag(tag).is_some()
    }
}
