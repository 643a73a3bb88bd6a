use std::collections::BTreeMap;

use num_complex::Complex32;

use crate::error::{CodecError, Result};

/// An application value that can cross the wire.
///
/// The first seven variants map directly onto JSON. The rest are carried
/// through tagged wrappers or the inline complex encoding; see the crate docs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// Immutable binary blob.
    Bytes(Vec<u8>),
    /// Mutable binary blob. Same payload as `Bytes`, distinct tag.
    ByteArray(Vec<u8>),
    /// Single complex scalar.
    Complex(Complex32),
    /// Real-valued N-dimensional array. Travels as nested sequences.
    RealArray(NdArray<f64>),
    /// Complex-valued N-dimensional array.
    ComplexArray(NdArray<Complex32>),
    /// Named columns of equal length.
    DataFrame(DataFrame),
    /// Labeled one-dimensional data.
    Series(Series),
    /// Application-defined kind; see [`crate::Codec::register_kind`].
    Custom(CustomValue),
}

impl Value {
    /// Immutable binary blob.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(data.into())
    }

    /// Mutable binary blob.
    pub fn byte_array(data: impl Into<Vec<u8>>) -> Self {
        Value::ByteArray(data.into())
    }

    /// Application-defined tagged value.
    pub fn custom(kind: impl Into<String>, content: impl Into<Value>) -> Self {
        Value::Custom(CustomValue {
            kind: kind.into(),
            content: Box::new(content.into()),
        })
    }

    /// Build an object from key/value pairs. Later duplicates win.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Payload of either binary variant.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) | Value::ByteArray(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Member lookup on objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Complex32> for Value {
    fn from(v: Complex32) -> Self {
        Value::Complex(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Object(v)
    }
}

impl From<NdArray<f64>> for Value {
    fn from(v: NdArray<f64>) -> Self {
        Value::RealArray(v)
    }
}

impl From<NdArray<Complex32>> for Value {
    fn from(v: NdArray<Complex32>) -> Self {
        Value::ComplexArray(v)
    }
}

impl From<DataFrame> for Value {
    fn from(v: DataFrame) -> Self {
        Value::DataFrame(v)
    }
}

impl From<Series> for Value {
    fn from(v: Series) -> Self {
        Value::Series(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Native JSON converts without any wrapper interpretation.
///
/// Integers that fit `i64` stay integers; every other number becomes `Float`.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => number_value(&n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

pub(crate) fn number_value(n: &serde_json::Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Integer(i),
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

/// Row-major N-dimensional array.
///
/// A zero-dimensional array (empty shape) holds exactly one element.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> NdArray<T> {
    /// Build an array, checking that the shape matches the element count.
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected = element_count(&shape);
        if expected != Some(data.len()) {
            return Err(CodecError::ShapeMismatch {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array over `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Elements in row-major order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<T>) {
        (self.shape, self.data)
    }
}

/// Product of the dimensions, or `None` on overflow.
pub(crate) fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

/// A named dataset column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// Tabular dataset: named columns of equal length, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFrame {
    columns: Vec<Column>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`DataFrame::insert`].
    pub fn with_column<V: Into<Value>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.insert(name, values);
        self
    }

    /// Add a column, replacing any existing column with the same name.
    pub fn insert<V: Into<Value>>(
        &mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) {
        let name = name.into();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Number of rows (length of the first column; 0 when empty).
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Returns true if every column has the same length.
    pub fn is_rectangular(&self) -> bool {
        let rows = self.row_count();
        self.columns.iter().all(|c| c.values.len() == rows)
    }
}

/// Labeled one-dimensional data, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    entries: Vec<(String, Value)>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Series::insert`].
    pub fn with(mut self, label: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(label, value);
        self
    }

    /// Set the value for `label`, keeping its original position if present.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<Value>) {
        let label = label.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Value of an application-registered wire kind.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomValue {
    pub kind: String,
    pub content: Box<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndarray_rejects_shape_mismatch() {
        let err = NdArray::new(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, CodecError::ShapeMismatch { len: 5, .. }));
    }

    #[test]
    fn zero_dimensional_array_holds_one_element() {
        let arr = NdArray::new(vec![], vec![7.0]).unwrap();
        assert_eq!(arr.ndim(), 0);
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn ndarray_with_zero_dimension_is_empty() {
        let arr = NdArray::<f64>::new(vec![3, 0], vec![]).unwrap();
        assert!(arr.is_empty());
    }

    #[test]
    fn dataframe_insert_replaces_column() {
        let mut df = DataFrame::new().with_column("a", [1, 2]).with_column("b", [3, 4]);
        df.insert("a", [9, 9]);
        assert_eq!(df.columns().len(), 2);
        assert_eq!(df.columns()[0].name, "a");
        assert_eq!(df.column("a"), Some(&[Value::Integer(9), Value::Integer(9)][..]));
        assert!(df.is_rectangular());
    }

    #[test]
    fn ragged_dataframe_is_not_rectangular() {
        let df = DataFrame::new().with_column("a", [1, 2]).with_column("b", [3]);
        assert!(!df.is_rectangular());
    }

    #[test]
    fn series_keeps_first_position_on_update() {
        let mut s = Series::new().with("x", 1).with("y", 2);
        s.insert("x", 10);
        let labels: Vec<&str> = s.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, ["x", "y"]);
        assert_eq!(s.get("x"), Some(&Value::Integer(10)));
    }

    #[test]
    fn from_json_keeps_integers_and_floats_apart() {
        let v = Value::from(serde_json::json!({"i": 3, "f": 1.5, "big": 18446744073709551615u64}));
        assert_eq!(v.get("i"), Some(&Value::Integer(3)));
        assert_eq!(v.get("f"), Some(&Value::Float(1.5)));
        assert!(matches!(v.get("big"), Some(Value::Float(_))));
    }

    #[test]
    fn accessors() {
        let v = Value::object([("name", Value::from("x")), ("raw", Value::bytes(*b"ab"))]);
        assert_eq!(v.get("name").and_then(Value::as_str), Some("x"));
        assert_eq!(v.get("raw").and_then(Value::as_bytes), Some(&b"ab"[..]));
        assert_eq!(Value::from(Some(2)).as_i64(), Some(2));
        assert!(Value::from(None::<i64>).is_null());
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
    }
}
