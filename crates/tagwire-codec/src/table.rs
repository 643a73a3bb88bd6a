//! Datasets and series.
//!
//! A dataset's content maps each column name either to the full column or,
//! when every cell holds the same value, to that single value. Decoding
//! broadcasts such scalars back to the row count. A dataset whose columns are
//! all constant therefore comes back with a single row.

use crate::codec::Codec;
use crate::error::{CodecError, Result};
use crate::kind::{DATA_FRAME, SERIES};
use crate::value::{DataFrame, Series, Value};

pub(crate) fn encode_data_frame(codec: &Codec, frame: &DataFrame) -> Result<serde_json::Value> {
    if !frame.is_rectangular() {
        return Err(CodecError::UnencodableValue(
            "dataset columns have unequal lengths".to_string(),
        ));
    }

    let mut content = serde_json::Map::with_capacity(frame.columns().len());
    for column in frame.columns() {
        let entry = match fold_constant(codec, &column.values)? {
            Some(scalar) => scalar,
            None => serde_json::Value::Array(
                column
                    .values
                    .iter()
                    .map(|v| codec.encode(v))
                    .collect::<Result<_>>()?,
            ),
        };
        content.insert(column.name.clone(), entry);
    }
    Ok(serde_json::Value::Object(content))
}

/// The encoded scalar for a constant column, if it can be folded.
///
/// Sequences are never folded: a folded sequence would read back as a column.
fn fold_constant(codec: &Codec, values: &[Value]) -> Result<Option<serde_json::Value>> {
    let Some((first, rest)) = values.split_first() else {
        return Ok(None);
    };
    if !rest.iter().all(|v| v == first) {
        return Ok(None);
    }
    let encoded = codec.encode(first)?;
    if encoded.is_array() {
        return Ok(None);
    }
    Ok(Some(encoded))
}

pub(crate) fn decode_data_frame(codec: &Codec, content: serde_json::Value) -> Result<DataFrame> {
    let serde_json::Value::Object(entries) = content else {
        return Err(CodecError::malformed(DATA_FRAME, "content must be a mapping"));
    };

    enum Entry {
        Column(Vec<Value>),
        Scalar(Value),
    }

    let mut decoded = Vec::with_capacity(entries.len());
    let mut rows: Option<usize> = None;
    for (name, entry) in entries {
        let entry = match entry {
            serde_json::Value::Array(cells) => {
                let values = cells
                    .into_iter()
                    .map(|cell| codec.decode(cell))
                    .collect::<Result<Vec<_>>>()?;
                match rows {
                    Some(n) if n != values.len() => {
                        return Err(CodecError::malformed(
                            DATA_FRAME,
                            format!(
                                "column '{name}' has {} rows, expected {n}",
                                values.len()
                            ),
                        ));
                    }
                    _ => rows = Some(values.len()),
                }
                Entry::Column(values)
            }
            scalar => Entry::Scalar(codec.decode(scalar)?),
        };
        decoded.push((name, entry));
    }

    let rows = rows.unwrap_or(1);
    let mut frame = DataFrame::new();
    for (name, entry) in decoded {
        match entry {
            Entry::Column(values) => frame.insert(name, values),
            Entry::Scalar(value) => frame.insert(name, std::iter::repeat_n(value, rows)),
        }
    }
    Ok(frame)
}

pub(crate) fn encode_series(codec: &Codec, series: &Series) -> Result<serde_json::Value> {
    let mut content = serde_json::Map::with_capacity(series.len());
    for (label, value) in series.iter() {
        content.insert(label.to_string(), codec.encode(value)?);
    }
    Ok(serde_json::Value::Object(content))
}

pub(crate) fn decode_series(codec: &Codec, content: serde_json::Value) -> Result<Series> {
    let serde_json::Value::Object(entries) = content else {
        return Err(CodecError::malformed(SERIES, "content must be a mapping"));
    };
    let mut series = Series::new();
    for (label, value) in entries {
        series.insert(label, codec.decode(value)?);
    }
    Ok(series)
}
