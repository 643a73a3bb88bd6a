//! Extensible value codec over the JSON tree.
//!
//! JSON carries null, booleans, numbers, strings, sequences and string-keyed
//! mappings. Everything else travels as a *tagged wrapper*:
//!
//! ```text
//! {"_decode_type": "<kind>", "_content": <kind-specific payload>}
//! ```
//!
//! | Value                 | Wire form                                              |
//! |-----------------------|--------------------------------------------------------|
//! | `Bytes` / `ByteArray` | wrapper `bytes` / `bytearray`, lowercase hex content   |
//! | `ComplexArray`        | wrapper `numpy_complex`, `_shape` + base64 f32 pairs   |
//! | `RealArray`           | plain nested sequences (shape is not transmitted)      |
//! | `DataFrame`           | wrapper `DataFrame`, column -> scalar or sequence      |
//! | `Series`              | wrapper `Series`, label -> value                       |
//! | `Complex`             | inline string `"c" + base64(re, im as f32)`            |
//! | `Custom`              | wrapper with an application-registered kind            |
//!
//! The keys `_decode_type` and `_content` are reserved: an application
//! mapping that carries both is read back as a wrapper. Likewise any
//! 13-character string starting with `c` whose remainder is valid base64 of
//! eight bytes decodes as a complex number.
//!
//! The inline check is stricter than length plus sentinel alone: a
//! 13-character `c…` string whose remainder is not base64 of exactly one
//! `f32` pair (`"cancellations"`, say) stays a string instead of failing
//! the decode.
//!
//! Two round-trips are lossy. A `RealArray` comes back as plain sequences,
//! and a `DataFrame` whose columns all hold a single repeated value is sent
//! as scalars only and comes back with one row.

pub mod binary;
pub mod codec;
pub mod complex;
pub mod error;
pub mod kind;
pub mod table;
pub mod value;

pub use codec::Codec;
pub use error::{CodecError, Result};
pub use kind::{WireKind, CONTENT_KEY, DECODE_TYPE_KEY, SHAPE_KEY};
pub use num_complex::Complex32;
pub use value::{Column, CustomValue, DataFrame, NdArray, Series, Value};
