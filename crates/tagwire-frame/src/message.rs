//! Values over frames: codec on top of the length prefix.

use std::io::{Read, Write};
use std::time::Duration;

use tagwire_codec::{Codec, Value};
use tagwire_transport::WireStream;
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// Encode a value into a frame payload (UTF-8 JSON text).
pub fn encode_message(codec: &Codec, value: &Value) -> Result<Vec<u8>> {
    codec.to_vec(value).map_err(FrameError::Encode)
}

/// Decode a frame payload into a value.
pub fn decode_message(codec: &Codec, payload: &[u8]) -> Result<Value> {
    codec.from_slice(payload).map_err(FrameError::Decode)
}

impl<W: Write> FrameWriter<W> {
    /// Encode `value` and send it as one frame.
    ///
    /// Nothing is written when encoding fails.
    pub fn send_value(&mut self, codec: &Codec, value: &Value) -> Result<()> {
        let payload = encode_message(codec, value)?;
        trace!(len = payload.len(), "sending message");
        self.send(&payload)
    }
}

impl<R: Read> FrameReader<R> {
    /// Read the next frame and decode it.
    ///
    /// `Ok(None)` means the peer closed cleanly between messages. A frame
    /// that fails to decode is consumed; the stream stays usable.
    pub fn receive_value(&mut self, codec: &Codec) -> Result<Option<Value>> {
        match self.read_frame()? {
            Some(frame) => {
                trace!(len = frame.payload.len(), "received message");
                decode_message(codec, &frame.payload).map(Some)
            }
            None => Ok(None),
        }
    }
}

impl FrameReader<WireStream> {
    /// [`FrameReader::receive_value`] bounded by a read timeout.
    pub fn receive_value_timeout(
        &mut self,
        codec: &Codec,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>> {
        match self.read_frame_timeout(timeout)? {
            Some(frame) => decode_message(codec, &frame.payload).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use tagwire_codec::CodecError;

    use super::*;
    use crate::codec::encode_frame;

    #[test]
    fn value_survives_frames() {
        let codec = Codec::new();
        let value = Value::object([
            ("blob", Value::bytes(vec![0xff, 0x00])),
            ("n", Value::from(7)),
        ]);

        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_value(&codec, &value).unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = FrameReader::new(Cursor::new(wire));
        assert_eq!(reader.receive_value(&codec).unwrap(), Some(value));
        assert_eq!(reader.receive_value(&codec).unwrap(), None);
    }

    #[test]
    fn payload_is_json_text() {
        let codec = Codec::new();
        let payload = encode_message(&codec, &Value::bytes(b"hi".to_vec())).unwrap();
        let text = std::str::from_utf8(&payload).unwrap();
        let tree: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(tree, serde_json::json!({"_decode_type": "bytes", "_content": "6869"}));
    }

    #[test]
    fn encode_failure_writes_nothing() {
        let codec = Codec::new();
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let err = writer.send_value(&codec, &Value::Float(f64::NAN)).unwrap_err();
        assert!(matches!(err, FrameError::Encode(CodecError::UnencodableValue(_))));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn bad_payload_is_decode_error_and_stream_continues() {
        let codec = Codec::new();
        let mut wire = BytesMut::new();
        encode_frame(br#"{"_decode_type":"mystery","_content":1}"#, &mut wire).unwrap();
        encode_frame(b"not json", &mut wire).unwrap();
        encode_frame(b"[1,2]", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        assert!(matches!(
            reader.receive_value(&codec),
            Err(FrameError::Decode(CodecError::UnknownDecodeKind(_)))
        ));
        assert!(matches!(
            reader.receive_value(&codec),
            Err(FrameError::Decode(CodecError::Json(_)))
        ));
        assert_eq!(
            reader.receive_value(&codec).unwrap(),
            Some(Value::Array(vec![Value::from(1), Value::from(2)]))
        );
    }

    #[test]
    fn invalid_utf8_payload_is_decode_error() {
        let codec = Codec::new();
        let mut wire = BytesMut::new();
        encode_frame(&[0x22, 0xff, 0xfe, 0x22], &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        assert!(matches!(reader.receive_value(&codec), Err(FrameError::Decode(_))));
    }
}
