use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;

use crate::error::{FrameError, Result};
use crate::message::Message;

/// Start-of-frame control byte.
pub const STX: u8 = 0x02;

/// End-of-frame control byte. Frame boundaries are located by this byte alone.
pub const ETX: u8 = 0x03;

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────────┬──────────┐
/// │ STX (1B) │ UTF-8 JSON document  │ ETX (1B) │
/// │ 0x02     │ (no escaping)        │ 0x03     │
/// └──────────┴──────────────────────┴──────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 2);
    dst.put_u8(STX);
    dst.put_slice(payload);
    dst.put_u8(ETX);
}

/// Serialize `value` as JSON and append it to `dst` as one frame.
pub fn encode_json<T: Serialize + ?Sized>(value: &T, dst: &mut BytesMut) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    encode_frame(&payload, dst);
    Ok(())
}

/// Split every complete frame off the front of `src`.
///
/// Frames are returned in the order their terminators appear, each including
/// its delimiters. Bytes after the last ETX stay in `src` for the next read.
pub fn split_frames(src: &mut BytesMut) -> Vec<Bytes> {
    let mut frames = Vec::new();
    while let Some(idx) = src.iter().position(|&b| b == ETX) {
        frames.push(src.split_to(idx + 1).freeze());
    }
    frames
}

/// Decode one complete frame into a JSON object.
pub fn decode_frame(frame: &[u8]) -> Result<Message> {
    let text = std::str::from_utf8(strip_control(frame))?;
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(Message::from(map)),
        _ => Err(FrameError::NotAnObject),
    }
}

/// Extract and decode every complete frame buffered in `src`.
///
/// Frames that fail to decode become `{"error": "malformed json payload",
/// "payload": <frame text>}` messages in their original position.
pub fn extract_messages(src: &mut BytesMut) -> Vec<Message> {
    split_frames(src)
        .into_iter()
        .map(|frame| match decode_frame(&frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, len = frame.len(), "undecodable frame");
                Message::malformed(&frame)
            }
        })
        .collect()
}

fn strip_control(frame: &[u8]) -> &[u8] {
    let is_control = |b: &u8| *b == STX || *b == ETX;
    let start = frame
        .iter()
        .position(|b| !is_control(b))
        .unwrap_or(frame.len());
    let end = frame
        .iter()
        .rposition(|b| !is_control(b))
        .map_or(start, |i| i + 1);
    &frame[start..end]
}
