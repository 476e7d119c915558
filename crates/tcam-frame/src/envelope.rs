//! Checksummed SPI image envelopes (hardware interface).
//!
//! Wire format:
//! ```text
//! ┌──────────┬──────────────────────┬──────────┬──────────────────┐
//! │ STX (1B) │ UTF-8 JSON document  │ ETX (1B) │ Checksum (4B BE) │
//! └──────────┴──────────────────────┴──────────┴──────────────────┘
//! ```
//!
//! The checksum is the sum of every byte preceding the trailer, truncated to
//! 32 bits.

use bytes::{BufMut, BytesMut};
use serde_json::Value;

use crate::codec::{decode_frame, encode_frame};
use crate::error::{FrameError, Result};
use crate::message::{Delivery, Message};

/// Width of the checksum trailer in bytes.
pub const CHECKSUM_LEN: usize = 4;

/// Error text reported for frames whose checksum does not match.
pub const BAD_CHECKSUM: &str = "bad frame checksum";

/// Sum of `bytes`, truncated to the trailer width.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)))
}

/// Verify the trailer of a raw SPI frame and return the bytes it covers.
pub fn open_envelope(raw: &[u8]) -> Result<&[u8]> {
    if raw.len() < CHECKSUM_LEN {
        return Err(FrameError::Truncated {
            len: raw.len(),
            min: CHECKSUM_LEN,
        });
    }

    let (body, trailer) = raw.split_at(raw.len() - CHECKSUM_LEN);
    let mut expected = [0u8; CHECKSUM_LEN];
    expected.copy_from_slice(trailer);
    let expected = u32::from_be_bytes(expected);
    let computed = checksum(body);

    if computed != expected {
        return Err(FrameError::Checksum { computed, expected });
    }
    Ok(body)
}

/// Build a raw SPI frame around a JSON payload.
pub fn seal_envelope(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(payload.len() + 2 + CHECKSUM_LEN);
    encode_frame(payload, &mut buf);
    let sum = checksum(&buf);
    buf.put_u32(sum);
    buf.to_vec()
}

/// Decode a raw SPI frame and decide where it goes.
///
/// A verified frame is always an image frame. A frame with a bad checksum is
/// reported on the response side with both sums, and whatever could be
/// recovered from it is attached under `frame` (parsed) or `payload` (text).
pub fn decode_spi_frame(raw: &[u8]) -> Delivery {
    match open_envelope(raw) {
        Ok(body) => match decode_frame(body) {
            Ok(frame) => Delivery::Frame(frame),
            Err(err) => {
                tracing::warn!(error = %err, len = raw.len(), "undecodable spi frame");
                Delivery::Response(Message::malformed(body))
            }
        },
        Err(FrameError::Checksum { computed, expected }) => {
            tracing::warn!(computed, expected, len = raw.len(), "spi frame checksum mismatch");
            let body = &raw[..raw.len() - CHECKSUM_LEN];
            let report = Message::error_message(BAD_CHECKSUM)
                .with("computed", computed)
                .with("expected", expected);
            let report = match decode_frame(body) {
                Ok(frame) => report.with("frame", Value::from(frame)),
                Err(_) => report.with("payload", String::from_utf8_lossy(body)),
            };
            Delivery::Response(report)
        }
        Err(err) => Delivery::Response(
            Message::error_message(format!("bad spi frame: {err}")).with("length", raw.len()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const IMAGE: &[u8] = br#"{"radiometric":"AQACAA==","telemetry":"AAA="}"#;

    #[test]
    fn checksum_wraps_at_trailer_width() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        let big = vec![0xFF; 20_000_000];
        let expected = (20_000_000u64 * 0xFF % (1u64 << 32)) as u32;
        assert_eq!(checksum(&big), expected);
    }

    #[test]
    fn sealed_frame_opens_and_routes_to_frames() {
        let raw = seal_envelope(IMAGE);
        let delivery = decode_spi_frame(&raw);

        assert!(delivery.is_frame());
        assert_eq!(delivery.message().get("telemetry"), Some(&json!("AAA=")));
    }

    #[test]
    fn match_iff_sum_equals_trailer() {
        let body = b"\x02{\"x\":1}\x03".to_vec();
        let sum = checksum(&body);

        let mut good = body.clone();
        good.extend_from_slice(&sum.to_be_bytes());
        assert!(open_envelope(&good).is_ok());

        let mut bad = body.clone();
        bad.extend_from_slice(&sum.wrapping_add(1).to_be_bytes());
        let err = open_envelope(&bad).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Checksum { computed, expected } if computed == sum && expected == sum + 1
        ));
    }

    #[test]
    fn mismatch_reports_both_sums_and_keeps_payload() {
        let mut raw = seal_envelope(IMAGE);
        let last = raw.len() - 1;
        raw[last] ^= 0x01;

        let delivery = decode_spi_frame(&raw);
        let Delivery::Response(report) = delivery else {
            panic!("corrupt frame must not reach the frame queue");
        };

        let computed = checksum(&raw[..raw.len() - CHECKSUM_LEN]);
        assert_eq!(report.error(), Some(BAD_CHECKSUM));
        assert_eq!(report.get("computed"), Some(&json!(computed)));
        assert_eq!(report.get("expected"), Some(&json!(computed ^ 0x01)));
        assert_eq!(report["frame"]["radiometric"], json!("AQACAA=="));
    }

    #[test]
    fn corrupt_body_falls_back_to_text_payload() {
        let mut raw = seal_envelope(b"{\"a\":1}");
        raw[1] = b'!';

        let Delivery::Response(report) = decode_spi_frame(&raw) else {
            panic!("corrupt frame must not reach the frame queue");
        };
        assert!(report.get("frame").is_none());
        assert!(report["payload"].as_str().unwrap().contains('!'));
    }

    #[test]
    fn verified_but_malformed_payload_is_a_response() {
        let raw = seal_envelope(b"not-json");
        let delivery = decode_spi_frame(&raw);
        assert!(!delivery.is_frame());
        assert!(delivery.message().is_error());
    }

    #[test]
    fn truncated_frame_is_reported() {
        let delivery = decode_spi_frame(&[0x02, 0x03]);
        let message = delivery.into_message();
        assert!(message.error().unwrap().starts_with("bad spi frame"));
        assert_eq!(message.get("length"), Some(&json!(2)));
    }
}
