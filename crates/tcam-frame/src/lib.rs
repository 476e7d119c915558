//! Message framing for the tCam command protocol.
//!
//! Every JSON message on a camera's control channel is framed as:
//! - A single STX byte (`0x02`)
//! - A UTF-8 JSON object
//! - A single ETX byte (`0x03`)
//!
//! Hardware-interface cameras additionally deliver image payloads over SPI,
//! wrapped in a checksummed envelope (see [`envelope`]).
//!
//! Nothing here performs I/O. Callers own the accumulation buffer and feed it
//! to [`extract_messages`] after every read.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod message;

pub use codec::{
    decode_frame, encode_frame, encode_json, extract_messages, split_frames, ETX, STX,
};
pub use envelope::{
    checksum, decode_spi_frame, open_envelope, seal_envelope, BAD_CHECKSUM, CHECKSUM_LEN,
};
pub use error::{FrameError, Result};
pub use message::{
    Delivery, Message, IMAGE_READY_KEY, MALFORMED_JSON, RADIOMETRIC_KEY, TELEMETRY_KEY,
};
