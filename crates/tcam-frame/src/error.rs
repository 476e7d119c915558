/// Errors that can occur while decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame interior is not valid UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The frame interior is not parseable JSON.
    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame parsed as JSON but is not an object.
    #[error("frame payload is not a JSON object")]
    NotAnObject,

    /// An SPI frame is shorter than its fixed envelope.
    #[error("spi frame too short ({len} bytes, need at least {min})")]
    Truncated { len: usize, min: usize },

    /// The SPI frame checksum trailer does not match its contents.
    #[error("checksum mismatch (computed {computed}, expected {expected})")]
    Checksum { computed: u32, expected: u32 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
