//! Base64 transport of little-endian 16-bit word arrays.
//!
//! Register data, radiometric pixels and telemetry all travel this way.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

#[derive(Debug, thiserror::Error)]
pub enum WordError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("{0} bytes is not a whole number of 16-bit words")]
    OddLength(usize),
}

/// Encode words as base64 of their little-endian bytes.
pub fn encode_words(words: &[u16]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

/// Decode base64 text into little-endian words.
pub fn decode_words(text: &str) -> Result<Vec<u16>, WordError> {
    let bytes = STANDARD.decode(text)?;
    if bytes.len() % 2 != 0 {
        return Err(WordError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
