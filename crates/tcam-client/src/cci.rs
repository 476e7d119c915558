//! Lepton CCI register access.
//!
//! `get_lep_cci` replies with `{"cci_reg": {"command", "length", "status",
//! "data"}}` where `data` is base64 of little-endian words. `set_lep_cci`
//! sends the same shape without `status`.

use serde::{Deserialize, Serialize};
use tcam_frame::Message;

use crate::words::{decode_words, encode_words, WordError};

/// Key of the register block in a `get_lep_cci` reply.
pub const CCI_REG_KEY: &str = "cci_reg";

/// RAD spotmeter region of interest, get form. Four words: r1, c1, r2, c2.
pub const RAD_SPOTMETER_ROI_GET: u16 = 0x4ECC;

/// RAD spotmeter region of interest, set form.
pub const RAD_SPOTMETER_ROI_SET: u16 = 0x4ECD;

/// Bit that marks OEM and RAD module commands.
pub const COMMAND_OEM_MASK: u16 = 0x4000;

/// RAD T-Linear resolution (one word: 0 = 0.1 K, 1 = 0.01 K).
pub const RAD_TLINEAR_RESOLUTION: u16 = 0x0EC4;

/// RAD spotmeter statistics (mean, max, min, population).
pub const RAD_SPOTMETER_VALUE: u16 = 0x0ED0;

/// Word count read when no length is given.
pub const DEFAULT_LENGTH: u16 = 4;

#[derive(Debug, thiserror::Error)]
pub enum CciError {
    /// A register value does not fit in 16 bits.
    #[error("value {value} at index {index} is outside 0..=65535")]
    OutOfRange { index: usize, value: i64 },

    /// More words than the length field can describe.
    #[error("{0} words exceed the register length field")]
    TooLong(usize),

    /// The reply carried no `cci_reg` block.
    #[error("reply has no cci_reg block")]
    MissingRegister,

    #[error("invalid cci_reg block: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid register data: {0}")]
    Data(#[from] WordError),
}

/// Register contents as reported by the camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CciRegister {
    pub command: u16,
    pub length: u16,
    /// Lepton result code; 0 is success.
    pub status: i32,
    /// Base64 of the little-endian register words.
    pub data: String,
}

impl CciRegister {
    /// Parse the `cci_reg` block of a `get_lep_cci` reply.
    pub fn from_message(message: &Message) -> Result<Self, CciError> {
        let block = message.get(CCI_REG_KEY).ok_or(CciError::MissingRegister)?;
        Ok(serde_json::from_value(block.clone())?)
    }

    pub fn words(&self) -> Result<Vec<u16>, CciError> {
        Ok(decode_words(&self.data)?)
    }

    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Arguments of a `set_lep_cci` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CciWrite {
    pub command: u16,
    pub length: u16,
    pub data: String,
}

impl CciWrite {
    pub fn new(command: u16, words: &[u16]) -> Result<Self, CciError> {
        let length = u16::try_from(words.len()).map_err(|_| CciError::TooLong(words.len()))?;
        Ok(Self {
            command,
            length,
            data: encode_words(words),
        })
    }

    /// Validate caller-supplied values before building the write.
    pub fn from_values(command: u16, values: &[i64]) -> Result<Self, CciError> {
        Self::new(command, &checked_words(values)?)
    }
}

/// Narrow values to register words, rejecting anything outside 0..=65535.
pub fn checked_words(values: &[i64]) -> Result<Vec<u16>, CciError> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            u16::try_from(value).map_err(|_| CciError::OutOfRange { index, value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_register_reply() {
        let reply: Message = serde_json::from_value(json!({
            "cci_reg": {"command": 0x4ECC, "length": 4, "status": 0, "data": "OwBPADwAUAA="}
        }))
        .unwrap();

        let register = CciRegister::from_message(&reply).unwrap();
        assert_eq!(register.command, RAD_SPOTMETER_ROI_GET);
        assert!(register.is_ok());
        assert_eq!(register.words().unwrap(), vec![59, 79, 60, 80]);
    }

    #[test]
    fn reply_without_register_is_rejected() {
        let err = CciRegister::from_message(&Message::status_message("ok")).unwrap_err();
        assert!(matches!(err, CciError::MissingRegister));
    }

    #[test]
    fn write_length_follows_word_count() {
        let write = CciWrite::new(RAD_SPOTMETER_ROI_SET, &[59, 79, 60, 80]).unwrap();
        assert_eq!(write.length, 4);
        assert_eq!(write.data, "OwBPADwAUAA=");
    }

    #[test]
    fn out_of_range_values_fail_before_encoding() {
        let err = CciWrite::from_values(RAD_SPOTMETER_ROI_SET, &[1, 65536]).unwrap_err();
        assert!(matches!(
            err,
            CciError::OutOfRange {
                index: 1,
                value: 65536
            }
        ));
        assert!(matches!(
            checked_words(&[-1]),
            Err(CciError::OutOfRange { index: 0, value: -1 })
        ));
        assert_eq!(checked_words(&[0, 65535]).unwrap(), vec![0, 65535]);
    }

    #[test]
    fn oem_mask_composes_rad_commands() {
        assert_eq!(COMMAND_OEM_MASK | RAD_TLINEAR_RESOLUTION, 0x4EC4);
        assert_eq!(COMMAND_OEM_MASK | RAD_SPOTMETER_VALUE, 0x4ED0);
    }
}
