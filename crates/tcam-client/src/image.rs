//! Radiometric image and telemetry decoding.

use tcam_frame::{Message, RADIOMETRIC_KEY, TELEMETRY_KEY};

use crate::words::{decode_words, WordError};

/// Lepton 3.5 frame width in pixels.
pub const WIDTH: usize = 160;

/// Lepton 3.5 frame height in pixels.
pub const HEIGHT: usize = 120;

/// Words per telemetry row.
pub const TELEMETRY_ROW_WORDS: usize = 80;

/// Telemetry rows A, B and C.
pub const TELEMETRY_WORDS: usize = 3 * TELEMETRY_ROW_WORDS;

const ROW_A: usize = 0;
const ROW_B: usize = TELEMETRY_ROW_WORDS;
const ROW_C: usize = 2 * TELEMETRY_ROW_WORDS;

const FPA_TEMP: usize = ROW_A + 24;
const HOUSING_TEMP: usize = ROW_A + 26;
const EMISSIVITY: usize = ROW_B + 19;
const GAIN_MODE: usize = ROW_C + 5;
const EFFECTIVE_GAIN_MODE: usize = ROW_C + 6;
const TLINEAR_ENABLE: usize = ROW_C + 48;
const TLINEAR_RESOLUTION: usize = ROW_C + 49;
const SPOTMETER_MEAN: usize = ROW_C + 50;

const EMISSIVITY_SCALE: f64 = 8192.0;
const ZERO_CELSIUS_K: f64 = 273.15;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// The frame message lacks a required field.
    #[error("frame has no {0} field")]
    Missing(&'static str),

    /// A field is present but is not base64 text.
    #[error("{0} field is not a string")]
    NotText(&'static str),

    #[error("invalid {field} data: {source}")]
    Data {
        field: &'static str,
        source: WordError,
    },

    #[error("{field} holds {actual} words, expected {expected}")]
    Size {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The camera sent an error in place of a frame.
    #[error("camera reported: {0}")]
    Device(String),
}

/// One decoded camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalImage {
    pixels: Vec<u16>,
    telemetry: Option<Telemetry>,
}

impl ThermalImage {
    /// Decode the `radiometric` and optional `telemetry` fields of a frame.
    pub fn from_message(message: &Message) -> Result<Self, ImageError> {
        if let Some(error) = message.error() {
            return Err(ImageError::Device(error.to_string()));
        }
        let pixels = field_words(message, RADIOMETRIC_KEY, WIDTH * HEIGHT)?
            .ok_or(ImageError::Missing(RADIOMETRIC_KEY))?;
        let telemetry = field_words(message, TELEMETRY_KEY, TELEMETRY_WORDS)?
            .map(|words| Telemetry { words });
        Ok(Self { pixels, telemetry })
    }

    /// Row-major pixel values. In T-Linear mode each is Kelvin scaled by the
    /// T-Linear resolution.
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixel(&self, row: usize, col: usize) -> Option<u16> {
        if row >= HEIGHT || col >= WIDTH {
            return None;
        }
        self.pixels.get(row * WIDTH + col).copied()
    }

    /// Smallest and largest pixel value.
    pub fn min_max(&self) -> (u16, u16) {
        self.pixels
            .iter()
            .fold((u16::MAX, u16::MIN), |(lo, hi), &p| (lo.min(p), hi.max(p)))
    }

    pub fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_ref()
    }

    /// Pixel value in Celsius, using the frame's T-Linear resolution.
    pub fn pixel_celsius(&self, row: usize, col: usize) -> Option<f64> {
        let resolution = self.telemetry.as_ref()?.tlinear_resolution();
        self.pixel(row, col)
            .map(|raw| scaled_kelvin_to_celsius(raw, resolution))
    }
}

/// Lepton gain mode as reported in telemetry row C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainMode {
    High,
    Low,
    Auto,
    Unknown(u16),
}

impl From<u16> for GainMode {
    fn from(raw: u16) -> Self {
        match raw {
            0 => Self::High,
            1 => Self::Low,
            2 => Self::Auto,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for GainMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => f.write_str("high"),
            Self::Low => f.write_str("low"),
            Self::Auto => f.write_str("auto"),
            Self::Unknown(raw) => write!(f, "unknown ({raw})"),
        }
    }
}

/// The 240-word Lepton telemetry block (rows A, B, C).
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    words: Vec<u16>,
}

impl Telemetry {
    pub fn from_words(words: Vec<u16>) -> Result<Self, ImageError> {
        if words.len() != TELEMETRY_WORDS {
            return Err(ImageError::Size {
                field: TELEMETRY_KEY,
                expected: TELEMETRY_WORDS,
                actual: words.len(),
            });
        }
        Ok(Self { words })
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn fpa_temp_celsius(&self) -> f64 {
        centikelvin_to_celsius(self.words[FPA_TEMP])
    }

    pub fn housing_temp_celsius(&self) -> f64 {
        centikelvin_to_celsius(self.words[HOUSING_TEMP])
    }

    pub fn emissivity(&self) -> f64 {
        f64::from(self.words[EMISSIVITY]) / EMISSIVITY_SCALE
    }

    pub fn gain_mode(&self) -> GainMode {
        self.words[GAIN_MODE].into()
    }

    pub fn effective_gain_mode(&self) -> GainMode {
        self.words[EFFECTIVE_GAIN_MODE].into()
    }

    pub fn tlinear_enabled(&self) -> bool {
        self.words[TLINEAR_ENABLE] != 0
    }

    /// Kelvin per count: 0.1 or 0.01.
    pub fn tlinear_resolution(&self) -> f64 {
        tlinear_resolution(self.words[TLINEAR_RESOLUTION])
    }

    pub fn spotmeter_celsius(&self) -> f64 {
        scaled_kelvin_to_celsius(self.words[SPOTMETER_MEAN], self.tlinear_resolution())
    }
}

/// Map the T-Linear resolution flag to Kelvin per count.
pub fn tlinear_resolution(flag: u16) -> f64 {
    if flag == 0 {
        0.1
    } else {
        0.01
    }
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - ZERO_CELSIUS_K
}

/// Convert a reading in Kelvin x 100.
pub fn centikelvin_to_celsius(raw: u16) -> f64 {
    kelvin_to_celsius(f64::from(raw) / 100.0)
}

/// Convert a T-Linear count at the given resolution.
pub fn scaled_kelvin_to_celsius(raw: u16, resolution: f64) -> f64 {
    kelvin_to_celsius(f64::from(raw) * resolution)
}

fn field_words(
    message: &Message,
    field: &'static str,
    expected: usize,
) -> Result<Option<Vec<u16>>, ImageError> {
    let Some(value) = message.get(field) else {
        return Ok(None);
    };
    let text = value.as_str().ok_or(ImageError::NotText(field))?;
    let words = decode_words(text).map_err(|source| ImageError::Data { field, source })?;
    if words.len() != expected {
        return Err(ImageError::Size {
            field,
            expected,
            actual: words.len(),
        });
    }
    Ok(Some(words))
}

#[cfg(test)]
mod tests {
    use crate::words::encode_words;

    use super::*;

    fn telemetry_words() -> Vec<u16> {
        let mut words = vec![0u16; TELEMETRY_WORDS];
        words[24] = 30_315; // 30.0 C
        words[26] = 29_815; // 25.0 C
        words[99] = 8_028; // 0.98
        words[165] = 2;
        words[166] = 0;
        words[208] = 1;
        words[209] = 1;
        words[210] = 31_015; // 37.0 C at 0.01 K
        words
    }

    fn frame(pixels: &[u16], telemetry: Option<&[u16]>) -> Message {
        let message = Message::new().with(RADIOMETRIC_KEY, encode_words(pixels));
        match telemetry {
            Some(words) => message.with(TELEMETRY_KEY, encode_words(words)),
            None => message,
        }
    }

    #[test]
    fn decodes_full_frame() {
        let mut pixels = vec![29_315u16; WIDTH * HEIGHT];
        pixels[WIDTH + 2] = 31_315;
        pixels[0] = 28_315;
        let image = ThermalImage::from_message(&frame(&pixels, Some(&telemetry_words()))).unwrap();

        assert_eq!(image.pixel(1, 2), Some(31_315));
        assert_eq!(image.pixel(HEIGHT, 0), None);
        assert_eq!(image.min_max(), (28_315, 31_315));
        let celsius = image.pixel_celsius(1, 2).unwrap();
        assert!((celsius - 40.0).abs() < 1e-9);
    }

    #[test]
    fn telemetry_fields_use_documented_offsets() {
        let telemetry = Telemetry::from_words(telemetry_words()).unwrap();
        assert!((telemetry.fpa_temp_celsius() - 30.0).abs() < 1e-9);
        assert!((telemetry.housing_temp_celsius() - 25.0).abs() < 1e-9);
        assert!((telemetry.emissivity() - 0.98).abs() < 1e-3);
        assert_eq!(telemetry.gain_mode(), GainMode::Auto);
        assert_eq!(telemetry.effective_gain_mode(), GainMode::High);
        assert!(telemetry.tlinear_enabled());
        assert_eq!(telemetry.tlinear_resolution(), 0.01);
        assert!((telemetry.spotmeter_celsius() - 37.0).abs() < 1e-9);
    }

    #[test]
    fn coarse_resolution_scales_by_tenths() {
        assert_eq!(tlinear_resolution(0), 0.1);
        assert!((scaled_kelvin_to_celsius(3_101, 0.1) - 36.95).abs() < 1e-9);
    }

    #[test]
    fn telemetry_is_optional() {
        let image = ThermalImage::from_message(&frame(&vec![0; WIDTH * HEIGHT], None)).unwrap();
        assert!(image.telemetry().is_none());
        assert_eq!(image.pixel_celsius(0, 0), None);
    }

    #[test]
    fn wrong_pixel_count_is_rejected() {
        let err = ThermalImage::from_message(&frame(&[1, 2, 3], None)).unwrap_err();
        assert!(matches!(
            err,
            ImageError::Size {
                field: RADIOMETRIC_KEY,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn missing_or_bad_fields_are_reported() {
        let err = ThermalImage::from_message(&Message::status_message("ok")).unwrap_err();
        assert!(matches!(err, ImageError::Missing(RADIOMETRIC_KEY)));

        let err = ThermalImage::from_message(&Message::new().with(RADIOMETRIC_KEY, 5)).unwrap_err();
        assert!(matches!(err, ImageError::NotText(RADIOMETRIC_KEY)));

        let err = ThermalImage::from_message(&Message::new().with(RADIOMETRIC_KEY, "%%%"))
            .unwrap_err();
        assert!(matches!(err, ImageError::Data { .. }));
    }

    #[test]
    fn error_message_in_place_of_frame() {
        let err = ThermalImage::from_message(&Message::error_message("not connected")).unwrap_err();
        assert!(matches!(err, ImageError::Device(text) if text == "not connected"));
    }

    #[test]
    fn gain_mode_display() {
        assert_eq!(GainMode::from(1).to_string(), "low");
        assert_eq!(GainMode::from(9).to_string(), "unknown (9)");
    }
}
