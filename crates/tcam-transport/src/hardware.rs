use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use tcam_frame::{decode_spi_frame, Delivery, Message, IMAGE_READY_KEY};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::spi::{SpiDevice, SpiOptions};
use crate::traits::Transport;

/// Device nodes and line settings of a camera wired to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareTarget {
    pub serial_path: PathBuf,
    pub spi_path: PathBuf,
    pub baud: u32,
    pub spi_speed_hz: u32,
}

impl Default for HardwareTarget {
    fn default() -> Self {
        Self {
            serial_path: PathBuf::from("/dev/serial0"),
            spi_path: PathBuf::from("/dev/spidev0.0"),
            baud: 230_400,
            spi_speed_hz: 7_000_000,
        }
    }
}

/// Configuration for [`HardwareTransport`].
#[derive(Debug, Clone)]
pub struct HardwareConfig {
    /// Bound on every serial read. Default: 100 ms.
    pub read_timeout: Duration,
    /// Maximum bytes taken per serial read. Default: 4 KiB.
    pub read_chunk: usize,
    /// Camera turnaround time after each command. Default: 50 ms.
    pub settle: Duration,
    /// SPI clock mode. Default: 1.
    pub spi_mode: u8,
    /// Default: 8.
    pub spi_bits_per_word: u8,
    /// Largest single spidev transfer. Default: 4096 bytes (the kernel's
    /// default `bufsiz`).
    pub max_spi_transfer: usize,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            read_chunk: 4 * 1024,
            settle: Duration::from_millis(50),
            spi_mode: 1,
            spi_bits_per_word: 8,
            max_spi_transfer: 4096,
        }
    }
}

/// Serial + SPI link to a camera wired directly to the host.
///
/// JSON commands and notifications travel over the serial line. Image data
/// is announced on serial with `{"image_ready": <len>}` and then clocked out
/// of the SPI device.
pub struct HardwareTransport {
    config: HardwareConfig,
    serial: Option<Box<dyn SerialPort>>,
    spi: Option<SpiDevice>,
    chunk: Vec<u8>,
}

impl HardwareTransport {
    pub fn new() -> Self {
        Self::with_config(HardwareConfig::default())
    }

    pub fn with_config(config: HardwareConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk.max(1)];
        Self {
            config,
            serial: None,
            spi: None,
            chunk,
        }
    }

    pub fn config(&self) -> &HardwareConfig {
        &self.config
    }

    fn fetch_image(&mut self, len: usize) -> Delivery {
        let max_transfer = self.config.max_spi_transfer;
        let Some(spi) = self.spi.as_mut() else {
            return Delivery::Response(Message::error_message(
                TransportError::NotConnected.to_string(),
            ));
        };
        image_delivery(spi, len, max_transfer)
    }
}

impl Default for HardwareTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HardwareTransport {
    type Target = HardwareTarget;

    fn name(&self) -> &'static str {
        "hardware"
    }

    fn open(&mut self, target: &HardwareTarget) -> Result<()> {
        self.close();

        let serial = serialport::new(target.serial_path.to_string_lossy(), target.baud)
            .timeout(self.config.read_timeout)
            .open()
            .map_err(|err| TransportError::Open {
                path: target.serial_path.clone(),
                source: err.into(),
            })?;

        let options = SpiOptions {
            mode: self.config.spi_mode,
            bits_per_word: self.config.spi_bits_per_word,
            speed_hz: target.spi_speed_hz,
        };
        let spi = SpiDevice::open(&target.spi_path, &options)?;

        info!(
            serial = ?target.serial_path,
            spi = ?target.spi_path,
            baud = target.baud,
            spi_speed_hz = target.spi_speed_hz,
            "connected to camera"
        );
        self.serial = Some(serial);
        self.spi = Some(spi);
        Ok(())
    }

    fn close(&mut self) {
        let had_serial = self.serial.take().is_some();
        let had_spi = self.spi.take().is_some();
        if had_serial || had_spi {
            debug!("serial and spi channels closed");
        }
    }

    fn is_open(&self) -> bool {
        self.serial.is_some() && self.spi.is_some()
    }

    fn read(&mut self, dst: &mut BytesMut) -> Result<usize> {
        let serial = self.serial.as_mut().ok_or(TransportError::NotConnected)?;
        match serial.read(&mut self.chunk) {
            Ok(n) => {
                dst.extend_from_slice(&self.chunk[..n]);
                Ok(n)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let serial = self.serial.as_mut().ok_or(TransportError::NotConnected)?;
        serial.write_all(bytes)?;
        serial.flush()?;
        Ok(())
    }

    fn settle_time(&self) -> Option<Duration> {
        Some(self.config.settle)
    }

    fn post_process(&mut self, message: Message) -> Delivery {
        let Some(announced) = message.get(IMAGE_READY_KEY) else {
            return Delivery::route(message);
        };

        match announced.as_u64().and_then(|len| usize::try_from(len).ok()) {
            Some(len) => self.fetch_image(len),
            None => {
                warn!(?announced, "image_ready without a usable length");
                Delivery::Response(
                    Message::error_message("invalid image_ready length")
                        .with(IMAGE_READY_KEY, announced.clone()),
                )
            }
        }
    }
}

/// Read exactly `len` bytes of an SPI image, at most `max_transfer` per read.
pub fn read_spi_image<R: Read>(
    spi: &mut R,
    len: usize,
    max_transfer: usize,
) -> std::io::Result<Vec<u8>> {
    let mut raw = vec![0u8; len];
    for piece in raw.chunks_mut(max_transfer.max(1)) {
        spi.read_exact(piece)?;
    }
    Ok(raw)
}

/// Fetch an announced SPI image and decide where it goes.
pub fn image_delivery<R: Read>(spi: &mut R, len: usize, max_transfer: usize) -> Delivery {
    match read_spi_image(spi, len, max_transfer) {
        Ok(raw) => {
            debug!(len, "spi image received");
            decode_spi_frame(&raw)
        }
        Err(err) => {
            warn!(len, error = %err, "spi image read failed");
            Delivery::Response(
                Message::error_message(format!("spi read failed: {err}")).with("length", len),
            )
        }
    }
}
