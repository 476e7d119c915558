use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Result, TransportError};

/// Settings applied to an SPI device when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiOptions {
    /// Clock polarity/phase mode (0-3).
    pub mode: u8,
    pub bits_per_word: u8,
    pub speed_hz: u32,
}

/// A Linux `spidev` character device opened for half-duplex reads.
pub struct SpiDevice {
    file: File,
    path: PathBuf,
}

#[cfg(target_os = "linux")]
mod ioctl {
    use std::io;
    use std::os::fd::RawFd;

    // _IOW('k', nr, size) from <linux/spi/spidev.h>.
    const fn iow(nr: u32, size: u32) -> u32 {
        (1 << 30) | (size << 16) | ((b'k' as u32) << 8) | nr
    }

    pub const SPI_IOC_WR_MODE: u32 = iow(1, 1);
    pub const SPI_IOC_WR_BITS_PER_WORD: u32 = iow(3, 1);
    pub const SPI_IOC_WR_MAX_SPEED_HZ: u32 = iow(4, 4);

    pub fn write_setting<T>(fd: RawFd, request: u32, value: &T) -> io::Result<()> {
        // SAFETY: `fd` is an open spidev descriptor and `value` points to a live
        // value whose size matches the one encoded in `request`.
        let rc = unsafe { libc::ioctl(fd, request as _, value as *const T) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl SpiDevice {
    /// Open `path` and apply `options`.
    #[cfg(target_os = "linux")]
    pub fn open(path: impl AsRef<Path>, options: &SpiOptions) -> Result<Self> {
        use std::os::fd::AsRawFd;

        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let fd = file.as_raw_fd();
        let configure = |result: std::io::Result<()>| {
            result.map_err(|source| TransportError::Configure {
                path: path.clone(),
                source,
            })
        };
        configure(ioctl::write_setting(fd, ioctl::SPI_IOC_WR_MODE, &options.mode))?;
        configure(ioctl::write_setting(
            fd,
            ioctl::SPI_IOC_WR_BITS_PER_WORD,
            &options.bits_per_word,
        ))?;
        configure(ioctl::write_setting(
            fd,
            ioctl::SPI_IOC_WR_MAX_SPEED_HZ,
            &options.speed_hz,
        ))?;

        tracing::debug!(?path, ?options, "spi device opened");
        Ok(Self { file, path })
    }

    /// Open `path` and apply `options`.
    ///
    /// `spidev` only exists on Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn open(path: impl AsRef<Path>, _options: &SpiOptions) -> Result<Self> {
        Err(TransportError::Open {
            path: path.as_ref().to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "spidev requires Linux",
            ),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for SpiDevice {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl std::fmt::Debug for SpiDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiDevice").field("path", &self.path).finish()
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn request_codes_match_spidev_header() {
        assert_eq!(ioctl::SPI_IOC_WR_MODE, 0x4001_6B01);
        assert_eq!(ioctl::SPI_IOC_WR_BITS_PER_WORD, 0x4001_6B03);
        assert_eq!(ioctl::SPI_IOC_WR_MAX_SPEED_HZ, 0x4004_6B04);
    }

    #[test]
    fn missing_device_reports_open_error() {
        let options = SpiOptions {
            mode: 1,
            bits_per_word: 8,
            speed_hz: 1_000_000,
        };
        let err = SpiDevice::open("/dev/spidev-does-not-exist.9", &options).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[test]
    fn non_spi_node_reports_configure_error() {
        let options = SpiOptions {
            mode: 0,
            bits_per_word: 8,
            speed_hz: 1_000_000,
        };
        let err = SpiDevice::open("/dev/null", &options).unwrap_err();
        assert!(matches!(err, TransportError::Configure { .. }));
    }
}
