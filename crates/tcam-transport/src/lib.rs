//! Transports for tCam thermal cameras.
//!
//! Two physically different links sit behind one [`Transport`] capability set:
//! - [`SocketTransport`]: TCP, JSON frames in both directions
//! - [`HardwareTransport`]: serial line for JSON commands and notifications,
//!   plus an SPI channel for checksummed image payloads
//!
//! Transports never spawn threads. They are driven by a single owner that
//! paces itself on their bounded-time [`Transport::read`].

pub mod error;
pub mod hardware;
pub mod socket;
pub mod spi;
pub mod traits;

pub use error::{Result, TransportError};
pub use hardware::{HardwareConfig, HardwareTarget, HardwareTransport};
pub use socket::{SocketConfig, SocketTarget, SocketTransport};
pub use spi::{SpiDevice, SpiOptions};
pub use traits::Transport;
