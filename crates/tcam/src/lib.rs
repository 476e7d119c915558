//! Client driver for tCam and tCam-Mini thermal cameras.
//!
//! The camera speaks JSON commands framed by STX/ETX bytes, either over TCP
//! or over a serial line paired with an SPI channel for image data.
//!
//! # Crate Structure
//!
//! - [`frame`]: wire framing, message type and the SPI checksum envelope
//! - [`transport`]: socket and serial+SPI links behind one `Transport` trait
//! - [`client`]: the background connection manager and the blocking
//!   [`CameraClient`](client::CameraClient) facade
//!
//! # Example
//!
//! ```no_run
//! use tcam::client::CameraClient;
//!
//! let camera = CameraClient::new()?;
//! camera.connect("192.168.4.1", 5001)?;
//! let image = camera.capture(None)?;
//! println!("min/max: {:?}", image.min_max());
//! camera.shutdown();
//! # Ok::<(), tcam::client::ClientError>(())
//! ```

/// Re-export frame types.
pub mod frame {
    pub use tcam_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use tcam_transport::*;
}

/// Re-export client types.
pub mod client {
    pub use tcam_client::*;
}
