//! Blocking client for tCam thermal cameras.
//!
//! A [`CameraClient`] owns one background [`ConnectionManager`] thread. Calls
//! on the client become [`Command`]s on the manager's inbox; the manager
//! writes them to the camera, reassembles replies from the byte stream and
//! routes each one to either the response queue or the frame queue. The
//! client blocks on the matching queue with a timeout.

pub mod cci;
pub mod client;
pub mod command;
pub mod error;
pub mod image;
pub mod manager;
pub mod words;

pub use cci::{CciError, CciRegister, CciWrite};
pub use client::{CameraClient, ClientConfig};
pub use command::{
    CameraSettings, Command, CommandKind, Reply, Spotmeter, StreamOptions, TimeSetting,
    WifiSettings,
};
pub use error::{ClientError, Result};
pub use image::{GainMode, ImageError, Telemetry, ThermalImage};
pub use manager::{ConnectionManager, ConnectionState, ManagerHandle, Queues};
pub use tcam_frame::Message;
pub use tcam_transport::{
    HardwareConfig, HardwareTarget, HardwareTransport, SocketConfig, SocketTarget,
    SocketTransport, Transport,
};
