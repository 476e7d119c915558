use std::time::Duration;

use crate::cci::CciError;
use crate::image::ImageError;

/// Errors surfaced to callers of [`crate::CameraClient`].
///
/// Transport and protocol failures inside the manager are not errors here:
/// they arrive as messages on the queues.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Nothing arrived on the awaited queue in time.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The connection manager has exited.
    #[error("connection manager is not running")]
    WorkerStopped,

    /// The connection manager thread could not be started.
    #[error("failed to start connection manager: {0}")]
    Spawn(std::io::Error),

    /// Register data was rejected before transmission or could not be decoded.
    #[error("cci error: {0}")]
    Cci(#[from] CciError),

    /// An image frame could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] ImageError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The camera answered with an error message.
    #[error("camera reported: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
