use std::path::PathBuf;

/// Errors that can occur in camera transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to a network camera.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// Failed to open a device node.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to apply device settings after opening it.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on an open channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No channel is open.
    #[error("not connected")]
    NotConnected,

    /// The camera closed the connection.
    #[error("connection closed by camera")]
    Closed,
}

impl TransportError {
    /// Human-readable cause without the variant prefix.
    pub fn reason(&self) -> String {
        match self {
            Self::Connect { source, .. }
            | Self::Open { source, .. }
            | Self::Configure { source, .. }
            | Self::Io(source) => source.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
