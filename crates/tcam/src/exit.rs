use std::fmt;

use tcam_client::{ClientError, Message};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    let code = match &err {
        ClientError::Timeout(_) => TIMEOUT,
        ClientError::Cci(_) | ClientError::Image(_) | ClientError::Json(_) => DATA_INVALID,
        ClientError::Device(_) => FAILURE,
        ClientError::WorkerStopped | ClientError::Spawn(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// Turn a camera reply carrying an `error` field into a failure.
pub fn check_reply(context: &str, reply: Message) -> CliResult<Message> {
    match reply.error() {
        None => Ok(reply),
        Some(error) if reply.status() == Some("disconnected") => {
            Err(CliError::new(TRANSPORT_ERROR, format!("{context}: {error}")))
        }
        Some(error) => Err(CliError::new(FAILURE, format!("{context}: {error}"))),
    }
}
