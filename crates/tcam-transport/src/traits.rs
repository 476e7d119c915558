use std::fmt::Debug;
use std::time::Duration;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tcam_frame::{Delivery, Message};

use crate::error::Result;

/// Capability set shared by every camera link.
///
/// A transport holds at most one open connection. Every method is called from
/// the single thread that owns it; none of them may block without bound.
pub trait Transport: Send + 'static {
    /// Connection parameters, carried as the arguments of a `connect` command.
    type Target: Serialize + DeserializeOwned + Default + Debug + Send;

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str;

    /// Open the link. An already-open link is closed first.
    fn open(&mut self, target: &Self::Target) -> Result<()>;

    /// Close the link. Closing a closed link is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Read whatever is available into `dst`, waiting at most the configured
    /// read timeout.
    ///
    /// Returns `Ok(0)` when the timeout elapses with nothing received.
    /// Returns `Err(TransportError::Closed)` when the camera hangs up.
    fn read(&mut self, dst: &mut BytesMut) -> Result<usize>;

    /// Write a complete command.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Turnaround time the device needs after each write.
    fn settle_time(&self) -> Option<Duration> {
        None
    }

    /// Decide where a decoded message goes, fetching any side-channel payload
    /// it announces.
    fn post_process(&mut self, message: Message) -> Delivery {
        Delivery::route(message)
    }
}
