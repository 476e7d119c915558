use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tcam_frame::Message;
use tcam_transport::{
    HardwareTarget, HardwareTransport, SocketTarget, SocketTransport, Transport,
};
use tracing::debug;

use crate::cci::{
    CciRegister, CciWrite, COMMAND_OEM_MASK, DEFAULT_LENGTH, RAD_SPOTMETER_ROI_GET,
    RAD_SPOTMETER_ROI_SET, RAD_SPOTMETER_VALUE, RAD_TLINEAR_RESOLUTION,
};
use crate::command::{
    CameraSettings, Command, CommandKind, Reply, Spotmeter, StreamOptions, TimeSetting,
    WifiSettings,
};
use crate::error::{ClientError, Result};
use crate::image::{scaled_kelvin_to_celsius, tlinear_resolution, ThermalImage};
use crate::manager::{not_connected_command, ConnectionManager, ManagerHandle, Queues};

/// Configuration for [`CameraClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a call waits for its reply. Default: 10 s.
    pub response_timeout: Duration,
    /// How long the manager sleeps between inbox checks while disconnected.
    /// Default: 1 s.
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Blocking facade over a camera connection.
///
/// Each call queues a command for the background manager and waits for the
/// next message on the queue the command answers on. Replies are matched by
/// arrival order only: a reply that arrives after its caller timed out is
/// returned to the next caller waiting on the same queue.
///
/// Replies are returned as data. A camera-side failure (including "not
/// connected") is an `Ok` message carrying an `error` field; only local
/// failures such as timeouts are `Err`. A "not connected" report is queued
/// on both queues; once a call has taken one copy, the other is skipped.
///
/// # Example
///
/// ```no_run
/// use tcam_client::CameraClient;
///
/// let client = CameraClient::new()?;
/// let reply = client.connect("192.168.4.1", 5001)?;
/// if reply.status() == Some("connected") {
///     println!("{:?}", client.get_status()?);
/// }
/// client.shutdown();
/// # Ok::<(), tcam_client::ClientError>(())
/// ```
pub struct CameraClient<T: Transport> {
    config: ClientConfig,
    manager: ManagerHandle,
    queues: Queues,
    stale_responses: Cell<usize>,
    stale_frames: Cell<usize>,
    closed: bool,
    _transport: PhantomData<fn() -> T>,
}

impl<T: Transport> CameraClient<T> {
    /// Start a manager thread driving `transport`.
    pub fn with_transport(transport: T, config: ClientConfig) -> Result<Self> {
        let (manager, queues) = ConnectionManager::spawn(transport, config.idle_timeout)?;
        Ok(Self {
            config,
            manager,
            queues,
            stale_responses: Cell::new(0),
            stale_frames: Cell::new(0),
            closed: false,
            _transport: PhantomData,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open the link. The reply status is `connected` or `disconnected` with
    /// a `reason`.
    pub fn connect_to(&self, target: &T::Target) -> Result<Message> {
        self.request(Command::with_params(CommandKind::Connect, target)?, None)
    }

    pub fn disconnect(&self) -> Result<Message> {
        self.request(Command::new(CommandKind::Disconnect), None)
    }

    /// Disconnect, stop the manager and wait for it to exit.
    pub fn shutdown(mut self) {
        self.close();
    }

    pub fn start_stream(&self, options: StreamOptions) -> Result<Message> {
        self.request(Command::stream_on(&options)?, None)
    }

    pub fn stop_stream(&self) -> Result<Message> {
        self.request(Command::new(CommandKind::StreamOff), None)
    }

    /// Request one image and wait for the next frame.
    pub fn get_image(&self, timeout: Option<Duration>) -> Result<Message> {
        self.request(Command::new(CommandKind::GetImage), timeout)
    }

    /// Request one image and decode it.
    pub fn capture(&self, timeout: Option<Duration>) -> Result<ThermalImage> {
        let frame = self.get_image(timeout)?;
        Ok(ThermalImage::from_message(&frame)?)
    }

    /// Take a frame if one is queued, without blocking.
    pub fn get_frame(&self) -> Option<Message> {
        loop {
            match self.queues.frames.try_recv() {
                Ok(frame) => {
                    self.queues.frame_taken();
                    if !self.skip_stale(Reply::Frame, &frame) {
                        return Some(frame);
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Wait for the next frame of a running stream.
    pub fn next_frame(&self, timeout: Option<Duration>) -> Result<Message> {
        self.await_on(Reply::Frame, timeout)
    }

    /// Number of frames waiting to be taken with [`get_frame`](Self::get_frame).
    pub fn frame_count(&self) -> usize {
        self.queues.queued_frames().saturating_sub(self.stale_frames.get())
    }

    pub fn run_ffc(&self) -> Result<Message> {
        self.request(Command::new(CommandKind::RunFfc), None)
    }

    pub fn get_status(&self) -> Result<Message> {
        self.request(Command::new(CommandKind::GetStatus), None)
    }

    pub fn set_time(&self, time: &TimeSetting) -> Result<Message> {
        self.request(Command::set_time(time)?, None)
    }

    pub fn get_config(&self) -> Result<Message> {
        self.request(Command::new(CommandKind::GetConfig), None)
    }

    pub fn set_config(&self, settings: &CameraSettings) -> Result<Message> {
        self.request(Command::set_config(settings)?, None)
    }

    /// Read `length` words of a CCI register.
    pub fn get_lep_cci(&self, command: u16, length: u16) -> Result<Message> {
        self.request(Command::get_lep_cci(command, length)?, None)
    }

    /// Read the spotmeter region register, the camera's default CCI read.
    pub fn get_spotmeter_roi(&self) -> Result<Message> {
        self.get_lep_cci(RAD_SPOTMETER_ROI_GET, DEFAULT_LENGTH)
    }

    /// Read a CCI register and parse the reply.
    pub fn read_register(&self, command: u16, length: u16) -> Result<CciRegister> {
        let reply = self.get_lep_cci(command, length)?;
        if let Some(error) = reply.error() {
            return Err(ClientError::Device(error.to_string()));
        }
        Ok(CciRegister::from_message(&reply)?)
    }

    /// Write a CCI register. Every value must fit in 16 bits; nothing is sent
    /// otherwise.
    pub fn set_lep_cci(&self, command: u16, values: &[i64]) -> Result<Message> {
        let write = CciWrite::from_values(command, values)?;
        self.request(Command::set_lep_cci(&write)?, None)
    }

    pub fn set_lep_cci_words(&self, command: u16, words: &[u16]) -> Result<Message> {
        let write = CciWrite::new(command, words)?;
        self.request(Command::set_lep_cci(&write)?, None)
    }

    pub fn set_spotmeter(&self, region: &Spotmeter) -> Result<Message> {
        self.request(Command::set_spotmeter(region)?, None)
    }

    /// Move the spotmeter through its RAD CCI register instead of
    /// `set_spotmeter`. Words are in register order: r1, c1, r2, c2.
    pub fn set_spotmeter_roi(&self, region: &Spotmeter) -> Result<Message> {
        let words = [region.r1, region.c1, region.r2, region.c2];
        self.set_lep_cci_words(RAD_SPOTMETER_ROI_SET, &words)
    }

    /// Spotmeter mean in Celsius, read through the RAD CCI registers.
    pub fn spotmeter_celsius(&self) -> Result<f64> {
        let resolution = self.read_register(COMMAND_OEM_MASK | RAD_TLINEAR_RESOLUTION, 2)?;
        let flag = first_word(&resolution)?;
        let value = self.read_register(COMMAND_OEM_MASK | RAD_SPOTMETER_VALUE, 4)?;
        let mean = first_word(&value)?;
        Ok(scaled_kelvin_to_celsius(mean, tlinear_resolution(flag)))
    }

    pub fn get_wifi(&self) -> Result<Message> {
        self.request(Command::new(CommandKind::GetWifi), None)
    }

    pub fn set_wifi(&self, settings: &WifiSettings) -> Result<Message> {
        self.request(Command::set_wifi(settings)?, None)
    }

    /// Write `payload` to the camera unmodified and wait for a response.
    pub fn send_raw(&self, payload: impl Into<Bytes>) -> Result<Message> {
        self.request(Command::raw(payload), None)
    }

    /// Queue `command` and wait on the queue it answers on. `None` uses the
    /// configured response timeout.
    pub fn request(&self, command: Command, timeout: Option<Duration>) -> Result<Message> {
        let kind = command.kind();
        self.manager.submit(command)?;
        let message = self.await_on(kind.reply(), timeout)?;
        if not_connected_command(&message) == Some(kind.as_str()) {
            let other = match kind.reply() {
                Reply::Response => &self.stale_frames,
                Reply::Frame => &self.stale_responses,
            };
            other.set(other.get() + 1);
        }
        Ok(message)
    }

    fn await_on(&self, reply: Reply, timeout: Option<Duration>) -> Result<Message> {
        let timeout = timeout.unwrap_or(self.config.response_timeout);
        let deadline = Instant::now() + timeout;
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            let received = match reply {
                Reply::Response => self.queues.responses.recv_timeout(wait),
                Reply::Frame => self.queues.frames.recv_timeout(wait),
            };
            let message = received.map_err(|err| match err {
                RecvTimeoutError::Timeout => ClientError::Timeout(timeout),
                RecvTimeoutError::Disconnected => ClientError::WorkerStopped,
            })?;
            if reply == Reply::Frame {
                self.queues.frame_taken();
            }
            if !self.skip_stale(reply, &message) {
                return Ok(message);
            }
        }
    }

    /// Consume `message` if it is the leftover copy of a "not connected"
    /// report already returned from the other queue. Reports are queued in
    /// command order, so the oldest one seen is the leftover.
    fn skip_stale(&self, reply: Reply, message: &Message) -> bool {
        let stale = match reply {
            Reply::Response => &self.stale_responses,
            Reply::Frame => &self.stale_frames,
        };
        if stale.get() == 0 || not_connected_command(message).is_none() {
            return false;
        }
        stale.set(stale.get() - 1);
        debug!(?reply, "skipped duplicate not-connected report");
        true
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.manager.submit(Command::new(CommandKind::Disconnect)).is_ok() {
            if let Err(err) = self.await_on(Reply::Response, None) {
                debug!(error = %err, "no reply to shutdown disconnect");
            }
        }
        self.manager.stop();
    }
}

impl<T: Transport> Drop for CameraClient<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl CameraClient<SocketTransport> {
    /// A client for a network camera, with default settings.
    pub fn new() -> Result<Self> {
        Self::with_transport(SocketTransport::new(), ClientConfig::default())
    }

    pub fn connect(&self, address: &str, port: u16) -> Result<Message> {
        self.connect_to(&SocketTarget::new(address, port))
    }
}

impl CameraClient<HardwareTransport> {
    /// A client for a camera wired over serial and SPI, with default settings.
    pub fn hardware() -> Result<Self> {
        Self::with_transport(HardwareTransport::new(), ClientConfig::default())
    }

    pub fn connect(&self, target: &HardwareTarget) -> Result<Message> {
        self.connect_to(target)
    }
}

fn first_word(register: &CciRegister) -> Result<u16> {
    if !register.is_ok() {
        return Err(ClientError::Device(format!(
            "register 0x{:04X} returned status {}",
            register.command, register.status
        )));
    }
    register.words()?.first().copied().ok_or_else(|| {
        ClientError::Device(format!("register 0x{:04X} is empty", register.command))
    })
}
