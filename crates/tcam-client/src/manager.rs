//! Background worker that owns the camera link.
//!
//! The manager loop alternates between three steps:
//!
//! 1. take at most one pending command and execute it,
//! 2. when connected, read once and route every complete message,
//! 3. when not connected, wait on the inbox for up to the idle timeout.
//!
//! The inbox carries commands and the stop request alike, so the idle wait and
//! the post-write settle wait both end as soon as the client asks to stop.
//! Failures never cross the thread boundary: they become messages on the
//! response (and sometimes frame) queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use serde_json::Value;
use tcam_frame::{extract_messages, Delivery, Message};
use tcam_transport::{Transport, TransportError};
use tracing::{debug, trace, warn};

use crate::command::{Command, CommandKind};
use crate::error::{ClientError, Result};

const CONNECTED: &str = "connected";
const DISCONNECTED: &str = "disconnected";
const NOT_CONNECTED: &str = "not connected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub(crate) enum Inbox {
    Command(Command),
    Stop,
}

/// Receiving ends of the manager's output queues.
#[derive(Debug)]
pub struct Queues {
    pub responses: Receiver<Message>,
    pub frames: Receiver<Message>,
    queued_frames: Arc<AtomicUsize>,
}

impl Queues {
    /// Frames sent by the manager and not yet taken off `frames`.
    pub fn queued_frames(&self) -> usize {
        self.queued_frames.load(Ordering::Acquire)
    }

    /// Record that one message was taken off `frames`.
    pub fn frame_taken(&self) {
        let _ = self
            .queued_frames
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// Client-side handle used to feed and stop a running manager.
#[derive(Debug)]
pub struct ManagerHandle {
    inbox: Sender<Inbox>,
    worker: Option<JoinHandle<()>>,
}

impl ManagerHandle {
    /// Queue a command for the manager.
    pub fn submit(&self, command: Command) -> Result<()> {
        self.inbox
            .send(Inbox::Command(command))
            .map_err(|_| ClientError::WorkerStopped)
    }

    /// Ask the manager to exit and wait for it. Idempotent.
    pub fn stop(&mut self) {
        let _ = self.inbox.send(Inbox::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("connection manager panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }
}

impl std::fmt::Debug for Inbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(command) => write!(f, "Command({})", command.kind()),
            Self::Stop => f.write_str("Stop"),
        }
    }
}

/// The worker half: transport, reassembly buffer and queue senders.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    state: ConnectionState,
    scratch: BytesMut,
    inbox: Receiver<Inbox>,
    backlog: VecDeque<Command>,
    responses: Sender<Message>,
    frames: Sender<Message>,
    queued_frames: Arc<AtomicUsize>,
    idle_timeout: Duration,
    stopped: bool,
}

impl<T: Transport> ConnectionManager<T> {
    fn new(transport: T, idle_timeout: Duration) -> (Self, Sender<Inbox>, Queues) {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        let (responses_tx, responses_rx) = mpsc::channel();
        let (frames_tx, frames_rx) = mpsc::channel();
        let queued_frames = Arc::new(AtomicUsize::new(0));
        let manager = Self {
            transport,
            state: ConnectionState::Disconnected,
            scratch: BytesMut::new(),
            inbox: inbox_rx,
            backlog: VecDeque::new(),
            responses: responses_tx,
            frames: frames_tx,
            queued_frames: Arc::clone(&queued_frames),
            idle_timeout,
            stopped: false,
        };
        let queues = Queues {
            responses: responses_rx,
            frames: frames_rx,
            queued_frames,
        };
        (manager, inbox_tx, queues)
    }

    /// Start a manager on its own thread.
    pub fn spawn(transport: T, idle_timeout: Duration) -> Result<(ManagerHandle, Queues)> {
        let (manager, inbox, queues) = Self::new(transport, idle_timeout);
        let worker = thread::Builder::new()
            .name("tcam-manager".to_string())
            .spawn(move || manager.run())
            .map_err(ClientError::Spawn)?;
        let handle = ManagerHandle {
            inbox,
            worker: Some(worker),
        };
        Ok((handle, queues))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run until stopped or until the client goes away.
    pub fn run(mut self) {
        debug!(transport = self.transport.name(), "connection manager started");
        while !self.stopped {
            self.step();
        }
        self.transport.close();
        debug!("connection manager stopped");
    }

    fn step(&mut self) {
        if let Some(command) = self.next_command() {
            self.execute(command);
        }
        if self.stopped {
            return;
        }
        if self.transport.is_open() {
            self.receive();
        } else {
            self.idle_wait();
        }
    }

    fn next_command(&mut self) -> Option<Command> {
        if let Some(command) = self.backlog.pop_front() {
            return Some(command);
        }
        match self.inbox.try_recv() {
            Ok(Inbox::Command(command)) => Some(command),
            Ok(Inbox::Stop) | Err(TryRecvError::Disconnected) => {
                self.stopped = true;
                None
            }
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Wait on the inbox for at most `timeout`. True when a command arrived.
    fn wait_inbox(&mut self, timeout: Duration) -> bool {
        match self.inbox.recv_timeout(timeout) {
            Ok(Inbox::Command(command)) => {
                self.backlog.push_back(command);
                true
            }
            Ok(Inbox::Stop) | Err(RecvTimeoutError::Disconnected) => {
                self.stopped = true;
                false
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    fn idle_wait(&mut self) {
        self.wait_inbox(self.idle_timeout);
    }

    /// Hold off the next iteration for the device turnaround time. Commands
    /// arriving meanwhile are kept in order for later.
    fn settle(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.wait_inbox(remaining) {
                return;
            }
        }
    }

    fn execute(&mut self, command: Command) {
        let kind = command.kind();
        debug!(cmd = %kind, state = ?self.state, "executing command");
        if !kind.is_local() {
            self.send(&command);
        } else if kind == CommandKind::Connect {
            self.connect(&command);
        } else {
            self.disconnect();
        }
    }

    fn connect(&mut self, command: &Command) {
        let args = Value::Object(command.args().clone());
        let target: T::Target = match serde_json::from_value(args) {
            Ok(target) => target,
            Err(err) => {
                warn!(error = %err, "invalid connect arguments");
                self.respond(disconnected(format!("invalid connect arguments: {err}")));
                return;
            }
        };

        self.state = ConnectionState::Connecting;
        self.scratch.clear();
        match self.transport.open(&target) {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.respond(Message::status_message(CONNECTED));
            }
            Err(err) => {
                warn!(?target, error = %err, "connect failed");
                self.state = ConnectionState::Disconnected;
                self.respond(disconnected(err.to_string()));
            }
        }
    }

    fn disconnect(&mut self) {
        self.transport.close();
        self.state = ConnectionState::Disconnected;
        self.scratch.clear();
        self.respond(Message::status_message(DISCONNECTED));
    }

    fn send(&mut self, command: &Command) {
        if !self.transport.is_open() {
            self.report_not_connected(command.kind());
            return;
        }

        let mut wire = BytesMut::new();
        if let Err(err) = command.encode(&mut wire) {
            self.respond(Message::error_message(format!(
                "failed to encode {}: {err}",
                command.kind()
            )));
            return;
        }

        trace!(cmd = %command.kind(), len = wire.len(), "writing command");
        match self.transport.write(&wire) {
            Ok(()) => {
                if let Some(settle) = self.transport.settle_time() {
                    self.settle(settle);
                }
            }
            Err(TransportError::NotConnected) => self.report_not_connected(command.kind()),
            Err(err) => self.drop_connection(err),
        }
    }

    fn receive(&mut self) {
        match self.transport.read(&mut self.scratch) {
            Ok(0) => {}
            Ok(n) => {
                trace!(n, buffered = self.scratch.len(), "read from camera");
                for message in extract_messages(&mut self.scratch) {
                    let delivery = self.transport.post_process(message);
                    self.deliver(delivery);
                }
            }
            Err(err) => self.drop_connection(err),
        }
    }

    /// Leave the connected state after an unrecoverable transport error.
    fn drop_connection(&mut self, err: TransportError) {
        warn!(error = %err, "camera link lost");
        self.transport.close();
        self.state = ConnectionState::Disconnected;
        self.scratch.clear();
        self.respond(disconnected(err.to_string()));
    }

    /// A caller may be waiting on either queue, so both hear about it.
    fn report_not_connected(&self, kind: CommandKind) {
        debug!(cmd = %kind, "command dropped, not connected");
        let message = Message::error_message(NOT_CONNECTED)
            .with("status", DISCONNECTED)
            .with("cmd", kind.as_str());
        self.push_frame(message.clone());
        self.respond(message);
    }

    fn deliver(&self, delivery: Delivery) {
        match delivery {
            Delivery::Frame(message) => self.push_frame(message),
            Delivery::Response(message) => self.respond(message),
        }
    }

    fn respond(&self, message: Message) {
        if self.responses.send(message).is_err() {
            trace!("response dropped, client gone");
        }
    }

    fn push_frame(&self, message: Message) {
        // Counted before the send so a fast consumer never sees it go negative.
        self.queued_frames.fetch_add(1, Ordering::AcqRel);
        if self.frames.send(message).is_err() {
            self.queued_frames.fetch_sub(1, Ordering::AcqRel);
            trace!("frame dropped, client gone");
        }
    }
}

/// The command named by a "not connected" report, if `message` is one.
///
/// The manager queues the report on both queues, so the caller that takes
/// one copy knows a second copy for the same command sits on the other queue.
pub fn not_connected_command(message: &Message) -> Option<&str> {
    if message.status() != Some(DISCONNECTED) || message.error() != Some(NOT_CONNECTED) {
        return None;
    }
    message.get("cmd").and_then(Value::as_str)
}

fn disconnected(reason: String) -> Message {
    Message::status_message(DISCONNECTED).with("reason", reason)
}
