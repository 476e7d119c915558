use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default camera address in access-point mode.
pub const DEFAULT_ADDRESS: &str = "192.168.4.1";

/// Default camera command port.
pub const DEFAULT_PORT: u16 = 5001;

/// Network location of a camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketTarget {
    pub address: String,
    pub port: u16,
}

impl SocketTarget {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl Default for SocketTarget {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS, DEFAULT_PORT)
    }
}

/// Configuration for [`SocketTransport`].
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Bound on connect and on every read. Default: 1 s.
    pub read_timeout: Duration,
    /// Maximum bytes taken per read. Default: 64 KiB.
    pub read_chunk: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            read_chunk: 64 * 1024,
        }
    }
}

/// TCP link to a network camera.
pub struct SocketTransport {
    config: SocketConfig,
    stream: Option<TcpStream>,
    chunk: Vec<u8>,
}

impl SocketTransport {
    pub fn new() -> Self {
        Self::with_config(SocketConfig::default())
    }

    pub fn with_config(config: SocketConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk.max(1)];
        Self {
            config,
            stream: None,
            chunk,
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    fn connect_stream(&self, target: &SocketTarget) -> Result<TcpStream> {
        let label = format!("{}:{}", target.address, target.port);
        let connect_err = |source| TransportError::Connect {
            target: label.clone(),
            source,
        };

        let addrs = (target.address.as_str(), target.port)
            .to_socket_addrs()
            .map_err(connect_err)?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.read_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(self.config.read_timeout))
                        .map_err(connect_err)?;
                    stream.set_nodelay(true).ok();
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(connect_err(last_err.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::NotFound, "address resolved to nothing")
        })))
    }
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SocketTransport {
    type Target = SocketTarget;

    fn name(&self) -> &'static str {
        "socket"
    }

    fn open(&mut self, target: &SocketTarget) -> Result<()> {
        self.close();
        let stream = self.connect_stream(target)?;
        info!(address = %target.address, port = target.port, "connected to camera");
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("socket closed");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn read(&mut self, dst: &mut BytesMut) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        match stream.read(&mut self.chunk) {
            Ok(0) => {
                self.stream = None;
                Err(TransportError::Closed)
            }
            Ok(n) => {
                dst.extend_from_slice(&self.chunk[..n]);
                Ok(n)
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    use tcam_frame::{Delivery, Message};

    use super::*;

    fn quick_config() -> SocketConfig {
        SocketConfig {
            read_timeout: Duration::from_millis(50),
            ..SocketConfig::default()
        }
    }

    fn loopback() -> (TcpListener, SocketTarget) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, SocketTarget::new("127.0.0.1", port))
    }

    #[test]
    fn target_defaults_to_access_point() {
        let target: SocketTarget = serde_json::from_str("{}").unwrap();
        assert_eq!(target, SocketTarget::new("192.168.4.1", 5001));
    }

    #[test]
    fn open_write_read_roundtrip() {
        let (listener, target) = loopback();
        let camera = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 32];
            let n = conn.read(&mut buf).unwrap();
            conn.write_all(&buf[..n]).unwrap();
        });

        let mut transport = SocketTransport::with_config(quick_config());
        transport.open(&target).unwrap();
        assert!(transport.is_open());
        transport.write(b"\x02{}\x03").unwrap();

        let mut scratch = BytesMut::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while scratch.len() < 4 && Instant::now() < deadline {
            transport.read(&mut scratch).unwrap();
        }
        assert_eq!(scratch.as_ref(), b"\x02{}\x03");

        camera.join().unwrap();
    }

    #[test]
    fn read_timeout_yields_empty_read() {
        let (listener, target) = loopback();
        let mut transport = SocketTransport::with_config(quick_config());
        transport.open(&target).unwrap();
        let _conn = listener.accept().unwrap();

        let mut scratch = BytesMut::new();
        assert_eq!(transport.read(&mut scratch).unwrap(), 0);
        assert!(scratch.is_empty());
        assert!(transport.is_open());
    }

    #[test]
    fn peer_hangup_closes_transport() {
        let (listener, target) = loopback();
        let mut transport = SocketTransport::with_config(quick_config());
        transport.open(&target).unwrap();
        let (conn, _) = listener.accept().unwrap();
        drop(conn);

        let mut scratch = BytesMut::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        let err = loop {
            match transport.read(&mut scratch) {
                Ok(_) if Instant::now() < deadline => continue,
                Ok(_) => panic!("hangup was never observed"),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, TransportError::Closed | TransportError::Io(_)));
    }

    #[test]
    fn refused_connection_reports_connect_error() {
        let (listener, target) = loopback();
        drop(listener);

        let mut transport = SocketTransport::with_config(quick_config());
        let err = transport.open(&target).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(!transport.is_open());
    }

    #[test]
    fn write_without_connection_is_rejected() {
        let mut transport = SocketTransport::new();
        let err = transport.write(b"x").unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[test]
    fn post_process_routes_by_radiometric_key() {
        let mut transport = SocketTransport::new();
        let frame = Message::new().with("radiometric", "AAAA");
        assert!(matches!(transport.post_process(frame), Delivery::Frame(_)));
        let status = Message::status_message("ok");
        assert!(matches!(transport.post_process(status), Delivery::Response(_)));
    }
}
