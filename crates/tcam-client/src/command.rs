//! Commands accepted by the connection manager.
//!
//! Everything except `connect`, `disconnect` and `raw` is sent to the camera
//! as `{"cmd": <name>, "args": {...}}`, with `args` left out when empty.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tcam_frame::{encode_json, FrameError};

use crate::cci::CciWrite;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Connect,
    Disconnect,
    StreamOn,
    StreamOff,
    GetImage,
    GetStatus,
    SetTime,
    GetConfig,
    SetConfig,
    GetLepCci,
    SetLepCci,
    SetSpotmeter,
    GetWifi,
    SetWifi,
    RunFfc,
    Raw,
}

/// Queue a command's reply is awaited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Response,
    Frame,
}

impl CommandKind {
    /// Wire name of the command.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::StreamOn => "stream_on",
            Self::StreamOff => "stream_off",
            Self::GetImage => "get_image",
            Self::GetStatus => "get_status",
            Self::SetTime => "set_time",
            Self::GetConfig => "get_config",
            Self::SetConfig => "set_config",
            Self::GetLepCci => "get_lep_cci",
            Self::SetLepCci => "set_lep_cci",
            Self::SetSpotmeter => "set_spotmeter",
            Self::GetWifi => "get_wifi",
            Self::SetWifi => "set_wifi",
            Self::RunFfc => "run_ffc",
            Self::Raw => "raw",
        }
    }

    pub fn reply(self) -> Reply {
        match self {
            Self::GetImage => Reply::Frame,
            _ => Reply::Response,
        }
    }

    /// Whether the manager handles the command itself instead of sending it.
    pub fn is_local(self) -> bool {
        matches!(self, Self::Connect | Self::Disconnect)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for the connection manager. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    kind: CommandKind,
    args: Map<String, Value>,
    payload: Option<Bytes>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    cmd: &'static str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    args: &'a Map<String, Value>,
}

impl Command {
    /// A command without arguments.
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            args: Map::new(),
            payload: None,
        }
    }

    /// A command whose arguments are the fields of `params`.
    ///
    /// `params` must serialize to a JSON object (or `null` for no arguments).
    pub fn with_params<P: Serialize>(kind: CommandKind, params: &P) -> serde_json::Result<Self> {
        let args = match serde_json::to_value(params)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "{kind} arguments must be an object, got {other}"
                )))
            }
        };
        Ok(Self {
            kind,
            args,
            payload: None,
        })
    }

    /// Bytes written to the camera exactly as given.
    pub fn raw(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: CommandKind::Raw,
            args: Map::new(),
            payload: Some(payload.into()),
        }
    }

    pub fn stream_on(options: &StreamOptions) -> serde_json::Result<Self> {
        Self::with_params(CommandKind::StreamOn, options)
    }

    pub fn set_time(time: &TimeSetting) -> serde_json::Result<Self> {
        Self::with_params(CommandKind::SetTime, time)
    }

    pub fn set_config(settings: &CameraSettings) -> serde_json::Result<Self> {
        Self::with_params(CommandKind::SetConfig, settings)
    }

    pub fn get_lep_cci(command: u16, length: u16) -> serde_json::Result<Self> {
        Self::with_params(CommandKind::GetLepCci, &CciRead { command, length })
    }

    pub fn set_lep_cci(write: &CciWrite) -> serde_json::Result<Self> {
        Self::with_params(CommandKind::SetLepCci, write)
    }

    pub fn set_spotmeter(region: &Spotmeter) -> serde_json::Result<Self> {
        Self::with_params(CommandKind::SetSpotmeter, region)
    }

    pub fn set_wifi(settings: &WifiSettings) -> serde_json::Result<Self> {
        Self::with_params(CommandKind::SetWifi, settings)
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Append the wire form of this command to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        if let Some(payload) = &self.payload {
            dst.extend_from_slice(payload);
            return Ok(());
        }
        encode_json(
            &Envelope {
                cmd: self.kind.as_str(),
                args: &self.args,
            },
            dst,
        )
    }
}

/// `stream_on` arguments. Zero means "camera default" for both fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Minimum delay between frames in milliseconds.
    pub delay_msec: u32,
    /// Frames to send before stopping; 0 streams until `stream_off`.
    pub num_frames: u32,
}

/// `set_time` arguments. Unset fields are sent as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSetting {
    pub sec: Option<u8>,
    pub min: Option<u8>,
    pub hour: Option<u8>,
    /// Day of week, 1 = Sunday.
    pub dow: Option<u8>,
    pub day: Option<u8>,
    pub mon: Option<u8>,
    /// Years since 1970.
    pub year: Option<u16>,
}

/// `set_config` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub agc_enabled: u8,
    /// Emissivity in percent (1-100).
    pub emissivity: u8,
    /// 0 = high, 1 = low, 2 = auto.
    pub gain_mode: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            agc_enabled: 1,
            emissivity: 98,
            gain_mode: 2,
        }
    }
}

/// Spotmeter region, inclusive, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spotmeter {
    pub c1: u16,
    pub c2: u16,
    pub r1: u16,
    pub r2: u16,
}

impl Default for Spotmeter {
    fn default() -> Self {
        Self {
            c1: 79,
            c2: 80,
            r1: 59,
            r2: 60,
        }
    }
}

/// `set_wifi` arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiSettings {
    pub ap_ssid: String,
    pub ap_pw: String,
    pub ap_ip_addr: String,
    pub flags: u8,
    pub sta_ssid: String,
    pub sta_pw: String,
    pub sta_ip_addr: String,
    pub sta_netmask: String,
}

impl Default for WifiSettings {
    fn default() -> Self {
        Self {
            ap_ssid: "ApSSID".to_string(),
            ap_pw: "ApPassword".to_string(),
            ap_ip_addr: "192.168.4.1".to_string(),
            flags: 145,
            sta_ssid: "AHomeNetwork".to_string(),
            sta_pw: "anotherpassword".to_string(),
            sta_ip_addr: "192.168.0.2".to_string(),
            sta_netmask: "255.255.255.0".to_string(),
        }
    }
}

#[derive(Serialize)]
struct CciRead {
    command: u16,
    length: u16,
}
