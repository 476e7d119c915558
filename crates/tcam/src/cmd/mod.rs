use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use tcam_client::cci::{DEFAULT_LENGTH, RAD_SPOTMETER_ROI_GET};
use tcam_client::{
    CameraClient, ClientConfig, HardwareTarget, HardwareTransport, SocketConfig, SocketTarget,
    SocketTransport, Transport,
};
use tcam_transport::socket::{DEFAULT_ADDRESS, DEFAULT_PORT};
use tracing::debug;

use crate::exit::{client_error, CliError, CliResult, INTERNAL, TRANSPORT_ERROR, USAGE};
use crate::output::OutputFormat;

pub mod cci;
pub mod config;
pub mod image;
pub mod query;
pub mod spot;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show camera status.
    Status,
    /// Show camera settings.
    Config,
    /// Change camera settings.
    SetConfig(SetConfigArgs),
    /// Capture one image and summarize it.
    Image(ImageArgs),
    /// Capture one image and decode its telemetry.
    Telemetry,
    /// Read a Lepton CCI register.
    CciGet(CciGetArgs),
    /// Write a Lepton CCI register.
    CciSet(CciSetArgs),
    /// Read the spotmeter temperature.
    Spot,
    /// Move the spotmeter region.
    SetSpotmeter(SpotmeterArgs),
    /// Stream images until a count is reached or Ctrl-C.
    Stream(StreamArgs),
    /// Run a flat-field correction.
    Ffc,
    /// Show WiFi settings.
    Wifi,
    /// Show version information.
    Version(VersionArgs),
}

/// How to reach the camera.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Camera address.
    #[arg(long, env = "TCAM_ADDRESS", default_value = DEFAULT_ADDRESS, global = true)]
    pub address: String,

    /// Camera command port.
    #[arg(long, env = "TCAM_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// Use a camera wired over serial and SPI instead of the network.
    #[arg(long, global = true)]
    pub hw: bool,

    /// Serial device (with --hw). Default: /dev/serial0.
    #[arg(long, env = "TCAM_SERIAL", requires = "hw", global = true)]
    pub serial: Option<PathBuf>,

    /// SPI device (with --hw). Default: /dev/spidev0.0.
    #[arg(long, env = "TCAM_SPI", requires = "hw", global = true)]
    pub spi: Option<PathBuf>,

    /// How long to wait for each reply (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s", global = true)]
    pub timeout: String,
}

impl LinkArgs {
    fn hardware_target(&self) -> HardwareTarget {
        let defaults = HardwareTarget::default();
        HardwareTarget {
            serial_path: self.serial.clone().unwrap_or(defaults.serial_path),
            spi_path: self.spi.clone().unwrap_or(defaults.spi_path),
            ..defaults
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum GainArg {
    High,
    Low,
    Auto,
}

impl GainArg {
    pub fn code(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Low => 1,
            Self::Auto => 2,
        }
    }
}

#[derive(Args, Debug)]
pub struct SetConfigArgs {
    /// Enable automatic gain control (1) or radiometric output (0).
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub agc: u8,
    /// Emissivity in percent.
    #[arg(long, default_value_t = 98, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub emissivity: u8,
    #[arg(long, value_enum, default_value = "auto")]
    pub gain_mode: GainArg,
}

#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Also write the raw frame JSON to this file.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CciGetArgs {
    /// Register command word (decimal or 0x-prefixed hex).
    #[arg(long, default_value_t = RAD_SPOTMETER_ROI_GET, value_parser = parse_register)]
    pub register: u16,
    /// Number of 16-bit words to read.
    #[arg(long, default_value_t = DEFAULT_LENGTH)]
    pub length: u16,
}

#[derive(Args, Debug)]
pub struct CciSetArgs {
    /// Register command word (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_register)]
    pub register: u16,
    /// Words to write, each 0-65535.
    #[arg(required = true, allow_negative_numbers = true)]
    pub values: Vec<i64>,
}

#[derive(Args, Debug)]
pub struct SpotmeterArgs {
    #[arg(long, default_value_t = 79)]
    pub c1: u16,
    #[arg(long, default_value_t = 80)]
    pub c2: u16,
    #[arg(long, default_value_t = 59)]
    pub r1: u16,
    #[arg(long, default_value_t = 60)]
    pub r2: u16,
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Stop after N frames. Default: until Ctrl-C.
    #[arg(long)]
    pub count: Option<u32>,
    /// Minimum delay between frames in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show build details.
    #[arg(long)]
    pub extended: bool,
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    if let Command::Version(args) = command {
        return version::run(args);
    }

    let timeout = parse_duration(&link.timeout)?;
    let config = ClientConfig::default().with_response_timeout(timeout);
    if link.hw {
        let client = CameraClient::with_transport(HardwareTransport::new(), config)
            .map_err(|err| client_error("start failed", err))?;
        with_camera(client, &link.hardware_target(), command, format)
    } else {
        let transport = SocketTransport::with_config(SocketConfig::default());
        let client = CameraClient::with_transport(transport, config)
            .map_err(|err| client_error("start failed", err))?;
        let target = SocketTarget::new(link.address.clone(), link.port);
        with_camera(client, &target, command, format)
    }
}

fn with_camera<T: Transport>(
    client: CameraClient<T>,
    target: &T::Target,
    command: Command,
    format: OutputFormat,
) -> CliResult<i32> {
    connect(&client, target)?;
    let result = dispatch(&client, command, format);
    client.shutdown();
    result
}

fn connect<T: Transport>(client: &CameraClient<T>, target: &T::Target) -> CliResult<()> {
    debug!(?target, "connecting");
    let reply = client
        .connect_to(target)
        .map_err(|err| client_error("connect failed", err))?;
    if reply.status() == Some("connected") {
        return Ok(());
    }
    let reason = reply
        .get("reason")
        .and_then(|reason| reason.as_str())
        .unwrap_or("camera did not accept the connection");
    Err(CliError::new(TRANSPORT_ERROR, format!("connect failed: {reason}")))
}

fn dispatch<T: Transport>(
    client: &CameraClient<T>,
    command: Command,
    format: OutputFormat,
) -> CliResult<i32> {
    match command {
        Command::Status => query::status(client, format),
        Command::Config => query::config(client, format),
        Command::SetConfig(args) => config::run(client, args, format),
        Command::Image(args) => image::run(client, args, format),
        Command::Telemetry => image::telemetry(client, format),
        Command::CciGet(args) => cci::get(client, args, format),
        Command::CciSet(args) => cci::set(client, args, format),
        Command::Spot => spot::read(client, format),
        Command::SetSpotmeter(args) => spot::set(client, args, format),
        Command::Stream(args) => stream::run(client, args, format),
        Command::Ffc => query::ffc(client, format),
        Command::Wifi => query::wifi(client, format),
        Command::Version(_) => Err(CliError::new(INTERNAL, "version needs no camera")),
    }
}

/// Accept `19660`, `0x4ECC` or `0X4ecc`.
pub fn parse_register(input: &str) -> Result<u16, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid register: {input}"))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
