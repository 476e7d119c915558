use tcam_client::{CameraClient, CameraSettings, Transport};

use crate::cmd::query::show;
use crate::cmd::SetConfigArgs;
use crate::exit::CliResult;
use crate::output::OutputFormat;

pub fn run<T: Transport>(
    client: &CameraClient<T>,
    args: SetConfigArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let settings = CameraSettings {
        agc_enabled: args.agc,
        emissivity: args.emissivity,
        gain_mode: args.gain_mode.code(),
    };
    show("set_config", client.set_config(&settings), format)
}
