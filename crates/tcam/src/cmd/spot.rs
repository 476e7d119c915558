use serde_json::json;
use tcam_client::{CameraClient, Spotmeter, Transport};

use crate::cmd::query::show;
use crate::cmd::SpotmeterArgs;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_fields, OutputFormat};

pub fn read<T: Transport>(client: &CameraClient<T>, format: OutputFormat) -> CliResult<i32> {
    let celsius = client
        .spotmeter_celsius()
        .map_err(|err| client_error("spotmeter", err))?;
    print_fields(vec![("spotmeter_c", json!(celsius))], format);
    Ok(SUCCESS)
}

pub fn set<T: Transport>(
    client: &CameraClient<T>,
    args: SpotmeterArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let region = Spotmeter {
        c1: args.c1,
        c2: args.c2,
        r1: args.r1,
        r2: args.r2,
    };
    show("set_spotmeter", client.set_spotmeter(&region), format)
}
