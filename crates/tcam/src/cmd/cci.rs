use serde_json::json;
use tcam_client::{CameraClient, CciRegister, Transport};

use crate::cmd::query::show;
use crate::cmd::{CciGetArgs, CciSetArgs};
use crate::exit::{check_reply, client_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_fields, OutputFormat};

pub fn get<T: Transport>(
    client: &CameraClient<T>,
    args: CciGetArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let reply = client
        .get_lep_cci(args.register, args.length)
        .map_err(|err| client_error("get_lep_cci", err))?;
    let reply = check_reply("get_lep_cci", reply)?;
    let register = CciRegister::from_message(&reply)
        .map_err(|err| CliError::new(DATA_INVALID, format!("get_lep_cci: {err}")))?;
    let words = register
        .words()
        .map_err(|err| CliError::new(DATA_INVALID, format!("get_lep_cci: {err}")))?;

    print_fields(
        vec![
            ("command", json!(format!("0x{:04X}", register.command))),
            ("length", json!(register.length)),
            ("status", json!(register.status)),
            ("words", json!(words)),
        ],
        format,
    );
    Ok(SUCCESS)
}

pub fn set<T: Transport>(
    client: &CameraClient<T>,
    args: CciSetArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    show(
        "set_lep_cci",
        client.set_lep_cci(args.register, &args.values),
        format,
    )
}
