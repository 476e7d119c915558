//! Commands that print a single camera reply.

use tcam_client::{CameraClient, Message, Transport};

use crate::exit::{check_reply, client_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn status<T: Transport>(client: &CameraClient<T>, format: OutputFormat) -> CliResult<i32> {
    show("get_status", client.get_status(), format)
}

pub fn config<T: Transport>(client: &CameraClient<T>, format: OutputFormat) -> CliResult<i32> {
    show("get_config", client.get_config(), format)
}

pub fn ffc<T: Transport>(client: &CameraClient<T>, format: OutputFormat) -> CliResult<i32> {
    show("run_ffc", client.run_ffc(), format)
}

pub fn wifi<T: Transport>(client: &CameraClient<T>, format: OutputFormat) -> CliResult<i32> {
    show("get_wifi", client.get_wifi(), format)
}

pub fn show(
    context: &str,
    reply: tcam_client::Result<Message>,
    format: OutputFormat,
) -> CliResult<i32> {
    let reply = reply.map_err(|err| client_error(context, err))?;
    let reply = check_reply(context, reply)?;
    print_message(&reply, format);
    Ok(SUCCESS)
}
