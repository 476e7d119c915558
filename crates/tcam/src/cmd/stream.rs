use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tcam_client::{CameraClient, ClientError, StreamOptions, ThermalImage, Transport};
use tracing::{debug, warn};

use crate::cmd::image::image_fields;
use crate::cmd::StreamArgs;
use crate::exit::{check_reply, client_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_fields, OutputFormat};

/// How often the frame wait checks for Ctrl-C.
const POLL: Duration = Duration::from_millis(250);

pub fn run<T: Transport>(
    client: &CameraClient<T>,
    args: StreamArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let options = StreamOptions {
        delay_msec: args.delay_ms,
        num_frames: args.count.unwrap_or(0),
    };
    let reply = client
        .start_stream(options)
        .map_err(|err| client_error("stream_on", err))?;
    check_reply("stream_on", reply)?;

    let mut received = 0u32;
    let result = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(SUCCESS);
        }
        let frame = match client.next_frame(Some(POLL)) {
            Ok(frame) => frame,
            Err(ClientError::Timeout(_)) => continue,
            Err(err) => break Err(client_error("stream", err)),
        };
        if let Err(err) = check_reply("stream", frame.clone()) {
            break Err(err);
        }

        received = received.saturating_add(1);
        match ThermalImage::from_message(&frame) {
            Ok(image) => {
                let mut fields = image_fields(&image);
                fields.push(("frame", json!(received)));
                print_fields(fields, format);
            }
            Err(err) => warn!(frame = received, error = %err, "undecodable frame"),
        }

        if args.count.is_some_and(|count| received >= count) {
            break Ok(SUCCESS);
        }
    };

    if let Err(err) = client.stop_stream() {
        debug!(error = %err, "stream_off not acknowledged");
    }
    result
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
