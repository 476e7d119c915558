use serde_json::{json, Value};
use tcam_client::image::{HEIGHT, WIDTH};
use tcam_client::{CameraClient, Telemetry, ThermalImage, Transport};

use crate::cmd::ImageArgs;
use crate::exit::{
    check_reply, client_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS,
};
use crate::output::{print_fields, OutputFormat};

pub fn run<T: Transport>(
    client: &CameraClient<T>,
    args: ImageArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let frame = client
        .get_image(None)
        .map_err(|err| client_error("get_image", err))?;
    let frame = check_reply("get_image", frame)?;
    let image = ThermalImage::from_message(&frame)
        .map_err(|err| CliError::new(DATA_INVALID, format!("get_image: {err}")))?;

    if let Some(path) = &args.output {
        let text = serde_json::to_string(&frame)
            .map_err(|err| CliError::new(DATA_INVALID, format!("encode frame: {err}")))?;
        std::fs::write(path, text).map_err(|err| {
            CliError::new(FAILURE, format!("write {}: {err}", path.display()))
        })?;
    }

    print_fields(image_fields(&image), format);
    Ok(SUCCESS)
}

pub fn telemetry<T: Transport>(client: &CameraClient<T>, format: OutputFormat) -> CliResult<i32> {
    let image = client
        .capture(None)
        .map_err(|err| client_error("get_image", err))?;
    let telemetry = image
        .telemetry()
        .ok_or_else(|| CliError::new(DATA_INVALID, "frame carries no telemetry"))?;
    print_fields(telemetry_fields(telemetry), format);
    Ok(SUCCESS)
}

pub fn image_fields(image: &ThermalImage) -> Vec<(&'static str, Value)> {
    let (min, max) = image.min_max();
    let mut fields = vec![
        ("width", json!(WIDTH)),
        ("height", json!(HEIGHT)),
        ("min", json!(min)),
        ("max", json!(max)),
        ("center", json!(image.pixel(HEIGHT / 2, WIDTH / 2))),
    ];
    if let Some(celsius) = image.pixel_celsius(HEIGHT / 2, WIDTH / 2) {
        fields.push(("center_c", json!(round2(celsius))));
    }
    fields
}

fn telemetry_fields(telemetry: &Telemetry) -> Vec<(&'static str, Value)> {
    vec![
        ("fpa_temp_c", json!(round2(telemetry.fpa_temp_celsius()))),
        ("housing_temp_c", json!(round2(telemetry.housing_temp_celsius()))),
        ("emissivity", json!(round2(telemetry.emissivity()))),
        ("gain_mode", json!(telemetry.gain_mode().to_string())),
        (
            "effective_gain_mode",
            json!(telemetry.effective_gain_mode().to_string()),
        ),
        ("tlinear_enabled", json!(telemetry.tlinear_enabled())),
        ("tlinear_resolution", json!(telemetry.tlinear_resolution())),
        ("spotmeter_c", json!(round2(telemetry.spotmeter_celsius()))),
    ]
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
