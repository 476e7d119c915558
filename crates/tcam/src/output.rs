use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::{Map, Value};
use tcam_client::Message;

/// Strings longer than this are summarized in table output.
const CELL_LIMIT: usize = 64;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print a camera reply.
pub fn print_message(message: &Message, format: OutputFormat) {
    print_object(message.as_map(), format);
}

/// Print named values as one object.
pub fn print_fields(fields: Vec<(&str, Value)>, format: OutputFormat) {
    let map: Map<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    print_object(&map, format);
}

fn print_object(map: &Map<String, Value>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => {
            println!(
                "{}",
                serde_json::to_string_pretty(map).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, value) in flatten(map) {
                table.add_row(vec![key, cell(&value)]);
            }
            println!("{table}");
        }
    }
}

/// Nested objects become dotted keys.
fn flatten(map: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut rows = Vec::new();
    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                for (inner_key, inner_value) in flatten(inner) {
                    rows.push((format!("{key}.{inner_key}"), inner_value));
                }
            }
            other => rows.push((key.clone(), other.clone())),
        }
    }
    rows
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(text) if text.len() > CELL_LIMIT => format!("<{} chars>", text.len()),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
