use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use tagwire_codec::{Codec, Value, WireKind};

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

#[derive(Serialize)]
struct MessageOutput {
    peer: String,
    kind: String,
    payload_size: usize,
    value: serde_json::Value,
    timestamp: String,
}

/// Print one received message. The value is shown in its wire form.
pub fn print_message(codec: &Codec, peer: SocketAddr, value: &Value, format: OutputFormat) {
    let wire = render(codec, value);
    let size = serde_json::to_vec(&wire).map(|v| v.len()).unwrap_or(0);

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                peer: peer.to_string(),
                kind: kind_label(value),
                payload_size: size,
                value: wire,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "KIND", "SIZE", "VALUE"])
                .add_row(vec![
                    peer.to_string(),
                    kind_label(value),
                    size.to_string(),
                    wire.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "peer={} kind={} size={}\n{}",
                peer,
                kind_label(value),
                size,
                serde_json::to_string_pretty(&wire).unwrap_or_else(|_| wire.to_string())
            );
        }
    }
}

fn render(codec: &Codec, value: &Value) -> serde_json::Value {
    codec
        .encode(value)
        .unwrap_or_else(|err| serde_json::Value::String(format!("<unrenderable: {err}>")))
}

/// Short name for the top-level wire kind of a value.
pub fn kind_label(value: &Value) -> String {
    match (WireKind::of(value), value) {
        (WireKind::Custom, Value::Custom(custom)) => custom.kind.clone(),
        (kind, _) => match kind.tag() {
            Some(tag) => tag.to_string(),
            None => match kind {
                WireKind::NestedList => "array".to_string(),
                WireKind::ComplexInline => "complex".to_string(),
                _ => "json".to_string(),
            },
        },
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
