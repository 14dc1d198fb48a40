use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nimble_frame::{encode_state, DecodedState, FRAME_LEN};
use nimble_transport::PortSummary;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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

/// Role flags are only present for the role that owns them.
#[derive(Serialize)]
struct StateOutput {
    node: &'static str,
    activated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensor_fault: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_limit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    air_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    air_in: Option<bool>,
    air_spring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    set_exten: Option<bool>,
    position: i16,
    force: i16,
    timestamp: String,
}

impl StateOutput {
    fn new(state: &DecodedState) -> Self {
        let mut out = Self {
            node: node_label(state),
            activated: state.activated(),
            sensor_fault: None,
            temp_limit: None,
            air_out: None,
            air_in: None,
            air_spring: state.air_spring(),
            set_exten: None,
            position: state.position(),
            force: state.force(),
            timestamp: now_unix_millis(),
        };
        match state {
            DecodedState::Actuator(s) => {
                out.sensor_fault = Some(s.sensor_fault);
                out.temp_limit = Some(s.temp_limit);
            }
            DecodedState::Pendant(s) => {
                out.air_out = Some(s.air_out);
                out.air_in = Some(s.air_in);
                out.set_exten = Some(s.set_exten);
            }
        }
        out
    }
}

pub fn print_state(state: &DecodedState, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&StateOutput::new(state)).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NODE", "FLAGS", "POSITION", "FORCE"])
                .add_row(vec![
                    node_label(state).to_string(),
                    flag_names(state).join(","),
                    state.position().to_string(),
                    state.force().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "node={} flags=[{}] position={} force={}",
                node_label(state),
                flag_names(state).join(","),
                state.position(),
                state.force()
            );
        }
        OutputFormat::Raw => {
            print_raw(&encode_state(state));
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    node: &'static str,
    bytes: &'a [u8],
    hex: String,
}

pub fn print_frame(frame: &[u8; FRAME_LEN], state: &DecodedState, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                node: node_label(state),
                bytes: frame,
                hex: hex(frame),
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
                .set_header(vec!["BYTE", "VALUE", "BITS"]);
            for (i, byte) in frame.iter().enumerate() {
                table.add_row(vec![
                    i.to_string(),
                    format!("0x{byte:02X}"),
                    format!("{byte:08b}"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", hex(frame)),
        OutputFormat::Raw => print_raw(frame),
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'static str,
    description: Option<&'a str>,
}

pub fn print_ports(ports: &[PortSummary], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|p| PortOutput {
                    name: &p.name,
                    kind: p.kind.as_str(),
                    description: p.description.as_deref(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.as_str().to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!("{} ({})", port.name, port.kind.as_str());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn node_label(state: &DecodedState) -> &'static str {
    match state {
        DecodedState::Actuator(_) => "actuator",
        DecodedState::Pendant(_) => "pendant",
    }
}

fn flag_names(state: &DecodedState) -> Vec<&'static str> {
    let mut names = Vec::new();
    if state.activated() {
        names.push("activated");
    }
    match state {
        DecodedState::Actuator(s) => {
            if s.sensor_fault {
                names.push("sensor_fault");
            }
            if s.temp_limit {
                names.push("temp_limit");
            }
        }
        DecodedState::Pendant(s) => {
            if s.air_out {
                names.push("air_out");
            }
            if s.air_in {
                names.push("air_in");
            }
            if s.set_exten {
                names.push("set_exten");
            }
        }
    }
    if state.air_spring() {
        names.push("air_spring");
    }
    names
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
