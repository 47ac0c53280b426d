use std::io::IsTerminal;

use armlink_frame::now_millis;
use armlink_robot::{JointConfig, RobotStatus};
use armlink_transport::TransportKind;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
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

/// Result of a one-shot command sent to the robot.
#[derive(Debug, Serialize)]
pub struct ActionOutput {
    pub action: &'static str,
    pub transport: TransportKind,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joint: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    timestamp: u64,
    #[serde(flatten)]
    status: &'a RobotStatus,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn print_action(out: &ActionOutput, format: OutputFormat) {
    let joint = out.joint.map_or_else(|| "all".to_string(), |j| j.to_string());
    let value = out.value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    match format {
        OutputFormat::Json => println!("{}", to_json(out)),
        OutputFormat::Table => {
            let mut table = new_table();
            table
                .set_header(vec!["ACTION", "TRANSPORT", "ENDPOINT", "JOINT", "VALUE"])
                .add_row(vec![
                    out.action.to_string(),
                    out.transport.to_string(),
                    out.endpoint.clone(),
                    joint,
                    value,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} joint={} value={} via {} {}",
                out.action, joint, value, out.transport, out.endpoint
            );
        }
    }
}

pub fn print_joints(joints: &[JointConfig], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(&joints)),
        OutputFormat::Table => {
            let mut table = new_table();
            table.set_header(vec!["ID", "NAME", "GROUP", "MIN", "MAX"]);
            for joint in joints {
                table.add_row(vec![
                    joint.id.to_string(),
                    joint.name.clone(),
                    joint.group.to_string(),
                    format!("{:.1}", joint.min_angle),
                    format!("{:.1}", joint.max_angle),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for joint in joints {
                println!(
                    "{:>2} {:<12} {:<10} [{}, {}]",
                    joint.id, joint.name, joint.group, joint.min_angle, joint.max_angle
                );
            }
        }
    }
}

pub fn print_status(status: &RobotStatus, joints: &[JointConfig], format: OutputFormat) {
    let battery = status
        .battery_level
        .map_or_else(|| "unknown".to_string(), |b| format!("{b:.1}%"));
    let error = status.error_message.as_deref().unwrap_or("-");

    match format {
        OutputFormat::Json => println!(
            "{}",
            to_json(&StatusOutput {
                timestamp: now_millis(),
                status,
            })
        ),
        OutputFormat::Table => {
            let mut summary = new_table();
            summary
                .set_header(vec!["CONNECTED", "E-STOP", "BATTERY", "ERROR"])
                .add_row(vec![
                    status.connected.to_string(),
                    status.emergency_stop.to_string(),
                    battery,
                    error.to_string(),
                ]);
            println!("{summary}");

            let mut table = new_table();
            table.set_header(vec!["ID", "NAME", "POSITION", "VELOCITY", "TORQUE"]);
            for joint in joints {
                let id = joint.id;
                table.add_row(vec![
                    id.to_string(),
                    joint.name.clone(),
                    cell(&status.joint_positions, id),
                    cell(&status.joint_velocities, id),
                    cell(&status.joint_torques, id),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let positions: Vec<String> = status
                .joint_positions
                .iter()
                .map(|p| format!("{p:.1}"))
                .collect();
            println!(
                "connected={} estop={} battery={} error={} positions=[{}]",
                status.connected,
                status.emergency_stop,
                battery,
                error,
                positions.join(" ")
            );
        }
    }
}

fn cell(values: &[f64], id: usize) -> String {
    values
        .get(id)
        .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}
