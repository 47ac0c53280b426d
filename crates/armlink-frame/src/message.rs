//! JSON command/telemetry codec.
//!
//! Outbound commands are strongly typed ([`Command`]) and always serialize
//! to the same compact shape. Inbound telemetry is decoded leniently into
//! [`Telemetry`]: the robot may send partial updates, so every field is
//! optional and a field with an unexpected type is treated as absent rather
//! than failing the whole payload.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{strip_line_ending, DELIMITER};
use crate::error::DecodeError;

/// Command kinds understood by the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Position,
    Velocity,
    Torque,
    Enable,
    Disable,
    EmergencyStop,
    ResetZero,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Position,
        CommandKind::Velocity,
        CommandKind::Torque,
        CommandKind::Enable,
        CommandKind::Disable,
        CommandKind::EmergencyStop,
        CommandKind::ResetZero,
    ];

    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Position => "position",
            CommandKind::Velocity => "velocity",
            CommandKind::Torque => "torque",
            CommandKind::Enable => "enable",
            CommandKind::Disable => "disable",
            CommandKind::EmergencyStop => "emergency_stop",
            CommandKind::ResetZero => "reset_zero",
        }
    }

    /// True for kinds that carry a numeric `value`.
    pub fn carries_value(self) -> bool {
        matches!(
            self,
            CommandKind::Position | CommandKind::Velocity | CommandKind::Torque
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown command kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command kind: {0}")]
pub struct UnknownCommandKind(pub String);

impl FromStr for CommandKind {
    type Err = UnknownCommandKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownCommandKind(s.to_string()))
    }
}

/// An outbound instruction for the robot.
///
/// Exists only between construction and transmission; the timestamp is
/// assigned when it is encoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    /// Target joint, `None` for broadcast commands.
    pub joint: Option<usize>,
    /// Numeric value, `None` for boolean commands.
    pub value: Option<f64>,
}

impl Command {
    pub fn position(joint: usize, angle: f64) -> Self {
        Self::joint_value(CommandKind::Position, joint, angle)
    }

    pub fn velocity(joint: usize, velocity: f64) -> Self {
        Self::joint_value(CommandKind::Velocity, joint, velocity)
    }

    pub fn torque(joint: usize, torque: f64) -> Self {
        Self::joint_value(CommandKind::Torque, joint, torque)
    }

    /// Enable one joint, or every joint when `joint` is `None`.
    pub fn enable(joint: Option<usize>) -> Self {
        Self {
            kind: CommandKind::Enable,
            joint,
            value: None,
        }
    }

    /// Disable one joint, or every joint when `joint` is `None`.
    pub fn disable(joint: Option<usize>) -> Self {
        Self {
            kind: CommandKind::Disable,
            joint,
            value: None,
        }
    }

    pub fn emergency_stop() -> Self {
        Self::broadcast(CommandKind::EmergencyStop)
    }

    pub fn reset_zero() -> Self {
        Self::broadcast(CommandKind::ResetZero)
    }

    fn joint_value(kind: CommandKind, joint: usize, value: f64) -> Self {
        Self {
            kind,
            joint: Some(joint),
            value: Some(value),
        }
    }

    fn broadcast(kind: CommandKind) -> Self {
        Self {
            kind,
            joint: None,
            value: None,
        }
    }
}

#[derive(Serialize)]
struct WireCommand {
    command: CommandKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    joint: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    timestamp: u64,
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Encode a command as one newline-terminated JSON line, stamped with the
/// current time.
pub fn encode(command: &Command) -> Bytes {
    encode_at(command, now_millis())
}

/// Encode a command with an explicit timestamp.
///
/// Non-finite values cannot be represented in JSON and are written as `null`.
pub fn encode_at(command: &Command, timestamp: u64) -> Bytes {
    let wire = WireCommand {
        command: command.kind,
        joint: command.joint,
        value: command.value,
        timestamp,
    };
    // Serializing a struct of plain fields into a Vec cannot fail.
    let mut out = serde_json::to_vec(&wire).unwrap_or_default();
    out.push(DELIMITER);
    Bytes::from(out)
}

/// Fields parsed from one inbound message.
///
/// Every field is optional; absent fields must not be applied to local state.
/// Array entries that are not of the expected type are kept as `None` so the
/// remaining entries stay index-aligned with joint ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub command: Option<CommandKind>,
    pub joint: Option<i64>,
    pub value: Option<f64>,
    pub timestamp: Option<u64>,
    pub joints: Option<Vec<Option<f64>>>,
    pub velocities: Option<Vec<Option<f64>>>,
    pub torques: Option<Vec<Option<f64>>>,
    pub enabled: Option<Vec<Option<bool>>>,
    pub battery: Option<f64>,
    pub emergency_stop: Option<bool>,
    pub error: Option<String>,
}

impl Telemetry {
    /// True when no recognised field was present.
    pub fn is_empty(&self) -> bool {
        *self == Telemetry::default()
    }
}

/// Decode one inbound line or datagram.
///
/// Fails only when the payload is not a JSON object.
pub fn decode(payload: &[u8]) -> Result<Telemetry, DecodeError> {
    let value: Value = serde_json::from_slice(strip_line_ending(payload))?;
    let obj = match value {
        Value::Object(obj) => obj,
        other => return Err(DecodeError::NotAnObject(json_type_name(&other))),
    };

    Ok(Telemetry {
        command: obj
            .get("command")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        joint: obj.get("joint").and_then(Value::as_i64),
        value: obj.get("value").and_then(Value::as_f64),
        timestamp: obj.get("timestamp").and_then(Value::as_u64),
        joints: number_array(&obj, "joints"),
        velocities: number_array(&obj, "velocities"),
        torques: number_array(&obj, "torques"),
        enabled: obj
            .get("enabled")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Value::as_bool).collect()),
        battery: obj.get("battery").and_then(Value::as_f64),
        emergency_stop: obj.get("emergency_stop").and_then(Value::as_bool),
        error: obj.get("error").and_then(Value::as_str).map(str::to_string),
    })
}

fn number_array(obj: &Map<String, Value>, key: &str) -> Option<Vec<Option<f64>>> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(Value::as_f64).collect())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
