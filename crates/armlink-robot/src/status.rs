use std::fmt;

use serde::Serialize;

use crate::joints::JOINT_COUNT;

/// Lifecycle of the link's transport connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// Snapshot of everything the console shows about the robot.
///
/// Joint vectors are indexed by joint id and always hold one entry per joint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotStatus {
    pub connected: bool,
    pub emergency_stop: bool,
    /// Percent, `None` while unknown.
    pub battery_level: Option<f64>,
    /// Last transport or robot-reported error.
    pub error_message: Option<String>,
    pub joint_positions: Vec<f64>,
    pub joint_velocities: Vec<f64>,
    pub joint_torques: Vec<f64>,
}

impl RobotStatus {
    pub fn new(joint_count: usize) -> Self {
        Self {
            connected: false,
            emergency_stop: false,
            battery_level: None,
            error_message: None,
            joint_positions: vec![0.0; joint_count],
            joint_velocities: vec![0.0; joint_count],
            joint_torques: vec![0.0; joint_count],
        }
    }
}

impl Default for RobotStatus {
    fn default() -> Self {
        Self::new(JOINT_COUNT)
    }
}
