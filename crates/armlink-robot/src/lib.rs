//! Robot link and command/state synchronization.
//!
//! This is the layer a console talks to. [`RobotLink`] owns one transport
//! session, validates and clamps joint commands against the
//! [`JointRegistry`], applies inbound telemetry, runs the periodic status tick
//! and publishes [`LinkEvent`]s to every subscriber.

pub mod battery;
pub mod config;
pub mod error;
pub mod events;
pub mod joints;
pub mod link;
pub mod status;

pub use battery::{BatterySimulator, BatterySource, BATTERY_HIGH, BATTERY_LOW, BATTERY_START};
pub use config::{LinkConfig, DEFAULT_TICK_INTERVAL_MS};
pub use error::{LinkError, Result};
pub use events::LinkEvent;
pub use joints::{JointConfig, JointGroup, JointRegistry, JOINT_COUNT};
pub use link::RobotLink;
pub use status::{ConnectionState, RobotStatus};
