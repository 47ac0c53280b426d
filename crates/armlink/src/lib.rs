//! Robot link and command/state synchronization for a 21-joint wheeled-arm robot.
//!
//! armlink connects an operator console to the robot over a serial port, TCP
//! or UDP, encodes joint and mode commands as newline-delimited JSON, applies
//! inbound telemetry and republishes a consistent robot state to observers.
//!
//! # Crate Structure
//!
//! - [`frame`]: line framing and the JSON command/telemetry codec
//! - [`transport`]: serial, TCP and UDP sessions behind one trait
//! - [`robot`]: joint registry, robot status and the [`RobotLink`](robot::RobotLink)
//! - [`simulator`]: a TCP robot stand-in (behind the `simulator` feature)

/// Re-export frame types.
pub mod frame {
    pub use armlink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use armlink_transport::*;
}

/// Re-export robot link types.
pub mod robot {
    pub use armlink_robot::*;
}

#[cfg(feature = "simulator")]
pub mod simulator;
