use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use armlink::simulator::{DEFAULT_BIND, DEFAULT_RATE_HZ};
use armlink_transport::TransportKind;
use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod connection;
pub mod enable;
pub mod joints;
pub mod monitor;
pub mod motion;
pub mod safety;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the joint table.
    Joints,
    /// Connect and print status snapshots.
    Monitor(MonitorArgs),
    /// Send a position, velocity or torque command to one joint.
    Move(MoveArgs),
    /// Engage the emergency stop.
    Estop,
    /// Clear the emergency stop and return every joint to zero.
    Reset,
    /// Enable one joint, or all joints.
    Enable(JointTargetArgs),
    /// Disable one joint, or all joints.
    Disable(JointTargetArgs),
    /// Run the robot simulator.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Joints => joints::run(format),
        Command::Monitor(args) => monitor::run(args, conn, format),
        Command::Move(args) => motion::run(args, conn, format),
        Command::Estop => safety::estop(conn, format),
        Command::Reset => safety::reset(conn, format),
        Command::Enable(args) => enable::run(args, true, conn, format),
        Command::Disable(args) => enable::run(args, false, conn, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Where and how to reach the robot. Flags override the settings file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// Connection settings file (JSON).
    #[arg(long, value_name = "FILE", env = "ARMLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Transport: serial, tcp or udp.
    #[arg(long, value_name = "KIND", env = "ARMLINK_TRANSPORT", global = true)]
    pub transport: Option<TransportKind>,
    /// Robot host for TCP and UDP.
    #[arg(long, env = "ARMLINK_HOST", global = true)]
    pub host: Option<String>,
    /// Robot port for TCP and UDP.
    #[arg(long, env = "ARMLINK_PORT", global = true)]
    pub port: Option<u16>,
    /// Local UDP port to bind (defaults to the robot port).
    #[arg(long, value_name = "PORT", env = "ARMLINK_LOCAL_PORT", global = true)]
    pub local_port: Option<u16>,
    /// Serial device (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, value_name = "DEVICE", env = "ARMLINK_SERIAL_PORT", global = true)]
    pub serial_port: Option<String>,
    /// Serial baud rate.
    #[arg(long, env = "ARMLINK_BAUD", global = true)]
    pub baud: Option<u32>,
    /// TCP connect timeout (e.g. 3s, 500ms).
    #[arg(
        long,
        value_name = "DURATION",
        env = "ARMLINK_CONNECT_TIMEOUT",
        global = true
    )]
    pub connect_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Exit after printing N snapshots.
    #[arg(long)]
    pub count: Option<usize>,
    /// Time between snapshots (e.g. 1s, 200ms).
    #[arg(long, default_value = "200ms")]
    pub interval: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MoveKind {
    #[default]
    Position,
    Velocity,
    Torque,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Joint id (0-20).
    pub joint: usize,
    /// Target angle, velocity or torque.
    #[arg(allow_negative_numbers = true)]
    pub value: f64,
    /// What VALUE sets.
    #[arg(long, value_enum, default_value_t = MoveKind::Position)]
    pub kind: MoveKind,
}

#[derive(Args, Debug)]
pub struct JointTargetArgs {
    /// Joint id (0-20). All joints when omitted.
    #[arg(long)]
    pub joint: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_BIND)]
    pub bind: String,
    /// Telemetry messages per second.
    #[arg(long, default_value_t = DEFAULT_RATE_HZ)]
    pub rate_hz: f64,
    /// Report exact joint positions instead of adding feedback noise.
    #[arg(long)]
    pub no_noise: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
