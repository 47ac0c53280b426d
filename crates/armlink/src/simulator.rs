//! A TCP robot stand-in that speaks the armlink wire protocol.
//!
//! The simulator keeps its own joint state with the same limits as the
//! console's [`JointRegistry`], applies every command the link sends (plus the
//! legacy whitespace-separated text commands such as `ENABLE_JOINT 3`) and
//! streams a full telemetry object to each client at a fixed rate (10 Hz by
//! default).
//!
//! ```no_run
//! use armlink::simulator::{Simulator, SimulatorConfig};
//!
//! let simulator = Simulator::bind(SimulatorConfig::default())?;
//! let handle = simulator.spawn()?;
//! println!("listening on {}", handle.local_addr());
//! handle.stop()?;
//! # Ok::<(), armlink::simulator::SimulatorError>(())
//! ```

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use armlink_frame::{
    decode, is_timeout, now_millis, strip_line_ending, CommandKind, FrameError, LineReader,
    LineWriter, Telemetry,
};
use armlink_robot::{JointRegistry, BATTERY_HIGH, BATTERY_LOW, BATTERY_START, JOINT_COUNT};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Default telemetry rate in Hz.
pub const DEFAULT_RATE_HZ: f64 = 10.0;

/// Peak position noise added to enabled joints in telemetry.
pub const NOISE_AMPLITUDE: f64 = 0.1;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);
const CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(20);
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors raised by the simulator server.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("telemetry rate must be a positive number of Hz, got {0}")]
    InvalidRate(f64),

    #[error("simulator I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("telemetry encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Address to listen on (`host:port`, port 0 picks a free one).
    pub bind: String,
    /// Telemetry messages per second, per client.
    pub rate_hz: f64,
    /// Add a small sinusoidal wobble to enabled joint positions.
    pub noise: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            rate_hz: DEFAULT_RATE_HZ,
            noise: true,
        }
    }
}

impl SimulatorConfig {
    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }
}

/// Joint and mode state held by the simulated robot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedRobot {
    pub joint_positions: Vec<f64>,
    pub joint_velocities: Vec<f64>,
    pub joint_torques: Vec<f64>,
    pub enabled: Vec<bool>,
    pub battery: f64,
    pub emergency_stop: bool,
    pub error: String,
    /// Non-empty lines received, recognised or not.
    pub commands_received: u64,
    #[serde(skip)]
    limits: Vec<(f64, f64)>,
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct TelemetryOut<'a> {
    joints: Vec<f64>,
    velocities: &'a [f64],
    torques: &'a [f64],
    enabled: &'a [bool],
    battery: f64,
    emergency_stop: bool,
    error: &'a str,
    timestamp: u64,
}

impl SimulatedRobot {
    /// All joints at zero and enabled, battery at 85 %.
    pub fn new() -> Self {
        let limits = JointRegistry::new()
            .iter()
            .map(|joint| (joint.min_angle, joint.max_angle))
            .collect();
        Self {
            joint_positions: vec![0.0; JOINT_COUNT],
            joint_velocities: vec![0.0; JOINT_COUNT],
            joint_torques: vec![0.0; JOINT_COUNT],
            enabled: vec![true; JOINT_COUNT],
            battery: BATTERY_START,
            emergency_stop: false,
            error: String::new(),
            commands_received: 0,
            limits,
        }
    }

    /// Apply one received line. Returns false if it was not a recognised command.
    pub fn apply(&mut self, line: &[u8]) -> bool {
        let line = strip_line_ending(line).trim_ascii();
        if line.is_empty() {
            return false;
        }
        self.commands_received += 1;

        if line.starts_with(b"{") {
            match decode(line) {
                Ok(message) => return self.apply_message(&message),
                Err(err) => debug!(error = %err, "not a JSON command, trying text form"),
            }
        }
        match std::str::from_utf8(line) {
            Ok(text) => self.apply_text(text),
            Err(_) => {
                warn!(len = line.len(), "ignoring non-UTF-8 command");
                false
            }
        }
    }

    fn apply_message(&mut self, message: &Telemetry) -> bool {
        let Some(kind) = message.command else {
            return false;
        };
        let joint = message
            .joint
            .and_then(|id| usize::try_from(id).ok())
            .filter(|id| *id < JOINT_COUNT);
        let value = message.value.unwrap_or(0.0);

        match (kind, joint) {
            (CommandKind::Position, Some(id)) => {
                let (min, max) = self.limits[id];
                self.joint_positions[id] = value.clamp(min, max);
            }
            (CommandKind::Velocity, Some(id)) => self.joint_velocities[id] = value,
            (CommandKind::Torque, Some(id)) => self.joint_torques[id] = value,
            (CommandKind::Enable | CommandKind::Disable, _) => {
                let enabled = kind == CommandKind::Enable;
                match (message.joint, joint) {
                    (None, _) => self.enabled.fill(enabled),
                    (Some(_), Some(id)) => self.enabled[id] = enabled,
                    (Some(_), None) => return false,
                }
            }
            (CommandKind::EmergencyStop, _) => self.emergency_stop(),
            (CommandKind::ResetZero, _) => self.reset_zero(),
            _ => return false,
        }
        debug!(command = %kind, joint = ?joint, "applied command");
        true
    }

    fn apply_text(&mut self, text: &str) -> bool {
        let mut parts = text.split_whitespace();
        let Some(verb) = parts.next() else {
            return false;
        };
        let joint = parts
            .next()
            .and_then(|arg| arg.parse::<usize>().ok())
            .filter(|id| *id < JOINT_COUNT);

        match (verb.to_ascii_uppercase().as_str(), joint) {
            ("EMERGENCY_STOP", _) => self.emergency_stop(),
            ("RESET_ZERO", _) => self.reset_zero(),
            ("ENABLE_ALL", _) => self.enabled.fill(true),
            ("DISABLE_ALL", _) => self.enabled.fill(false),
            ("ENABLE_JOINT", Some(id)) => self.enabled[id] = true,
            ("DISABLE_JOINT", Some(id)) => self.enabled[id] = false,
            _ => {
                debug!(command = text, "unrecognised text command");
                return false;
            }
        }
        true
    }

    fn emergency_stop(&mut self) {
        self.emergency_stop = true;
        self.joint_velocities.fill(0.0);
        info!("emergency stop engaged");
    }

    fn reset_zero(&mut self) {
        self.emergency_stop = false;
        self.joint_positions.fill(0.0);
        self.joint_velocities.fill(0.0);
        info!("reset to zero position");
    }

    /// Drift the battery level; `clock` is seconds since the epoch.
    pub fn step(&mut self, clock: f64) {
        self.battery =
            (self.battery + (clock * 0.1).sin() * 0.1).clamp(BATTERY_LOW, BATTERY_HIGH);
    }

    /// Telemetry object for the current state (without the trailing newline).
    ///
    /// With `noise`, enabled joints report a position offset of up to
    /// [`NOISE_AMPLITUDE`] unless the emergency stop is engaged. The stored
    /// positions are not changed.
    pub fn telemetry(&self, clock: f64, noise: bool) -> serde_json::Result<Vec<u8>> {
        let joints = self
            .joint_positions
            .iter()
            .enumerate()
            .map(|(id, position)| {
                if noise && self.enabled[id] && !self.emergency_stop {
                    position + (clock * 2.0 + id as f64).sin() * NOISE_AMPLITUDE
                } else {
                    *position
                }
            })
            .collect();

        serde_json::to_vec(&TelemetryOut {
            joints,
            velocities: &self.joint_velocities,
            torques: &self.joint_torques,
            enabled: &self.enabled,
            battery: (self.battery * 10.0).round() / 10.0,
            emergency_stop: self.emergency_stop,
            error: &self.error,
            timestamp: now_millis(),
        })
    }
}

/// A bound simulator server.
pub struct Simulator {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: SimulatorConfig,
    robot: Arc<Mutex<SimulatedRobot>>,
    running: Arc<AtomicBool>,
}

impl Simulator {
    /// Bind the listen socket. No client is accepted until [`run`](Self::run)
    /// or [`spawn`](Self::spawn).
    pub fn bind(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        if !(config.rate_hz.is_finite() && config.rate_hz > 0.0) {
            return Err(SimulatorError::InvalidRate(config.rate_hz));
        }
        // std enables SO_REUSEADDR on Unix listeners.
        let listener = TcpListener::bind(&config.bind).map_err(|source| SimulatorError::Bind {
            addr: config.bind.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            config,
            robot: Arc::new(Mutex::new(SimulatedRobot::new())),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Snapshot of the simulated robot.
    pub fn state(&self) -> SimulatedRobot {
        self.robot.lock().clone()
    }

    /// Flag that keeps [`run`](Self::run) going; store `false` to stop it.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Accept and serve clients until the running flag is cleared.
    pub fn run(&self) -> Result<(), SimulatorError> {
        info!(addr = %self.local_addr, rate_hz = self.config.rate_hz, "simulator listening");
        let mut clients: Vec<JoinHandle<()>> = Vec::new();

        let result = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    info!(%peer, "client connected");
                    let client = Client {
                        robot: Arc::clone(&self.robot),
                        running: Arc::clone(&self.running),
                        period: self.config.period(),
                        noise: self.config.noise,
                    };
                    match thread::Builder::new()
                        .name("armlink-sim-client".to_string())
                        .spawn(move || client.serve(stream, peer))
                    {
                        Ok(handle) => clients.push(handle),
                        Err(err) => break Err(SimulatorError::Io(err)),
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(err) => break Err(SimulatorError::Io(err)),
            }
            clients.retain(|handle| !handle.is_finished());
        };

        self.running.store(false, Ordering::SeqCst);
        for handle in clients {
            if handle.join().is_err() {
                warn!("client thread panicked");
            }
        }
        info!(addr = %self.local_addr, "simulator stopped");
        result
    }

    /// Run the server on a background thread.
    pub fn spawn(self) -> Result<SimulatorHandle, SimulatorError> {
        let local_addr = self.local_addr;
        let robot = Arc::clone(&self.robot);
        let running = Arc::clone(&self.running);
        let thread = thread::Builder::new()
            .name("armlink-sim".to_string())
            .spawn(move || self.run())?;

        Ok(SimulatorHandle {
            local_addr,
            robot,
            running,
            thread: Some(thread),
        })
    }
}

/// Handle to a simulator running on a background thread. Dropping it stops
/// the server.
pub struct SimulatorHandle {
    local_addr: SocketAddr,
    robot: Arc<Mutex<SimulatedRobot>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), SimulatorError>>>,
}

impl SimulatorHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Snapshot of the simulated robot.
    pub fn state(&self) -> SimulatedRobot {
        self.robot.lock().clone()
    }

    /// Stop the server, wait for its threads and report how it ended.
    pub fn stop(mut self) -> Result<(), SimulatorError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), SimulatorError> {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("simulator thread panicked").into())),
            None => Ok(()),
        }
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "simulator ended with an error");
        }
    }
}

struct Client {
    robot: Arc<Mutex<SimulatedRobot>>,
    running: Arc<AtomicBool>,
    period: Duration,
    noise: bool,
}

impl Client {
    fn serve(self, stream: TcpStream, peer: SocketAddr) {
        match self.exchange(stream) {
            Ok(()) | Err(SimulatorError::Frame(FrameError::ConnectionClosed)) => {
                info!(%peer, "client disconnected");
            }
            Err(err) => warn!(%peer, error = %err, "client connection failed"),
        }
    }

    fn exchange(&self, stream: TcpStream) -> Result<(), SimulatorError> {
        // Accepted sockets inherit the listener's non-blocking mode on some platforms.
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(CLIENT_POLL_INTERVAL))?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

        let mut writer = LineWriter::new(stream.try_clone()?);
        let mut reader = LineReader::new(stream);
        let mut next_status = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            match reader.read_line() {
                Ok(line) => {
                    if !self.robot.lock().apply(&line) {
                        debug!(len = line.len(), "ignored unrecognised command");
                    }
                }
                Err(err) if is_timeout(&err) => {}
                Err(FrameError::LineTooLong { size, max }) => {
                    warn!(size, max, "discarding oversized command");
                }
                Err(err) => return Err(err.into()),
            }

            let now = Instant::now();
            if now >= next_status {
                let clock = now_millis() as f64 / 1000.0;
                let payload = {
                    let mut robot = self.robot.lock();
                    robot.step(clock);
                    robot.telemetry(clock, self.noise)?
                };
                writer.send(&payload)?;
                next_status = now + self.period;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use armlink_frame::{encode, Command};

    use super::*;

    #[test]
    fn position_command_is_clamped_to_joint_limits() {
        let mut robot = SimulatedRobot::new();
        assert!(robot.apply(&encode(&Command::position(16, 120.0))));
        assert!(robot.apply(&encode(&Command::position(20, -5.0))));
        assert!(robot.apply(&encode(&Command::position(3, 42.5))));
        assert_eq!(robot.joint_positions[16], 90.0);
        assert_eq!(robot.joint_positions[20], 0.0);
        assert_eq!(robot.joint_positions[3], 42.5);
    }

    #[test]
    fn out_of_range_joint_is_ignored() {
        let mut robot = SimulatedRobot::new();
        let before = robot.clone();
        assert!(!robot.apply(b"{\"command\":\"velocity\",\"joint\":21,\"value\":1.0}"));
        assert!(!robot.apply(b"{\"command\":\"torque\",\"joint\":-1,\"value\":1.0}"));
        assert_eq!(robot.joint_velocities, before.joint_velocities);
        assert_eq!(robot.joint_torques, before.joint_torques);
        assert_eq!(robot.commands_received, 2);
    }

    #[test]
    fn emergency_stop_and_reset() {
        let mut robot = SimulatedRobot::new();
        robot.apply(&encode(&Command::velocity(2, 5.0)));
        robot.apply(&encode(&Command::position(2, 30.0)));

        robot.apply(&encode(&Command::emergency_stop()));
        assert!(robot.emergency_stop);
        assert!(robot.joint_velocities.iter().all(|v| *v == 0.0));
        assert_eq!(robot.joint_positions[2], 30.0);

        robot.apply(&encode(&Command::reset_zero()));
        assert!(!robot.emergency_stop);
        assert!(robot.joint_positions.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn enable_commands_target_one_or_all_joints() {
        let mut robot = SimulatedRobot::new();
        robot.apply(&encode(&Command::disable(None)));
        assert!(robot.enabled.iter().all(|e| !e));

        robot.apply(&encode(&Command::enable(Some(7))));
        assert!(robot.enabled[7]);
        assert_eq!(robot.enabled.iter().filter(|e| **e).count(), 1);

        assert!(!robot.apply(b"{\"command\":\"enable\",\"joint\":99}"));
        assert_eq!(robot.enabled.iter().filter(|e| **e).count(), 1);
    }

    #[test]
    fn text_commands_are_accepted() {
        let mut robot = SimulatedRobot::new();
        assert!(robot.apply(b"DISABLE_ALL\n"));
        assert!(robot.apply(b"enable_joint 4"));
        assert!(robot.enabled[4]);
        assert!(!robot.enabled[5]);
        assert!(robot.apply(b"EMERGENCY_STOP"));
        assert!(robot.emergency_stop);
        assert!(!robot.apply(b"ENABLE_JOINT x"));
        assert!(!robot.apply(b"   \r\n"));
    }

    #[test]
    fn telemetry_reports_full_state() {
        let mut robot = SimulatedRobot::new();
        robot.apply(&encode(&Command::position(0, 10.0)));
        robot.apply(&encode(&Command::torque(1, 0.5)));
        robot.battery = 77.54;

        let payload = robot.telemetry(0.0, false).unwrap();
        let telemetry = decode(&payload).unwrap();
        let joints = telemetry.joints.unwrap();
        assert_eq!(joints.len(), JOINT_COUNT);
        assert_eq!(joints[0], Some(10.0));
        assert_eq!(telemetry.torques.unwrap()[1], Some(0.5));
        assert_eq!(telemetry.battery, Some(77.5));
        assert_eq!(telemetry.emergency_stop, Some(false));
        assert_eq!(telemetry.error.as_deref(), Some(""));
        assert!(telemetry.timestamp.is_some());
    }

    #[test]
    fn noise_skips_disabled_joints_and_emergency_stop() {
        let mut robot = SimulatedRobot::new();
        robot.apply(b"DISABLE_JOINT 1");
        let clock = 0.3;

        let joints = decode(&robot.telemetry(clock, true).unwrap())
            .unwrap()
            .joints
            .unwrap();
        assert_eq!(joints[1], Some(0.0));
        let wobble = joints[0].unwrap();
        assert!(wobble != 0.0 && wobble.abs() <= NOISE_AMPLITUDE);
        assert_eq!(robot.joint_positions[0], 0.0);

        robot.apply(b"EMERGENCY_STOP");
        let joints = decode(&robot.telemetry(clock, true).unwrap())
            .unwrap()
            .joints
            .unwrap();
        assert!(joints.iter().all(|p| *p == Some(0.0)));
    }

    #[test]
    fn battery_drift_stays_in_bounds() {
        let mut robot = SimulatedRobot::new();
        robot.battery = 99.95;
        // sin(1.5708) is close to 1 and sin(4.712) close to -1.
        for _ in 0..10 {
            robot.step(15.708);
        }
        assert_eq!(robot.battery, BATTERY_HIGH);

        robot.battery = 20.05;
        for _ in 0..10 {
            robot.step(47.12);
        }
        assert_eq!(robot.battery, BATTERY_LOW);
    }

    #[test]
    fn bind_rejects_bad_rate() {
        let config = SimulatorConfig {
            bind: "127.0.0.1:0".into(),
            rate_hz: 0.0,
            noise: false,
        };
        assert!(matches!(
            Simulator::bind(config),
            Err(SimulatorError::InvalidRate(_))
        ));
    }

    #[test]
    fn serves_commands_and_streams_telemetry() {
        use std::io::{BufRead, BufReader, Write};

        let simulator = Simulator::bind(SimulatorConfig {
            bind: "127.0.0.1:0".into(),
            rate_hz: 50.0,
            noise: false,
        })
        .unwrap();
        let handle = simulator.spawn().unwrap();

        let mut stream = TcpStream::connect(handle.local_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(3)))
            .unwrap();
        stream
            .write_all(&encode(&Command::position(5, 42.5)))
            .unwrap();

        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let joints = decode(line.as_bytes()).unwrap().joints.unwrap();
            if joints[5] == Some(42.5) {
                break;
            }
            assert!(Instant::now() < deadline, "position never reported");
        }
        assert_eq!(handle.state().joint_positions[5], 42.5);

        drop(stream);
        handle.stop().unwrap();
    }
}
