use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use armlink_frame::{decode, encode, Command};
use armlink_transport::{
    ConnectError, ConnectionSettings, EventHandler, TransportConfig, TransportEvent,
    TransportKind, TransportSession,
};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::battery::{BatterySimulator, BatterySource};
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::events::{EventBus, LinkEvent};
use crate::joints::{JointConfig, JointRegistry};
use crate::status::{ConnectionState, RobotStatus};

/// Owns the connection to one robot and keeps its state in sync.
///
/// All state lives behind a single mutex. Transport callbacks and the tick
/// thread take the same lock, so mutations never interleave and events are
/// published in mutation order. The lock is never held across a blocking
/// connect or while a session is being closed.
///
/// ```no_run
/// use armlink_robot::{LinkEvent, RobotLink};
///
/// let link = RobotLink::new();
/// let events = link.subscribe();
/// link.set_tcp_connection("192.168.1.50", 8080);
/// link.connect()?;
/// link.set_joint_position(5, 42.5)?;
/// while let Ok(event) = events.recv() {
///     if let LinkEvent::StatusUpdated(status) = event {
///         println!("battery: {:?}", status.battery_level);
///     }
/// }
/// # Ok::<(), armlink_robot::LinkError>(())
/// ```
pub struct RobotLink {
    shared: Arc<Shared>,
    ticker: Option<Ticker>,
    opener: Opener,
}

/// Opens one transport session. Called without the link lock held.
type Opener = Box<
    dyn Fn(
            &TransportConfig,
            EventHandler,
        ) -> std::result::Result<Box<dyn TransportSession>, ConnectError>
        + Send
        + Sync,
>;

struct Shared {
    core: Mutex<LinkCore>,
}

struct LinkCore {
    registry: JointRegistry,
    status: RobotStatus,
    state: ConnectionState,
    settings: ConnectionSettings,
    battery: BatterySimulator,
    battery_source: BatterySource,
    /// Set once the robot reports a battery level on the current connection.
    wire_battery: bool,
    session: Option<Box<dyn TransportSession>>,
    /// Bumped on every connect and disconnect; callbacks from older sessions
    /// are ignored.
    generation: u64,
    events: EventBus,
}

impl RobotLink {
    /// Create a link with default settings and a 50 ms status tick.
    pub fn new() -> Self {
        Self::with_config(LinkConfig::default())
    }

    pub fn with_config(config: LinkConfig) -> Self {
        Self::with_opener(config, Box::new(armlink_transport::open))
    }

    fn with_opener(config: LinkConfig, opener: Opener) -> Self {
        let tick_interval = config.tick_interval();
        let registry = JointRegistry::new();
        let status = RobotStatus::new(registry.len());
        let shared = Arc::new(Shared {
            core: Mutex::new(LinkCore {
                registry,
                status,
                state: ConnectionState::Disconnected,
                settings: config.settings,
                battery: BatterySimulator::new(),
                battery_source: config.battery_source,
                wire_battery: false,
                session: None,
                generation: 0,
                events: EventBus::default(),
            }),
        });
        let ticker = tick_interval
            .and_then(|interval| Ticker::spawn(Arc::downgrade(&shared), interval));
        Self {
            shared,
            ticker,
            opener,
        }
    }

    /// Connect using the configured settings.
    ///
    /// Returns `Ok(())` immediately if already connected. On failure the link
    /// stays disconnected.
    pub fn connect(&self) -> Result<()> {
        let config = self.shared.core.lock().settings.resolve();
        self.connect_with(config)
    }

    /// Connect using explicit transport settings.
    pub fn connect_with(&self, config: TransportConfig) -> Result<()> {
        let generation = {
            let mut core = self.shared.core.lock();
            match core.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => return Err(LinkError::ConnectInProgress),
                ConnectionState::Disconnected => {}
            }
            core.generation += 1;
            core.state = ConnectionState::Connecting;
            core.generation
        };

        let opened = (self.opener)(&config, self.event_handler(generation));

        let mut core = self.shared.core.lock();
        if core.generation != generation {
            drop(core);
            info!(endpoint = %config.endpoint(), "connect cancelled by disconnect");
            if let Ok(mut session) = opened {
                session.close();
            }
            return Err(LinkError::Cancelled);
        }

        let mut session = match opened {
            Ok(session) => session,
            Err(err) => {
                core.state = ConnectionState::Disconnected;
                warn!(endpoint = %config.endpoint(), error = %err, "connect failed");
                return Err(err.into());
            }
        };

        if !session.is_open() {
            core.generation += 1;
            core.state = ConnectionState::Disconnected;
            drop(core);
            session.close();
            return Err(LinkError::ClosedWhileConnecting);
        }

        core.session = Some(session);
        core.state = ConnectionState::Connected;
        core.status.connected = true;
        core.wire_battery = false;
        core.events.publish(LinkEvent::ConnectionChanged(true));
        info!(transport = %config.kind(), endpoint = %config.endpoint(), "connected");
        Ok(())
    }

    /// Close the session (if any) and go to Disconnected. Idempotent.
    ///
    /// An in-flight [`connect`](Self::connect) returns [`LinkError::Cancelled`].
    pub fn disconnect(&self) {
        let session = {
            let mut core = self.shared.core.lock();
            core.generation += 1;
            let was = core.state;
            core.mark_disconnected();
            if was != ConnectionState::Disconnected {
                info!(from = %was, "disconnected");
            }
            core.session.take()
        };
        if let Some(mut session) = session {
            session.close();
        }
    }

    /// Build the callback for a session opened under `generation`.
    fn event_handler(&self, generation: u64) -> EventHandler {
        let weak = Arc::downgrade(&self.shared);
        Arc::new(move |event: TransportEvent| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let failed_session = {
                let mut core = shared.core.lock();
                if core.generation != generation {
                    debug!(generation, "ignoring event from stale session");
                    return;
                }
                match event {
                    TransportEvent::Frame(payload) => {
                        core.apply_frame(&payload);
                        None
                    }
                    // connect_with sees the closed session and reports it.
                    TransportEvent::Error(_) if core.state == ConnectionState::Connecting => None,
                    TransportEvent::Error(err) => {
                        core.generation += 1;
                        let session = core.session.take();
                        core.fail(err.to_string());
                        session
                    }
                }
            };
            // Closed outside the lock; this may run on the session's own thread.
            if let Some(mut session) = failed_session {
                session.close();
            }
        })
    }

    pub fn set_joint_position(&self, joint: usize, angle: f64) -> Result<f64> {
        self.shared.core.lock().set_joint_position(joint, angle)
    }

    pub fn set_joint_velocity(&self, joint: usize, velocity: f64) -> Result<()> {
        self.shared.core.lock().set_joint_velocity(joint, velocity)
    }

    pub fn set_joint_torque(&self, joint: usize, torque: f64) -> Result<()> {
        let mut core = self.shared.core.lock();
        core.registry.validate(joint)?;
        core.status.joint_torques[joint] = torque;
        core.send(&Command::torque(joint, torque));
        core.events
            .publish(LinkEvent::JointTorqueChanged { joint, torque });
        Ok(())
    }

    /// Latch the emergency stop, tell the robot, then zero every joint velocity.
    pub fn emergency_stop(&self) {
        let mut core = self.shared.core.lock();
        core.status.emergency_stop = true;
        core.send(&Command::emergency_stop());
        for joint in 0..core.registry.len() {
            let _ = core.set_joint_velocity(joint, 0.0);
        }
        warn!("emergency stop");
    }

    /// Clear the emergency stop and drive every joint to zero.
    pub fn reset_to_zero_position(&self) {
        let mut core = self.shared.core.lock();
        core.status.emergency_stop = false;
        for joint in 0..core.registry.len() {
            let _ = core.set_joint_position(joint, 0.0);
        }
        core.send(&Command::reset_zero());
        info!("reset to zero position");
    }

    pub fn enable_joint(&self, joint: usize) -> Result<()> {
        self.shared.core.lock().set_joint_enabled(joint, true)
    }

    pub fn disable_joint(&self, joint: usize) -> Result<()> {
        self.shared.core.lock().set_joint_enabled(joint, false)
    }

    pub fn enable_all_joints(&self) {
        self.shared.core.lock().set_all_enabled(true);
    }

    pub fn disable_all_joints(&self) {
        self.shared.core.lock().set_all_enabled(false);
    }

    /// Run one status tick: advance the battery while connected and publish
    /// a status snapshot.
    pub fn tick(&self) {
        self.shared.core.lock().tick();
    }

    pub fn subscribe(&self) -> Receiver<LinkEvent> {
        self.shared.core.lock().events.subscribe()
    }

    /// Number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.shared.core.lock().events.len()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.core.lock().state
    }

    pub fn status(&self) -> RobotStatus {
        self.shared.core.lock().status.clone()
    }

    pub fn get_joint_position(&self, joint: usize) -> Result<f64> {
        self.shared.core.lock().registry.current_angle(joint)
    }

    pub fn get_joint_config(&self, joint: usize) -> Result<JointConfig> {
        self.shared
            .core
            .lock()
            .registry
            .snapshot(joint)
            .ok_or(LinkError::OutOfRangeJoint(joint))
    }

    /// Copies of all joints in id order.
    pub fn joints(&self) -> Vec<JointConfig> {
        self.shared.core.lock().registry.iter().cloned().collect()
    }

    pub fn joint_count(&self) -> usize {
        self.shared.core.lock().registry.len()
    }

    pub fn settings(&self) -> ConnectionSettings {
        self.shared.core.lock().settings.clone()
    }

    /// Replace all connection settings. Takes effect on the next connect.
    pub fn set_settings(&self, settings: ConnectionSettings) {
        self.shared.core.lock().settings = settings;
    }

    pub fn set_connection_type(&self, kind: TransportKind) {
        self.shared.core.lock().settings.kind = kind;
    }

    pub fn set_serial_port(&self, port: impl Into<String>, baud_rate: u32) {
        let mut core = self.shared.core.lock();
        core.settings.serial.port = port.into();
        core.settings.serial.baud_rate = baud_rate;
    }

    pub fn set_tcp_connection(&self, host: impl Into<String>, port: u16) {
        let mut core = self.shared.core.lock();
        core.settings.tcp.host = host.into();
        core.settings.tcp.port = port;
    }

    pub fn set_udp_connection(&self, host: impl Into<String>, port: u16) {
        let mut core = self.shared.core.lock();
        core.settings.udp.host = host.into();
        core.settings.udp.port = port;
    }

    pub fn battery_source(&self) -> BatterySource {
        self.shared.core.lock().battery_source
    }
}

impl Default for RobotLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RobotLink {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
        let session = self.shared.core.lock().session.take();
        if let Some(mut session) = session {
            session.close();
        }
    }
}

impl std::fmt::Debug for RobotLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.shared.core.lock();
        f.debug_struct("RobotLink")
            .field("state", &core.state)
            .field("transport", &core.settings.kind)
            .field("subscribers", &core.events.len())
            .finish()
    }
}

impl LinkCore {
    /// Send if connected; otherwise the command only updates local state.
    fn send(&self, command: &Command) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Some(session) = &self.session {
            debug!(kind = %command.kind, joint = ?command.joint, value = ?command.value, "sending command");
            session.send(&encode(command));
        }
    }

    fn set_joint_position(&mut self, joint: usize, angle: f64) -> Result<f64> {
        let position = self.registry.set_current_angle(joint, angle)?;
        self.status.joint_positions[joint] = position;
        self.send(&Command::position(joint, position));
        self.events
            .publish(LinkEvent::JointPositionChanged { joint, position });
        Ok(position)
    }

    fn set_joint_velocity(&mut self, joint: usize, velocity: f64) -> Result<()> {
        self.registry.validate(joint)?;
        self.status.joint_velocities[joint] = velocity;
        self.send(&Command::velocity(joint, velocity));
        self.events
            .publish(LinkEvent::JointVelocityChanged { joint, velocity });
        Ok(())
    }

    fn set_joint_enabled(&mut self, joint: usize, enabled: bool) -> Result<()> {
        self.registry.set_enabled(joint, enabled)?;
        let command = if enabled {
            Command::enable(Some(joint))
        } else {
            Command::disable(Some(joint))
        };
        self.send(&command);
        self.events
            .publish(LinkEvent::JointEnabledChanged { joint, enabled });
        Ok(())
    }

    fn set_all_enabled(&mut self, enabled: bool) {
        self.registry.set_all_enabled(enabled);
        let command = if enabled {
            Command::enable(None)
        } else {
            Command::disable(None)
        };
        self.send(&command);
        for joint in 0..self.registry.len() {
            self.events
                .publish(LinkEvent::JointEnabledChanged { joint, enabled });
        }
    }

    fn tick(&mut self) {
        if self.state == ConnectionState::Connected && self.simulates_battery() {
            self.status.battery_level = Some(self.battery.advance());
        }
        self.events
            .publish(LinkEvent::StatusUpdated(self.status.clone()));
    }

    fn simulates_battery(&self) -> bool {
        match self.battery_source {
            BatterySource::Simulated => true,
            BatterySource::Reported => false,
            BatterySource::Auto => !self.wire_battery,
        }
    }

    fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.status.connected = false;
        self.status.battery_level = None;
        self.events.publish(LinkEvent::ConnectionChanged(false));
    }

    /// Mid-session transport failure.
    fn fail(&mut self, message: String) {
        warn!(error = %message, "transport error, link disconnected");
        self.status.error_message = Some(message.clone());
        self.events.publish(LinkEvent::Error(message));
        self.mark_disconnected();
    }

    /// Apply one inbound message. Malformed payloads are logged and dropped.
    fn apply_frame(&mut self, payload: &[u8]) {
        let telemetry = match decode(payload) {
            Ok(telemetry) => telemetry,
            Err(err) => {
                warn!(error = %err, len = payload.len(), "dropping malformed frame");
                return;
            }
        };

        let count = self.registry.len();
        let mut moved = Vec::new();

        if let Some(joints) = &telemetry.joints {
            for (joint, value) in joints.iter().enumerate().take(count) {
                let Some(value) = value else { continue };
                if let Ok(position) = self.registry.set_current_angle(joint, *value) {
                    self.status.joint_positions[joint] = position;
                    moved.push((joint, position));
                }
            }
        }
        if let Some(velocities) = &telemetry.velocities {
            for (joint, value) in velocities.iter().enumerate().take(count) {
                if let Some(value) = value {
                    self.status.joint_velocities[joint] = *value;
                }
            }
        }
        if let Some(torques) = &telemetry.torques {
            for (joint, value) in torques.iter().enumerate().take(count) {
                if let Some(value) = value {
                    self.status.joint_torques[joint] = *value;
                }
            }
        }
        if let Some(enabled) = &telemetry.enabled {
            for (joint, value) in enabled.iter().enumerate().take(count) {
                if let Some(value) = value {
                    let _ = self.registry.set_enabled(joint, *value);
                }
            }
        }
        if let Some(level) = telemetry.battery {
            self.status.battery_level = Some(level.clamp(0.0, 100.0));
            self.wire_battery = true;
        }
        if let Some(message) = telemetry.error {
            self.status.error_message = (!message.is_empty()).then_some(message);
        }
        if telemetry.emergency_stop == Some(true) {
            self.status.emergency_stop = true;
        }

        for (joint, position) in moved {
            self.events
                .publish(LinkEvent::JointPositionChanged { joint, position });
        }
        self.events
            .publish(LinkEvent::StatusUpdated(self.status.clone()));
    }
}

/// Dedicated status tick thread.
///
/// Sleeps, then locks and ticks, so ticks never overlap. Holds only a weak
/// reference and exits once the link is gone.
struct Ticker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn spawn(shared: Weak<Shared>, interval: Duration) -> Option<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name("armlink-tick".into())
            .spawn(move || loop {
                let deadline = Instant::now() + interval;
                loop {
                    if thread_stop.load(Ordering::Acquire) {
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::park_timeout(deadline - now);
                }
                let Some(link) = shared.upgrade() else {
                    return;
                };
                link.core.lock().tick();
            });
        match spawned {
            Ok(handle) => Some(Self { stop, handle }),
            Err(err) => {
                warn!(error = %err, "failed to start status tick thread");
                None
            }
        }
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Release);
        self.handle.thread().unpark();
        if self.handle.join().is_err() {
            warn!("status tick thread panicked");
        }
    }
}
