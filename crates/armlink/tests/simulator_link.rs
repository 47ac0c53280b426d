#![cfg(feature = "simulator")]

use std::thread;
use std::time::{Duration, Instant};

use armlink::robot::{ConnectionState, LinkConfig, LinkEvent, RobotLink, RobotStatus};
use armlink::simulator::{Simulator, SimulatorConfig, SimulatorHandle};
use crossbeam_channel::Receiver;

const WAIT: Duration = Duration::from_secs(3);

fn start_simulator() -> SimulatorHandle {
    Simulator::bind(SimulatorConfig {
        bind: "127.0.0.1:0".into(),
        rate_hz: 50.0,
        noise: false,
    })
    .expect("simulator should bind")
    .spawn()
    .expect("simulator should start")
}

fn connected_link(simulator: &SimulatorHandle) -> RobotLink {
    let link = RobotLink::with_config(LinkConfig::manual_tick());
    link.set_tcp_connection("127.0.0.1", simulator.local_addr().port());
    link.connect().expect("link should connect to the simulator");
    link
}

fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn wait_for_status<F>(events: &Receiver<LinkEvent>, mut pred: F) -> RobotStatus
where
    F: FnMut(&RobotStatus) -> bool,
{
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events
            .recv_timeout(remaining)
            .expect("status update should arrive in time")
        {
            LinkEvent::StatusUpdated(status) if pred(&status) => return status,
            _ => {}
        }
    }
}

#[test]
fn link_commands_reach_simulator() {
    let simulator = start_simulator();
    let link = connected_link(&simulator);

    let applied = link
        .set_joint_position(16, 120.0)
        .expect("waist joint should accept a command");
    assert_eq!(applied, 90.0);
    assert!(wait_until(|| simulator.state().joint_positions[16] == 90.0));

    link.set_joint_velocity(3, 2.5).expect("valid joint");
    assert!(wait_until(|| simulator.state().joint_velocities[3] == 2.5));

    link.emergency_stop();
    assert!(wait_until(|| {
        let state = simulator.state();
        state.emergency_stop && state.joint_velocities.iter().all(|v| *v == 0.0)
    }));

    link.reset_to_zero_position();
    assert!(wait_until(|| {
        let state = simulator.state();
        !state.emergency_stop && state.joint_positions.iter().all(|p| *p == 0.0)
    }));

    link.disable_joint(4).expect("valid joint");
    assert!(wait_until(|| !simulator.state().enabled[4]));
    link.disable_all_joints();
    assert!(wait_until(|| simulator.state().enabled.iter().all(|e| !e)));

    link.disconnect();
    simulator.stop().expect("simulator should stop cleanly");
}

#[test]
fn simulator_telemetry_updates_link_status() {
    let simulator = start_simulator();
    let link = RobotLink::with_config(LinkConfig::manual_tick());
    let events = link.subscribe();
    link.set_tcp_connection("127.0.0.1", simulator.local_addr().port());
    link.connect().expect("link should connect to the simulator");

    link.set_joint_position(2, 30.0).expect("valid joint");

    let status = wait_for_status(&events, |s| {
        s.battery_level.is_some() && s.joint_positions[2] == 30.0
    });
    let battery = status.battery_level.expect("battery should be reported");
    assert!((20.0..=100.0).contains(&battery));
    assert!(status.connected);
    assert!(!status.emergency_stop);
    assert_eq!(status.error_message, None);

    link.disconnect();
    simulator.stop().expect("simulator should stop cleanly");
}

#[test]
fn simulator_shutdown_disconnects_link() {
    let simulator = start_simulator();
    let link = connected_link(&simulator);
    let events = link.subscribe();

    simulator.stop().expect("simulator should stop cleanly");

    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = events
            .recv_timeout(remaining)
            .expect("disconnect should be reported");
        if event == LinkEvent::ConnectionChanged(false) {
            break;
        }
    }
    assert_eq!(link.state(), ConnectionState::Disconnected);
    assert!(!link.status().connected);
    assert_eq!(link.status().battery_level, None);
}
