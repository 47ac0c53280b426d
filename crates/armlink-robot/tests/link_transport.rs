use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use armlink_frame::{decode, CommandKind};
use armlink_robot::{ConnectionState, LinkConfig, LinkError, LinkEvent, RobotLink};
use armlink_transport::{TcpConfig, TransportConfig, TransportKind, UdpConfig};
use crossbeam_channel::Receiver;

const WAIT: Duration = Duration::from_secs(3);

fn wait_for<F>(events: &Receiver<LinkEvent>, mut pred: F) -> LinkEvent
where
    F: FnMut(&LinkEvent) -> bool,
{
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = events
            .recv_timeout(remaining)
            .expect("expected event should arrive in time");
        if pred(&event) {
            return event;
        }
    }
}

fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .expect("udp bind should succeed")
        .local_addr()
        .expect("local addr should be available")
        .port()
}

#[test]
fn tcp_session_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();

    let robot = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("robot should accept");
        let mut reader = BufReader::new(stream.try_clone().expect("stream should clone"));
        let mut line = String::new();
        reader.read_line(&mut line).expect("robot should read a command");

        let mut writer = stream;
        writer
            .write_all(b"{\"joints\":[10.0,20.0],\"battery\":77.5}\n")
            .expect("robot should write telemetry");
        // Wait for the console to hang up.
        let mut rest = Vec::new();
        let _ = reader.read_to_end(&mut rest);
        line
    });

    let link = RobotLink::with_config(LinkConfig::manual_tick());
    let events = link.subscribe();
    link.set_tcp_connection("127.0.0.1", port);
    link.connect().expect("connect should succeed");
    assert!(link.is_connected());
    assert_eq!(
        events.recv_timeout(WAIT).expect("connection event"),
        LinkEvent::ConnectionChanged(true)
    );

    link.set_joint_position(5, 42.5).expect("valid joint");

    let status = match wait_for(&events, |e| matches!(e, LinkEvent::StatusUpdated(_))) {
        LinkEvent::StatusUpdated(status) => status,
        _ => unreachable!(),
    };
    assert_eq!(status.joint_positions[0], 10.0);
    assert_eq!(status.joint_positions[1], 20.0);
    assert_eq!(status.joint_positions[5], 42.5);
    assert_eq!(status.battery_level, Some(77.5));

    link.disconnect();
    let line = robot.join().expect("robot thread should finish");
    let command = decode(line.as_bytes()).expect("command should decode");
    assert_eq!(command.command, Some(CommandKind::Position));
    assert_eq!(command.joint, Some(5));
    assert_eq!(command.value, Some(42.5));
}

#[test]
fn tcp_peer_hangup_disconnects_link() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();
    let robot = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("robot should accept");
        thread::sleep(Duration::from_millis(50));
        drop(stream);
    });

    let link = RobotLink::with_config(LinkConfig::manual_tick());
    let events = link.subscribe();
    link.connect_with(TransportConfig::Tcp(TcpConfig::new("127.0.0.1", port)))
        .expect("connect should succeed");
    robot.join().expect("robot thread should finish");

    wait_for(&events, |e| matches!(e, LinkEvent::Error(_)));
    wait_for(&events, |e| *e == LinkEvent::ConnectionChanged(false));
    assert_eq!(link.state(), ConnectionState::Disconnected);
    assert!(link.status().error_message.is_some());

    // Sends after the failure are dropped, not errors.
    link.set_joint_velocity(1, 2.0).expect("valid joint");
}

#[test]
fn tcp_connect_refused_within_bound() {
    let port = TcpListener::bind("127.0.0.1:0")
        .expect("listener should bind")
        .local_addr()
        .expect("local addr")
        .port();

    let link = RobotLink::with_config(LinkConfig::manual_tick());
    link.set_tcp_connection("127.0.0.1", port);

    let start = Instant::now();
    let err = link.connect().expect_err("connect should fail");
    assert!(start.elapsed() <= Duration::from_millis(3500));
    assert!(matches!(err, LinkError::Connect(_)));
    assert_eq!(link.state(), ConnectionState::Disconnected);

    // Recoverable: the same link can connect once something listens.
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    link.set_tcp_connection("127.0.0.1", listener.local_addr().expect("addr").port());
    link.connect().expect("second connect should succeed");
    assert!(link.is_connected());
}

#[test]
fn udp_session_round_trip() {
    let robot = UdpSocket::bind("127.0.0.1:0").expect("robot socket should bind");
    robot
        .set_read_timeout(Some(WAIT))
        .expect("timeout should apply");
    let robot_port = robot.local_addr().expect("addr").port();

    let mut config = LinkConfig::manual_tick();
    config.settings.kind = TransportKind::Udp;
    config.settings.udp = UdpConfig {
        host: "127.0.0.1".into(),
        port: robot_port,
        local_port: Some(free_udp_port()),
    };
    let link = RobotLink::with_config(config);
    let events = link.subscribe();
    link.connect().expect("udp bind should succeed");

    link.emergency_stop();

    let mut buf = [0u8; 1024];
    let (len, console) = robot.recv_from(&mut buf).expect("robot should receive");
    let first = decode(&buf[..len]).expect("datagram should decode");
    assert_eq!(first.command, Some(CommandKind::EmergencyStop));

    robot
        .send_to(b"{\"error\":\"motor 3 overheated\",\"emergency_stop\":true}", console)
        .expect("robot should reply");

    let status = match wait_for(&events, |e| {
        matches!(e, LinkEvent::StatusUpdated(s) if s.error_message.is_some())
    }) {
        LinkEvent::StatusUpdated(status) => status,
        _ => unreachable!(),
    };
    assert_eq!(status.error_message.as_deref(), Some("motor 3 overheated"));
    assert!(status.emergency_stop);
    assert!(status.joint_velocities.iter().all(|v| *v == 0.0));

    link.disconnect();
    assert!(!link.is_connected());
}
