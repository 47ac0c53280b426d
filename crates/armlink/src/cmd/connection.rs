use std::fs;
use std::path::Path;
use std::time::Duration;

use armlink_robot::{JointRegistry, LinkConfig, RobotLink};
use armlink_transport::ConnectionSettings;
use tracing::debug;

use crate::cmd::ConnectionArgs;
use crate::exit::{io_error, link_error, CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::ActionOutput;

/// Settings file (if any) with command-line overrides applied.
pub fn resolve_settings(args: &ConnectionArgs) -> CliResult<ConnectionSettings> {
    let mut settings = match &args.config {
        Some(path) => load_settings(path)?,
        None => ConnectionSettings::default(),
    };

    if let Some(kind) = args.transport {
        settings.kind = kind;
    }
    if let Some(host) = &args.host {
        settings.tcp.host = host.clone();
        settings.udp.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.tcp.port = port;
        settings.udp.port = port;
    }
    if let Some(local_port) = args.local_port {
        settings.udp.local_port = Some(local_port);
    }
    if let Some(device) = &args.serial_port {
        settings.serial.port = device.clone();
    }
    if let Some(baud) = args.baud {
        settings.serial.baud_rate = baud;
    }
    if let Some(timeout) = &args.connect_timeout {
        let timeout = parse_duration(timeout)?;
        settings.tcp.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }
    Ok(settings)
}

fn load_settings(path: &Path) -> CliResult<ConnectionSettings> {
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed to read {}", path.display()), err))?;
    ConnectionSettings::from_json(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid connection settings in {}: {err}", path.display()),
        )
    })
}

/// Connect a link with the resolved settings.
///
/// `tick_interval_ms` of `None` runs no status tick, which is what one-shot
/// commands want.
pub fn connect(args: &ConnectionArgs, tick_interval_ms: Option<u64>) -> CliResult<RobotLink> {
    let settings = resolve_settings(args)?;
    let endpoint = settings.resolve().endpoint();
    debug!(transport = %settings.kind, %endpoint, "connecting");

    let link = RobotLink::with_config(LinkConfig {
        settings,
        tick_interval_ms,
        ..LinkConfig::default()
    });
    link.connect()
        .map_err(|err| link_error(&format!("connect to {endpoint} failed"), err))?;
    Ok(link)
}

/// Connect, run `send` against the link, then disconnect.
///
/// The joint id (if any) is checked before connecting so a bad id never
/// touches the robot. Disconnecting waits for queued commands to go out.
pub fn one_shot<F>(
    args: &ConnectionArgs,
    action: &'static str,
    joint: Option<usize>,
    send: F,
) -> CliResult<ActionOutput>
where
    F: FnOnce(&RobotLink) -> CliResult<Option<f64>>,
{
    if let Some(joint) = joint {
        JointRegistry::new()
            .validate(joint)
            .map_err(|err| link_error(&format!("{action} failed"), err))?;
    }

    let link = connect(args, None)?;
    let settings = link.settings();
    let result = send(&link);
    link.disconnect();

    Ok(ActionOutput {
        action,
        transport: settings.kind,
        endpoint: settings.resolve().endpoint(),
        joint,
        value: result?,
    })
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
