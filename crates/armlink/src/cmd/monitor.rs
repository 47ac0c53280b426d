use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use armlink_robot::{LinkEvent, DEFAULT_TICK_INTERVAL_MS};
use crossbeam_channel::RecvTimeoutError;
use tracing::warn;

use crate::cmd::connection::{connect, parse_duration};
use crate::cmd::{install_ctrlc_handler, ConnectionArgs, MonitorArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_status, OutputFormat};

// Upper bound on how long Ctrl-C can go unnoticed.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let link = connect(conn, Some(DEFAULT_TICK_INTERVAL_MS))?;
    let events = link.subscribe();
    let joints = link.joints();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut next = Instant::now() + interval;

    while running.load(Ordering::SeqCst) {
        let wait = next
            .saturating_duration_since(Instant::now())
            .min(POLL_INTERVAL);
        match events.recv_timeout(wait) {
            Ok(LinkEvent::ConnectionChanged(false)) => {
                let reason = link
                    .status()
                    .error_message
                    .unwrap_or_else(|| "connection closed".to_string());
                return Err(CliError::new(
                    TRANSPORT_ERROR,
                    format!("link lost: {reason}"),
                ));
            }
            Ok(LinkEvent::Error(message)) => warn!(error = %message, "link error"),
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(INTERNAL, "link event channel closed"));
            }
        }

        if Instant::now() >= next {
            print_status(&link.status(), &joints, format);
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                break;
            }
            next += interval;
        }
    }

    link.disconnect();
    Ok(SUCCESS)
}
