use tracing::info;

use crate::config::TransportConfig;
use crate::error::ConnectError;
use crate::traits::{EventHandler, TransportSession};
use crate::{serial, tcp, udp};

/// Open a session for the given settings (blocking).
///
/// TCP blocks for at most the configured connect timeout. Serial and UDP
/// return as soon as the port is opened or the socket is bound.
pub fn open(
    config: &TransportConfig,
    handler: EventHandler,
) -> Result<Box<dyn TransportSession>, ConnectError> {
    info!(transport = %config.kind(), endpoint = %config.endpoint(), "opening session");
    let session: Box<dyn TransportSession> = match config {
        TransportConfig::Serial(c) => Box::new(serial::open(c, handler)?),
        TransportConfig::Tcp(c) => Box::new(tcp::connect(c, handler)?),
        TransportConfig::Udp(c) => Box::new(udp::bind(c, handler)?),
    };
    Ok(session)
}
