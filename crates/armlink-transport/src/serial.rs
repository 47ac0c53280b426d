use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::config::SerialConfig;
use crate::error::ConnectError;
use crate::stream::{StreamSession, READ_POLL_INTERVAL};
use crate::traits::{EventHandler, TransportKind};

/// Open a serial port (8N1, no flow control) and start its I/O threads.
pub fn open(config: &SerialConfig, handler: EventHandler) -> Result<StreamSession, ConnectError> {
    if config.port.trim().is_empty() {
        return Err(ConnectError::InvalidConfig(
            "serial port name is empty".to_string(),
        ));
    }
    if config.baud_rate == 0 {
        return Err(ConnectError::InvalidConfig(
            "serial baud rate must be non-zero".to_string(),
        ));
    }

    let port = serialport::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(READ_POLL_INTERVAL)
        .open()
        .map_err(|source| ConnectError::Serial {
            port: config.port.clone(),
            source,
        })?;
    let writer = port.try_clone().map_err(|source| ConnectError::Serial {
        port: config.port.clone(),
        source,
    })?;

    let session = StreamSession::spawn(
        TransportKind::Serial,
        format!("{}@{}", config.port, config.baud_rate),
        port,
        writer,
        handler,
        None,
    )?;
    Ok(session)
}
