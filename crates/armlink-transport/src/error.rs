use std::time::Duration;

use armlink_frame::FrameError;

/// Errors that prevent a session from opening.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The host name could not be resolved.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    /// The TCP connection was refused or failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The TCP connection did not complete within the configured bound.
    #[error("connection to {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    /// The UDP socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// The serial port could not be opened.
    #[error("failed to open serial port {port}: {source}")]
    Serial {
        port: String,
        source: serialport::Error,
    },

    /// The socket opened but could not be prepared for use.
    #[error("transport setup failed: {0}")]
    Io(#[from] std::io::Error),

    /// The connection settings are unusable.
    #[error("invalid connection settings: {0}")]
    InvalidConfig(String),
}

/// Errors raised on an open session.
///
/// These are reported through the session's event handler, at most once per
/// session, after which the session is closed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// Line framing failed on a stream transport.
    #[error("framing error: {0}")]
    Frame(FrameError),
}

impl From<FrameError> for TransportError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ConnectionClosed => TransportError::Closed,
            FrameError::Io(io) => TransportError::Io(io),
            other => TransportError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_map_to_transport_errors() {
        assert!(matches!(
            TransportError::from(FrameError::ConnectionClosed),
            TransportError::Closed
        ));
        assert!(matches!(
            TransportError::from(FrameError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionReset
            ))),
            TransportError::Io(_)
        ));
        assert!(matches!(
            TransportError::from(FrameError::EmbeddedDelimiter(3)),
            TransportError::Frame(_)
        ));
    }

    #[test]
    fn timeout_message_names_address() {
        let err = ConnectError::Timeout {
            addr: "10.0.0.9:8080".into(),
            timeout: Duration::from_millis(3000),
        };
        assert_eq!(
            err.to_string(),
            "connection to 10.0.0.9:8080 timed out after 3s"
        );
    }
}
