use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Which transport variant a session uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Serial,
    #[default]
    Tcp,
    Udp,
}

impl TransportKind {
    /// Transport name for diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Serial => "serial",
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a transport name is not `serial`, `tcp` or `udp`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transport {0:?} (expected serial, tcp or udp)")]
pub struct UnknownTransportKind(pub String);

impl FromStr for TransportKind {
    type Err = UnknownTransportKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(TransportKind::Serial),
            "tcp" => Ok(TransportKind::Tcp),
            "udp" => Ok(TransportKind::Udp),
            _ => Err(UnknownTransportKind(s.to_string())),
        }
    }
}

/// Something that happened on an open session.
#[derive(Debug)]
pub enum TransportEvent {
    /// One complete inbound message (line or datagram), delimiter stripped.
    Frame(Bytes),
    /// The session failed and is now closed. Delivered at most once.
    Error(TransportError),
}

/// Callback receiving session events.
///
/// Invoked from the session's I/O thread, never from inside
/// [`TransportSession::send`] or [`TransportSession::close`].
pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// An open connection to the robot.
pub trait TransportSession: Send {
    /// Variant of this session.
    fn kind(&self) -> TransportKind;

    /// Queue one encoded message for transmission.
    ///
    /// Never blocks. Data is dropped (and logged) when the session is not
    /// open or its outbound queue is full.
    fn send(&self, payload: &[u8]);

    /// Whether the session can currently send.
    fn is_open(&self) -> bool;

    /// Close the session and stop its I/O threads. Idempotent.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("TCP".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
        assert_eq!(" udp".parse::<TransportKind>().unwrap(), TransportKind::Udp);
        assert_eq!(
            "Serial".parse::<TransportKind>().unwrap(),
            TransportKind::Serial
        );
        assert!("can".parse::<TransportKind>().is_err());
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TransportKind::Serial).unwrap(),
            "\"serial\""
        );
        let kind: TransportKind = serde_json::from_str("\"udp\"").unwrap();
        assert_eq!(kind, TransportKind::Udp);
    }
}
