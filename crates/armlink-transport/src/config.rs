use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::traits::TransportKind;

/// Default robot host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default TCP/UDP port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default TCP connect bound in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;
/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[cfg(windows)]
const DEFAULT_SERIAL_PORT: &str = "COM1";
#[cfg(not(windows))]
const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// Serial port settings. Framing is always 8N1 without flow control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// TCP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
}

impl TcpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Connect bound as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

/// UDP settings.
///
/// Datagrams are sent to `host:port`. The local socket binds `local_port`,
/// which defaults to the peer port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    pub host: String,
    pub port: u16,
    pub local_port: Option<u16>,
}

impl UdpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            local_port: None,
        }
    }

    /// Port the local socket binds.
    pub fn bind_port(&self) -> u16 {
        self.local_port.unwrap_or(self.port)
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

/// Fully resolved settings for opening one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Serial(SerialConfig),
    Tcp(TcpConfig),
    Udp(UdpConfig),
}

impl TransportConfig {
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Serial(_) => TransportKind::Serial,
            TransportConfig::Tcp(_) => TransportKind::Tcp,
            TransportConfig::Udp(_) => TransportKind::Udp,
        }
    }

    /// Human-readable endpoint (`host:port` or port name).
    pub fn endpoint(&self) -> String {
        match self {
            TransportConfig::Serial(c) => format!("{}@{}", c.port, c.baud_rate),
            TransportConfig::Tcp(c) => format!("{}:{}", c.host, c.port),
            TransportConfig::Udp(c) => format!("{}:{}", c.host, c.port),
        }
    }
}

/// Connection settings for all three variants plus the selected one.
///
/// Switching `kind` keeps the settings of the other variants, so a caller can
/// flip between transports without re-entering addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub kind: TransportKind,
    pub serial: SerialConfig,
    pub tcp: TcpConfig,
    pub udp: UdpConfig,
}

impl ConnectionSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Settings for the selected variant.
    pub fn resolve(&self) -> TransportConfig {
        match self.kind {
            TransportKind::Serial => TransportConfig::Serial(self.serial.clone()),
            TransportKind::Tcp => TransportConfig::Tcp(self.tcp.clone()),
            TransportKind::Udp => TransportConfig::Udp(self.udp.clone()),
        }
    }
}
