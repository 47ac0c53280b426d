//! Transport sessions for the armlink robot link.
//!
//! Provides one interface over the three ways the console reaches a robot:
//! - Serial ports (8N1, no flow control)
//! - TCP client sockets (newline-delimited JSON)
//! - UDP datagrams (one JSON object per datagram)
//!
//! A session is opened with [`open`] and delivers inbound frames and
//! transport failures to an [`EventHandler`]. Everything above this layer
//! works with `Box<dyn TransportSession>` and never sees the concrete socket.

pub mod config;
pub mod connect;
pub mod error;
pub mod serial;
pub mod stream;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use config::{
    ConnectionSettings, SerialConfig, TcpConfig, TransportConfig, UdpConfig, DEFAULT_BAUD_RATE,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HOST, DEFAULT_PORT,
};
pub use connect::open;
pub use error::{ConnectError, Result, TransportError};
pub use stream::StreamSession;
pub use traits::{EventHandler, TransportEvent, TransportKind, TransportSession, UnknownTransportKind};
pub use udp::UdpSession;
