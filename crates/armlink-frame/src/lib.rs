//! Newline framing and JSON command/telemetry codec for armlink.
//!
//! Every message on the wire is a single compact JSON object terminated by
//! `\n` (stream transports) or carried alone in one datagram (UDP):
//!
//! ```text
//! {"command":"position","joint":5,"value":42.5,"timestamp":1712345678901}\n
//! ```
//!
//! This crate owns both halves of that contract: the line framing used by
//! stream transports ([`LineReader`], [`LineWriter`], [`LineDecoder`]) and the
//! command/telemetry codec ([`encode`], [`decode`]).

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_line, strip_line_ending, LineConfig, LineDecoder, DEFAULT_MAX_LINE, DELIMITER,
};
pub use error::{DecodeError, FrameError, Result};
pub use message::{decode, encode, encode_at, now_millis, Command, CommandKind, Telemetry};
pub use reader::{is_timeout, LineReader};
pub use writer::LineWriter;
