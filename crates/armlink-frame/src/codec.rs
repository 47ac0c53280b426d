use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Line delimiter used by stream transports.
pub const DELIMITER: u8 = b'\n';

/// Default maximum line length (without delimiter): 64 KiB.
pub const DEFAULT_MAX_LINE: usize = 64 * 1024;

/// Encode a payload as one line on the wire.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────┬──────┐
/// │ Payload (UTF-8 JSON object)  │ '\n' │
/// └──────────────────────────────┴──────┘
/// ```
///
/// A payload that already ends with a single `\n` is written as-is.
pub fn encode_line(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let body = payload.strip_suffix(b"\n").unwrap_or(payload);
    if let Some(offset) = body.iter().position(|&b| b == DELIMITER) {
        return Err(FrameError::EmbeddedDelimiter(offset));
    }
    dst.reserve(body.len() + 1);
    dst.put_slice(body);
    dst.put_u8(DELIMITER);
    Ok(())
}

/// Incremental line decoder.
///
/// A line longer than `max_line` is reported once as
/// [`FrameError::LineTooLong`]; its remaining bytes are dropped through the
/// next delimiter, even when they arrive in later reads.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    max_line: usize,
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_line: usize) -> Self {
        Self {
            max_line,
            discarding: false,
        }
    }

    /// Decode the next complete line from a buffer.
    ///
    /// Returns `Ok(None)` if the buffer doesn't contain a complete line yet.
    /// On success the line and its delimiter are consumed; the returned bytes
    /// have the trailing `\r\n`/`\n` stripped. Blank lines are skipped.
    pub fn decode_line(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == DELIMITER) else {
                if self.discarding {
                    src.clear();
                    return Ok(None);
                }
                if src.len() > self.max_line {
                    let size = src.len();
                    src.clear();
                    self.discarding = true;
                    return Err(FrameError::LineTooLong {
                        size,
                        max: self.max_line,
                    });
                }
                return Ok(None); // Need more data
            };

            let mut line = src.split_to(pos + 1);
            if self.discarding {
                // Tail of an oversized line.
                self.discarding = false;
                continue;
            }
            line.truncate(strip_line_ending(&line).len());

            if line.len() > self.max_line {
                return Err(FrameError::LineTooLong {
                    size: line.len(),
                    max: self.max_line,
                });
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Ok(Some(line.freeze()));
        }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

/// Strip a trailing `\n` or `\r\n` from a datagram or line.
pub fn strip_line_ending(data: &[u8]) -> &[u8] {
    let data = data.strip_suffix(b"\n").unwrap_or(data);
    data.strip_suffix(b"\r").unwrap_or(data)
}

/// Configuration for line framing on blocking streams.
///
/// Timeouts belong to the underlying stream; set them there.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Maximum line length in bytes. Default: 64 KiB.
    pub max_line_len: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE,
        }
    }
}
