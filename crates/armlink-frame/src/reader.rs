use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::{LineConfig, LineDecoder};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete lines from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete lines.
/// When the underlying stream has a read timeout, the timeout surfaces as
/// `FrameError::Io` (`TimedOut`/`WouldBlock`) and any partially received line
/// stays buffered for the next call.
pub struct LineReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: LineDecoder,
}

impl<T: Read> LineReader<T> {
    /// Create a new line reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LineConfig::default())
    }

    /// Create a new line reader with explicit configuration.
    pub fn with_config(inner: T, config: LineConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoder: LineDecoder::new(config.max_line_len),
        }
    }

    /// Read the next complete line (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_line(&mut self) -> Result<Bytes> {
        loop {
            if let Some(line) = self.decoder.decode_line(&mut self.buf)? {
                return Ok(line);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }
}

/// Returns true if the error is a read timeout rather than a broken stream.
pub fn is_timeout(err: &FrameError) -> bool {
    matches!(
        err,
        FrameError::Io(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
    )
}
