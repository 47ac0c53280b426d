use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_line, LineConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete lines to any `Write` stream.
pub struct LineWriter<T> {
    inner: T,
    buf: BytesMut,
    config: LineConfig,
}

impl<T: Write> LineWriter<T> {
    /// Create a new line writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LineConfig::default())
    }

    /// Create a new line writer with explicit configuration.
    pub fn with_config(inner: T, config: LineConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Frame and send one payload (blocking).
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_line_len + 1 {
            return Err(FrameError::LineTooLong {
                size: payload.len(),
                max: self.config.max_line_len,
            });
        }

        self.buf.clear();
        encode_line(payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_single_line() {
        let mut wire = Vec::new();
        LineWriter::new(&mut wire)
            .send(b"{\"command\":\"emergency_stop\"}")
            .unwrap();

        assert_eq!(wire, b"{\"command\":\"emergency_stop\"}\n");
    }

    #[test]
    fn write_multiple_lines() {
        let mut wire = Vec::new();
        let mut writer = LineWriter::new(&mut wire);
        writer.send(b"a").unwrap();
        writer.send(b"b\n").unwrap();
        drop(writer);

        assert_eq!(wire, b"a\nb\n");
    }

    #[test]
    fn write_rejects_oversized_payload() {
        let cfg = LineConfig { max_line_len: 4 };
        let mut writer = LineWriter::with_config(Vec::<u8>::new(), cfg);
        let err = writer.send(b"0123456789").unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { size: 10, max: 4 }));
    }

    #[test]
    fn write_zero_reports_closed() {
        let mut writer = LineWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
