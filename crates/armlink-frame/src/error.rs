/// Errors that can occur while framing lines on a byte stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A line exceeded the configured maximum length before its delimiter.
    #[error("line too long ({size} bytes, max {max})")]
    LineTooLong { size: usize, max: usize },

    /// An outbound payload contains the line delimiter and cannot be framed.
    #[error("payload contains an embedded newline at offset {0}")]
    EmbeddedDelimiter(usize),

    /// An I/O error occurred while reading or writing lines.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed by the remote end.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors produced when an inbound payload cannot be decoded.
///
/// Decoding is lenient about *fields*; only payloads that are not a JSON
/// object at all are rejected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload is valid JSON but not an object.
    #[error("payload is not a JSON object (found {0})")]
    NotAnObject(&'static str),
}
