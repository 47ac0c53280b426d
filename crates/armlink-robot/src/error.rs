use crate::joints::JOINT_COUNT;

/// Errors returned by link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The joint id is outside `0..JOINT_COUNT`. Nothing was changed.
    #[error("joint id {0} out of range (expected 0..{JOINT_COUNT})")]
    OutOfRangeJoint(usize),

    /// The transport could not be opened.
    #[error("connect failed: {0}")]
    Connect(#[from] armlink_transport::ConnectError),

    /// The transport closed before the connection was established.
    #[error("transport closed while connecting")]
    ClosedWhileConnecting,

    /// `disconnect` was called while the connect was in flight.
    #[error("connect cancelled by disconnect")]
    Cancelled,

    /// Another connect is already in flight.
    #[error("connect already in progress")]
    ConnectInProgress,
}

pub type Result<T> = std::result::Result<T, LinkError>;
