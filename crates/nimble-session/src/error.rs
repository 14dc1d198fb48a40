use std::time::Duration;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error, including failure to find or open the port.
    #[error("transport error: {0}")]
    Transport(#[from] nimble_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] nimble_frame::FrameError),

    /// No valid frame arrived in time.
    #[error("no frame received within {0:?}")]
    Timeout(Duration),

    /// The link was closed by the other side.
    #[error("device disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Map reader errors so callers can match timeouts and disconnects directly.
    pub(crate) fn from_frame(err: nimble_frame::FrameError) -> Self {
        match err {
            nimble_frame::FrameError::Timeout(timeout) => Self::Timeout(timeout),
            nimble_frame::FrameError::ConnectionClosed => Self::Disconnected,
            other => Self::Frame(other),
        }
    }
}
