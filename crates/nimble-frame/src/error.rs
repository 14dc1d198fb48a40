use std::time::Duration;

/// Errors that can occur during frame encoding, reading and writing.
///
/// A buffer that fails validation is not an error; see
/// [`Rejection`](crate::codec::Rejection).
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A position or force is outside the 10-bit sign-magnitude range.
    #[error("{field} {value} out of range (max magnitude 1023)")]
    OutOfRange { field: &'static str, value: i16 },

    /// No valid frame was found before the deadline.
    #[error("no valid frame received within {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
