//! Fixed-size frame codec for the nimble actuator protocol.
//!
//! Every frame is exactly 7 bytes:
//! - 1 byte of role flags plus the 3-bit system type
//! - 2 bytes of sign-magnitude position (node type in the top bits)
//! - 2 bytes of sign-magnitude force (reserved top bits)
//! - a 2-byte little-endian additive checksum
//!
//! The stream has no delimiter. [`FrameReader`] finds frame boundaries by
//! sliding a 7-byte window until the checksum and structural fields agree.

pub mod codec;
pub mod error;
pub mod fields;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    check_frame, decode_frame, decode_slice, encode_pendant, encode_pendant_checked,
    encode_state, ActuatorState, DecodedState, NodeType, PendantCommand, RangePolicy, Rejection,
    FRAME_LEN,
};
pub use error::{FrameError, Result};
pub use fields::{MAGNITUDE_MAX, SYSTEM_TYPE};
pub use reader::{FrameReader, ReadLimit, ReaderStats};
pub use writer::{FrameWriter, WriterConfig};

#[cfg(feature = "async")]
pub use async_codec::NimbleCodec;
