//! Serial frame protocol for the nimble linear actuator and its pendant.
//!
//! nimble exchanges fixed 7-byte frames with the actuator over a serial
//! link: it encodes pendant commands, decodes actuator and pendant frames,
//! and recovers frame alignment in the undelimited byte stream.
//!
//! # Crate Structure
//!
//! - [`transport`]: Serial link (open, discover, list ports)
//! - [`frame`]: Frame codec and resynchronizing reader
//! - [`session`]: Device session, state cache and pacer (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use nimble_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use nimble_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use nimble_session::*;
}
