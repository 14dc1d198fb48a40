//! Device session management for the nimble actuator protocol.
//!
//! This is the "just works" layer. Open the serial link, send pendant
//! commands, receive decoded frames, and keep the last state seen from
//! each node for observers on other threads.

pub mod cache;
pub mod config;
pub mod connector;
pub mod error;
pub mod pacer;
pub mod session;

pub use cache::{Observed, Snapshot, StateCache};
pub use config::SessionConfig;
pub use connector::{open, open_with_config};
pub use error::{Result, SessionError};
pub use pacer::{Pacer, PacerConfig, WaitStrategy, DEFAULT_PERIOD};
pub use session::{Session, SessionReader, SessionWriter};
