//! Serial link transport for the nimble actuator protocol.
//!
//! This is the lowest layer of nimble. It opens a serial port (by name or by
//! discovery) and hands out a [`SerialLink`], a plain `Read + Write` handle
//! with a bounded read timeout. Everything else builds on top of it.

pub mod error;
pub mod link;

pub use error::{Result, TransportError};
pub use link::{
    available_ports, LinkConfig, PortKind, PortSummary, SerialLink, DEFAULT_BAUD_RATE,
    DEFAULT_READ_TIMEOUT,
};
pub use serialport::ErrorKind as SerialErrorKind;
