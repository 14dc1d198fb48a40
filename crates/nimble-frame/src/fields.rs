//! Bit layout of the 7-byte frame.
//!
//! Byte 0 carries five flag bits under the system type. Bytes 2 and 4 carry
//! the high magnitude bits and sign of position and force; the top three
//! bits of byte 2 are the node type and those of byte 4 are reserved.

/// System type of this protocol family, stored in bits 5-7 of byte 0.
pub const SYSTEM_TYPE: u8 = 0b100;

/// Shift of the 3-bit tag fields (system type, node type, reserved).
pub const TAG_SHIFT: u8 = 5;

/// Node type of frames sent by the pendant.
pub const NODE_PENDANT: u8 = 0b000;

/// Node type of frames sent by the actuator.
pub const NODE_ACTUATOR: u8 = 0b001;

/// Largest encodable magnitude of position and force.
pub const MAGNITUDE_MAX: u16 = 0x3FF;

/// Sign bit in the high byte of a magnitude pair.
pub const SIGN_BIT: u8 = 0b100;

/// High magnitude bits in the high byte of a magnitude pair.
pub const HIGH_BITS: u8 = 0b11;

// Byte 0 flags shared by both roles.
pub const FLAG_ACTIVATED: u8 = 1 << 0;
pub const FLAG_AIR_SPRING: u8 = 1 << 3;

// Byte 0 flags of actuator frames.
pub const FLAG_SENSOR_FAULT: u8 = 1 << 1;
pub const FLAG_TEMP_LIMIT: u8 = 1 << 2;

// Byte 0 flags of pendant frames.
pub const FLAG_AIR_OUT: u8 = 1 << 1;
pub const FLAG_AIR_IN: u8 = 1 << 2;
pub const FLAG_SET_EXTEN: u8 = 1 << 4;

/// Returns the 3-bit tag stored in the top of `byte`.
pub fn tag(byte: u8) -> u8 {
    byte >> TAG_SHIFT
}

/// Returns a human-readable name for a node type tag.
pub fn node_name(tag: u8) -> &'static str {
    match tag {
        NODE_PENDANT => "PENDANT",
        NODE_ACTUATOR => "ACTUATOR",
        _ => "INVALID",
    }
}
