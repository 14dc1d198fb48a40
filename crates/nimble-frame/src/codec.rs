use crate::error::{FrameError, Result};
use crate::fields::{
    node_name, tag, FLAG_ACTIVATED, FLAG_AIR_IN, FLAG_AIR_OUT, FLAG_AIR_SPRING, FLAG_SENSOR_FAULT,
    FLAG_SET_EXTEN, FLAG_TEMP_LIMIT, HIGH_BITS, MAGNITUDE_MAX, NODE_ACTUATOR, NODE_PENDANT,
    SIGN_BIT, SYSTEM_TYPE, TAG_SHIFT,
};

/// Size of every frame on the wire.
pub const FRAME_LEN: usize = 7;

const BODY_LEN: usize = 5;
const FLAG_MASK: u8 = 0x1F;

/// Which node sent a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Pendant,
    Actuator,
}

impl NodeType {
    /// Map a 3-bit node type tag to a role. Unrecognized tags return `None`.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            NODE_PENDANT => Some(Self::Pendant),
            NODE_ACTUATOR => Some(Self::Actuator),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Pendant => NODE_PENDANT,
            Self::Actuator => NODE_ACTUATOR,
        }
    }

    pub fn name(self) -> &'static str {
        node_name(self.bits())
    }
}

/// A pendant frame: the command sent to the actuator, or one observed on the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendantCommand {
    pub activated: bool,
    pub air_out: bool,
    pub air_in: bool,
    pub air_spring: bool,
    pub set_exten: bool,
    /// Desired position, -1023..=1023.
    pub position: i16,
    /// Force limit, -1023..=1023.
    pub force: i16,
}

impl Default for PendantCommand {
    fn default() -> Self {
        Self {
            activated: false,
            air_out: false,
            air_in: false,
            air_spring: false,
            set_exten: false,
            position: 0,
            force: MAGNITUDE_MAX as i16,
        }
    }
}

impl PendantCommand {
    fn flags(&self) -> u8 {
        flag(self.activated, FLAG_ACTIVATED)
            | flag(self.air_out, FLAG_AIR_OUT)
            | flag(self.air_in, FLAG_AIR_IN)
            | flag(self.air_spring, FLAG_AIR_SPRING)
            | flag(self.set_exten, FLAG_SET_EXTEN)
    }
}

/// A state report from the actuator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorState {
    pub activated: bool,
    pub sensor_fault: bool,
    pub temp_limit: bool,
    pub air_spring: bool,
    pub position: i16,
    pub force: i16,
}

impl ActuatorState {
    fn flags(&self) -> u8 {
        flag(self.activated, FLAG_ACTIVATED)
            | flag(self.sensor_fault, FLAG_SENSOR_FAULT)
            | flag(self.temp_limit, FLAG_TEMP_LIMIT)
            | flag(self.air_spring, FLAG_AIR_SPRING)
    }
}

/// A decoded frame, tagged by the node that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedState {
    Actuator(ActuatorState),
    Pendant(PendantCommand),
}

impl DecodedState {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Actuator(_) => NodeType::Actuator,
            Self::Pendant(_) => NodeType::Pendant,
        }
    }

    pub fn activated(&self) -> bool {
        match self {
            Self::Actuator(s) => s.activated,
            Self::Pendant(s) => s.activated,
        }
    }

    pub fn air_spring(&self) -> bool {
        match self {
            Self::Actuator(s) => s.air_spring,
            Self::Pendant(s) => s.air_spring,
        }
    }

    pub fn position(&self) -> i16 {
        match self {
            Self::Actuator(s) => s.position,
            Self::Pendant(s) => s.position,
        }
    }

    pub fn force(&self) -> i16 {
        match self {
            Self::Actuator(s) => s.force,
            Self::Pendant(s) => s.force,
        }
    }
}

/// What to do with a position or force whose magnitude exceeds 1023.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangePolicy {
    /// Refuse to encode. Nothing reaches the wire.
    #[default]
    Reject,
    /// Clamp to -1023..=1023.
    Saturate,
    /// Keep the low 10 bits of the magnitude, as the device firmware's own
    /// pendant does. Out-of-range values wrap silently.
    Mask,
}

impl RangePolicy {
    /// Apply the policy to one field.
    pub fn limit(self, field: &'static str, value: i16) -> Result<i16> {
        let max = MAGNITUDE_MAX as i16;
        match self {
            Self::Mask => Ok(value),
            Self::Saturate => Ok(value.clamp(-max, max)),
            Self::Reject if value.unsigned_abs() > MAGNITUDE_MAX => {
                Err(FrameError::OutOfRange { field, value })
            }
            Self::Reject => Ok(value),
        }
    }

    /// Apply the policy to position and force of a command.
    pub fn apply(self, cmd: &PendantCommand) -> Result<PendantCommand> {
        Ok(PendantCommand {
            position: self.limit("position", cmd.position)?,
            force: self.limit("force", cmd.force)?,
            ..*cmd
        })
    }

    /// Apply the policy to position and force of either role.
    pub fn apply_state(self, state: &DecodedState) -> Result<DecodedState> {
        match state {
            DecodedState::Pendant(cmd) => self.apply(cmd).map(DecodedState::Pendant),
            DecodedState::Actuator(s) => Ok(DecodedState::Actuator(ActuatorState {
                position: self.limit("position", s.position)?,
                force: self.limit("force", s.force)?,
                ..*s
            })),
        }
    }
}

/// Why a 7-byte buffer is not a frame.
///
/// Expected while scanning for alignment; never a failure by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("checksum mismatch")]
    Checksum,
    #[error("system type is not 0b100")]
    SystemType,
    #[error("reserved bits set")]
    Reserved,
    #[error("unknown node type")]
    NodeType,
}

/// Encode a pendant command.
///
/// Wire format:
/// ```text
/// ┌─────────────┬──────────────┬───────────────────┬──────────────┬───────────────────┬──────────────┐
/// │ byte 0      │ byte 1       │ byte 2            │ byte 3       │ byte 4            │ bytes 5-6    │
/// │ sys | flags │ position lo  │ node|sign|pos hi  │ force lo     │ 000|sign|force hi │ sum (LE)     │
/// └─────────────┴──────────────┴───────────────────┴──────────────┴───────────────────┴──────────────┘
/// ```
///
/// Never fails: magnitudes are masked to 10 bits. Use
/// [`encode_pendant_checked`] to reject or clamp out-of-range values instead.
pub fn encode_pendant(cmd: &PendantCommand) -> [u8; FRAME_LEN] {
    assemble(cmd.flags(), NodeType::Pendant, cmd.position, cmd.force)
}

/// Encode a pendant command after applying `policy` to position and force.
pub fn encode_pendant_checked(
    cmd: &PendantCommand,
    policy: RangePolicy,
) -> Result<[u8; FRAME_LEN]> {
    let cmd = policy.apply(cmd)?;
    Ok(encode_pendant(&cmd))
}

/// Encode a frame of either role. Magnitudes are masked like [`encode_pendant`].
pub fn encode_state(state: &DecodedState) -> [u8; FRAME_LEN] {
    match state {
        DecodedState::Pendant(cmd) => encode_pendant(cmd),
        DecodedState::Actuator(s) => assemble(s.flags(), NodeType::Actuator, s.position, s.force),
    }
}

/// Validate a buffer without decoding it.
///
/// Checks run cheapest and most selective first: checksum, system type,
/// reserved bits, node type.
pub fn check_frame(frame: &[u8; FRAME_LEN]) -> std::result::Result<NodeType, Rejection> {
    let expected = u16::from_le_bytes([frame[5], frame[6]]);
    if checksum(&frame[..BODY_LEN]) != expected {
        return Err(Rejection::Checksum);
    }
    if tag(frame[0]) != SYSTEM_TYPE {
        return Err(Rejection::SystemType);
    }
    if tag(frame[4]) != 0 {
        return Err(Rejection::Reserved);
    }
    NodeType::from_bits(tag(frame[2])).ok_or(Rejection::NodeType)
}

/// Decode a frame.
///
/// Returns `None` when the buffer is not a valid frame.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Option<DecodedState> {
    let node = check_frame(frame).ok()?;
    Some(decode_valid(frame, node))
}

/// Decode a slice that should hold exactly one frame.
pub fn decode_slice(bytes: &[u8]) -> Option<DecodedState> {
    let frame: &[u8; FRAME_LEN] = bytes.try_into().ok()?;
    decode_frame(frame)
}

/// Decode a buffer that already passed [`check_frame`] as `node`.
pub(crate) fn decode_valid(frame: &[u8; FRAME_LEN], node: NodeType) -> DecodedState {
    let flags = frame[0];
    let position = get_magnitude(frame[1], frame[2]);
    let force = get_magnitude(frame[3], frame[4]);
    match node {
        NodeType::Actuator => DecodedState::Actuator(ActuatorState {
            activated: flags & FLAG_ACTIVATED != 0,
            sensor_fault: flags & FLAG_SENSOR_FAULT != 0,
            temp_limit: flags & FLAG_TEMP_LIMIT != 0,
            air_spring: flags & FLAG_AIR_SPRING != 0,
            position,
            force,
        }),
        NodeType::Pendant => DecodedState::Pendant(PendantCommand {
            activated: flags & FLAG_ACTIVATED != 0,
            air_out: flags & FLAG_AIR_OUT != 0,
            air_in: flags & FLAG_AIR_IN != 0,
            air_spring: flags & FLAG_AIR_SPRING != 0,
            set_exten: flags & FLAG_SET_EXTEN != 0,
            position,
            force,
        }),
    }
}

fn assemble(flags: u8, node: NodeType, position: i16, force: i16) -> [u8; FRAME_LEN] {
    let (position_lo, position_hi) = put_magnitude(position);
    let (force_lo, force_hi) = put_magnitude(force);

    let mut frame = [0u8; FRAME_LEN];
    frame[0] = (flags & FLAG_MASK) | (SYSTEM_TYPE << TAG_SHIFT);
    frame[1] = position_lo;
    frame[2] = position_hi | (node.bits() << TAG_SHIFT);
    frame[3] = force_lo;
    frame[4] = force_hi;

    let sum = checksum(&frame[..BODY_LEN]);
    frame[BODY_LEN..].copy_from_slice(&sum.to_le_bytes());
    frame
}

fn checksum(body: &[u8]) -> u16 {
    body.iter().map(|&b| u16::from(b)).sum()
}

fn put_magnitude(value: i16) -> (u8, u8) {
    let magnitude = value.unsigned_abs() & MAGNITUDE_MAX;
    let sign = if value < 0 { SIGN_BIT } else { 0 };
    let high = ((magnitude >> 8) as u8) & HIGH_BITS;
    ((magnitude & 0xFF) as u8, sign | high)
}

fn get_magnitude(low: u8, high: u8) -> i16 {
    let magnitude = ((u16::from(low) | (u16::from(high) << 8)) & MAGNITUDE_MAX) as i16;
    if high & SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn flag(set: bool, bit: u8) -> u8 {
    if set {
        bit
    } else {
        0
    }
}
