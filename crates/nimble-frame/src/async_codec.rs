//! `tokio_util::codec` adapter for async transports.
//!
//! The decoder resynchronizes the same way [`FrameReader`](crate::FrameReader)
//! does, but has no deadline of its own; wrap the stream in
//! `tokio::time::timeout` to bound the wait.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::codec::{
    check_frame, decode_valid, encode_pendant_checked, encode_state, DecodedState,
    PendantCommand, RangePolicy, FRAME_LEN,
};
use crate::error::FrameError;

/// Frame codec for `FramedRead` / `FramedWrite`.
#[derive(Debug, Clone, Default)]
pub struct NimbleCodec {
    range_policy: RangePolicy,
    discarded: u64,
}

impl NimbleCodec {
    pub fn new(range_policy: RangePolicy) -> Self {
        Self {
            range_policy,
            discarded: 0,
        }
    }

    /// Bytes dropped while searching for frame boundaries.
    pub fn bytes_discarded(&self) -> u64 {
        self.discarded
    }
}

impl Decoder for NimbleCodec {
    type Item = DecodedState;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut skipped = 0u64;
        while src.len() >= FRAME_LEN {
            let mut window = [0u8; FRAME_LEN];
            window.copy_from_slice(&src[..FRAME_LEN]);

            match check_frame(&window) {
                Ok(node) => {
                    src.advance(FRAME_LEN);
                    if skipped > 0 {
                        debug!(
                            discarded = skipped,
                            node = node.name(),
                            "resynchronized to frame boundary"
                        );
                    }
                    return Ok(Some(decode_valid(&window, node)));
                }
                Err(rejection) => {
                    trace!(%rejection, "window is not a frame");
                    src.advance(1);
                    skipped += 1;
                    self.discarded += 1;
                }
            }
        }
        // Need more data
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(state) => Ok(Some(state)),
            None => {
                // A trailing partial frame can never complete.
                self.discarded += src.len() as u64;
                src.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<PendantCommand> for NimbleCodec {
    type Error = FrameError;

    fn encode(&mut self, item: PendantCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = encode_pendant_checked(&item, self.range_policy)?;
        dst.extend_from_slice(&frame);
        Ok(())
    }
}

impl Encoder<DecodedState> for NimbleCodec {
    type Error = FrameError;

    fn encode(&mut self, item: DecodedState, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let state = self.range_policy.apply_state(&item)?;
        dst.extend_from_slice(&encode_state(&state));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio_util::codec::FramedRead;

    use super::*;
    use crate::codec::{encode_pendant, ActuatorState};

    #[test]
    fn decode_waits_for_full_window() {
        let frame = encode_pendant(&PendantCommand::default());
        let mut codec = NimbleCodec::default();
        let mut buf = BytesMut::from(&frame[..4]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);

        buf.extend_from_slice(&frame[4..]);
        let state = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(state, DecodedState::Pendant(PendantCommand::default()));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_skips_garbage_one_byte_at_a_time() {
        let cmd = PendantCommand {
            activated: true,
            position: 99,
            ..PendantCommand::default()
        };
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF][..]);
        buf.extend_from_slice(&encode_pendant(&cmd));

        let mut codec = NimbleCodec::default();
        let state = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(state, DecodedState::Pendant(cmd));
        assert_eq!(codec.bytes_discarded(), 3);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_eof_drops_partial_tail() {
        let mut codec = NimbleCodec::default();
        let mut buf = BytesMut::from(&[0x80, 0x01][..]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
        assert_eq!(codec.bytes_discarded(), 2);
    }

    #[test]
    fn encoder_honours_range_policy() {
        let cmd = PendantCommand {
            position: -1500,
            ..PendantCommand::default()
        };

        let mut rejecting = NimbleCodec::default();
        let mut dst = BytesMut::new();
        assert!(matches!(
            rejecting.encode(cmd, &mut dst),
            Err(FrameError::OutOfRange { .. })
        ));
        assert!(dst.is_empty());

        let mut saturating = NimbleCodec::new(RangePolicy::Saturate);
        saturating.encode(cmd, &mut dst).unwrap();
        let state = saturating.decode(&mut dst).unwrap().unwrap();
        assert_eq!(state.position(), -1023);
    }

    #[test]
    fn encode_actuator_state() {
        let state = DecodedState::Actuator(ActuatorState {
            sensor_fault: true,
            position: 12,
            force: -12,
            ..ActuatorState::default()
        });
        let mut codec = NimbleCodec::default();
        let mut dst = BytesMut::new();
        codec.encode(state, &mut dst).unwrap();
        assert_eq!(codec.decode(&mut dst).unwrap(), Some(state));
    }

    #[tokio::test]
    async fn framed_read_over_async_stream() {
        let mut wire = vec![0x00, 0x13];
        for position in [1i16, -2, 3] {
            wire.extend_from_slice(&encode_pendant(&PendantCommand {
                position,
                ..PendantCommand::default()
            }));
        }

        let mut framed = FramedRead::new(&wire[..], NimbleCodec::default());
        let mut positions = Vec::new();
        while let Some(state) = framed.next().await {
            positions.push(state.unwrap().position());
        }
        assert_eq!(positions, vec![1, -2, 3]);
        assert_eq!(framed.decoder().bytes_discarded(), 2);
    }
}
