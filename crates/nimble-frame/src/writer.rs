use std::io::{ErrorKind, Write};

use tracing::trace;

use crate::codec::{encode_pendant_checked, PendantCommand, RangePolicy, FRAME_LEN};
use crate::error::{FrameError, Result};

/// Configuration for the frame writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterConfig {
    /// How out-of-range position and force are handled. Default: reject.
    pub range_policy: RangePolicy,
}

/// Writes pendant command frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    config: WriterConfig,
    frames: u64,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, WriterConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: WriterConfig) -> Self {
        Self {
            inner,
            config,
            frames: 0,
        }
    }

    /// Encode and send a pendant command (blocking).
    ///
    /// Nothing is written if the command is rejected by the range policy.
    pub fn send(&mut self, cmd: &PendantCommand) -> Result<()> {
        let frame = encode_pendant_checked(cmd, self.config.range_policy)?;
        self.send_raw(&frame)
    }

    /// Send an already encoded frame.
    pub fn send_raw(&mut self, frame: &[u8; FRAME_LEN]) -> Result<()> {
        let mut offset = 0usize;
        while offset < frame.len() {
            match self.inner.write(&frame[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.frames += 1;
        trace!(frame = ?frame, "frame written");

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Change the range policy for subsequent commands.
    pub fn set_range_policy(&mut self, policy: RangePolicy) {
        self.config.range_policy = policy;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;
    use crate::codec::{decode_slice, encode_pendant, DecodedState};
    use crate::reader::FrameReader;

    #[test]
    fn write_single_frame() {
        let cmd = PendantCommand {
            activated: true,
            air_in: true,
            position: -250,
            force: 600,
            ..PendantCommand::default()
        };
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&cmd).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), FRAME_LEN);
        assert_eq!(decode_slice(&wire), Some(DecodedState::Pendant(cmd)));
    }

    #[test]
    fn rejected_command_writes_nothing() {
        let cmd = PendantCommand {
            position: 2000,
            ..PendantCommand::default()
        };
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let err = writer.send(&cmd).unwrap_err();

        assert!(matches!(err, FrameError::OutOfRange { field: "position", .. }));
        assert_eq!(writer.frames_written(), 0);
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn saturate_policy_writes_clamped_frame() {
        let cmd = PendantCommand {
            position: 2000,
            ..PendantCommand::default()
        };
        let mut writer = FrameWriter::with_config(
            Cursor::new(Vec::<u8>::new()),
            WriterConfig {
                range_policy: RangePolicy::Saturate,
            },
        );
        writer.send(&cmd).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(decode_slice(&wire).unwrap().position(), 1023);
    }

    #[test]
    fn written_frames_read_back_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        for position in [-3i16, 0, 512] {
            writer
                .send(&PendantCommand {
                    position,
                    ..PendantCommand::default()
                })
                .unwrap();
        }
        assert_eq!(writer.frames_written(), 3);

        let wire = writer.into_inner().into_inner();
        let mut reader = FrameReader::new(Cursor::new(wire));
        for position in [-3i16, 0, 512] {
            let state = reader.read_frame(Duration::from_secs(1)).unwrap();
            assert_eq!(state.position(), position);
        }
    }

    #[test]
    fn partial_writes_complete() {
        let cmd = PendantCommand::default();
        let mut writer = FrameWriter::new(PartialWriter {
            written: Vec::new(),
            interrupted: false,
        });
        writer.send(&cmd).unwrap();
        assert_eq!(writer.get_ref().written, encode_pendant(&cmd));
    }

    #[test]
    fn zero_write_reports_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(&PendantCommand::default()).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn set_range_policy_applies_to_next_send() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(writer.config().range_policy, RangePolicy::Reject);
        writer.set_range_policy(RangePolicy::Mask);

        let cmd = PendantCommand {
            force: 1030,
            ..PendantCommand::default()
        };
        writer.send(&cmd).unwrap();
        let wire = writer.into_inner().into_inner();
        assert_eq!(decode_slice(&wire).unwrap().force(), 6);
    }

    /// Accepts two bytes per call and interrupts once.
    struct PartialWriter {
        written: Vec<u8>,
        interrupted: bool,
    }

    impl Write for PartialWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = buf.len().min(2);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
