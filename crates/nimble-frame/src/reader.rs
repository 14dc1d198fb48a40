use std::io::{self, ErrorKind, Read};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::codec::{check_frame, decode_valid, DecodedState, FRAME_LEN};
use crate::error::{FrameError, Result};

/// Counters of a [`FrameReader`] since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Bytes taken from the stream.
    pub bytes_read: u64,
    /// Bytes dropped while searching for a frame boundary.
    pub bytes_discarded: u64,
    /// Frames decoded.
    pub frames: u64,
}

/// Hook run before each blocking read with the time left until the deadline.
///
/// Lets a stream shorten its own read timeout so a read cannot block past
/// the deadline.
pub type ReadLimit<T> = Box<dyn FnMut(&mut T, Duration) -> io::Result<()> + Send>;

/// Reads frames from an undelimited byte stream.
///
/// The reader keeps a 7-byte window over the stream. When the window does
/// not hold a valid frame it drops the oldest byte, reads one more and
/// tries again, until a frame is found or the deadline passes.
///
/// A read returning fewer bytes than asked for only fills the window
/// further. The window is never shifted or decoded while it is incomplete.
pub struct FrameReader<T> {
    inner: T,
    window: [u8; FRAME_LEN],
    filled: usize,
    stats: ReaderStats,
    read_limit: Option<ReadLimit<T>>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            window: [0u8; FRAME_LEN],
            filled: 0,
            stats: ReaderStats::default(),
            read_limit: None,
        }
    }

    /// Run `limit` before every read made while a deadline is pending.
    pub fn set_read_limit(&mut self, limit: ReadLimit<T>) {
        self.read_limit = Some(limit);
    }

    /// Read the next frame, giving up after `timeout`.
    ///
    /// Returns `Err(FrameError::Timeout)` if no valid frame was found in time.
    /// A timeout too large to represent as an instant waits without limit.
    pub fn read_frame(&mut self, timeout: Duration) -> Result<DecodedState> {
        self.read_until(Instant::now().checked_add(timeout), timeout)
    }

    /// Read the next frame, giving up at `deadline`.
    pub fn read_frame_until(&mut self, deadline: Instant) -> Result<DecodedState> {
        let timeout = deadline.saturating_duration_since(Instant::now());
        self.read_until(Some(deadline), timeout)
    }

    fn read_until(
        &mut self,
        deadline: Option<Instant>,
        timeout: Duration,
    ) -> Result<DecodedState> {
        let mut discarded = 0u64;
        loop {
            if self.filled < FRAME_LEN {
                if let (Some(limit), Some(deadline)) = (self.read_limit.as_mut(), deadline) {
                    limit(
                        &mut self.inner,
                        deadline.saturating_duration_since(Instant::now()),
                    )?;
                }
                self.fill()?;
                if self.filled < FRAME_LEN {
                    if expired(deadline) {
                        return Err(FrameError::Timeout(timeout));
                    }
                    continue;
                }
            }

            match check_frame(&self.window) {
                Ok(node) => {
                    let state = decode_valid(&self.window, node);
                    self.filled = 0;
                    self.stats.frames += 1;
                    if discarded > 0 {
                        debug!(discarded, node = node.name(), "resynchronized to frame boundary");
                    }
                    return Ok(state);
                }
                Err(rejection) => {
                    trace!(%rejection, window = ?self.window, "window is not a frame");
                }
            }

            if expired(deadline) {
                return Err(FrameError::Timeout(timeout));
            }

            self.window.copy_within(1.., 0);
            self.filled = FRAME_LEN - 1;
            self.stats.bytes_discarded += 1;
            discarded += 1;
        }
    }

    /// Issue one read into the unfilled tail of the window.
    ///
    /// A serial read that times out is not an error here; it just leaves the
    /// window short so the caller can check its deadline.
    fn fill(&mut self) -> Result<()> {
        loop {
            match self.inner.read(&mut self.window[self.filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.filled += n;
                    self.stats.bytes_read += n as u64;
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock =>
                {
                    return Ok(());
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Total bytes taken from the stream.
    pub fn position(&self) -> u64 {
        self.stats.bytes_read
    }

    /// Stream counters.
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Number of bytes currently held in the window.
    pub fn buffered(&self) -> usize {
        self.filled
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;

    use super::*;
    use crate::codec::{encode_pendant, encode_state, ActuatorState, PendantCommand};

    fn pendant(position: i16) -> PendantCommand {
        PendantCommand {
            activated: true,
            position,
            ..PendantCommand::default()
        }
    }

    #[test]
    fn read_single_frame() {
        let cmd = pendant(42);
        let mut reader = FrameReader::new(Cursor::new(encode_pendant(&cmd).to_vec()));

        let state = reader.read_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(state, DecodedState::Pendant(cmd));
        assert_eq!(reader.position(), 7);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn read_consecutive_frames() {
        let actuator = ActuatorState {
            activated: true,
            position: -100,
            force: 250,
            ..ActuatorState::default()
        };
        let mut wire = encode_pendant(&pendant(1)).to_vec();
        wire.extend_from_slice(&encode_state(&DecodedState::Actuator(actuator)));
        wire.extend_from_slice(&encode_pendant(&pendant(3)));

        let mut reader = FrameReader::new(Cursor::new(wire));
        let timeout = Duration::from_secs(1);

        assert_eq!(reader.read_frame(timeout).unwrap().position(), 1);
        assert_eq!(
            reader.read_frame(timeout).unwrap(),
            DecodedState::Actuator(actuator)
        );
        assert_eq!(reader.read_frame(timeout).unwrap().position(), 3);
        assert_eq!(reader.stats().frames, 3);
        assert_eq!(reader.stats().bytes_discarded, 0);
    }

    #[test]
    fn resync_after_garbage() {
        for garbage_len in [1usize, 3, 6, 7, 19] {
            let cmd = pendant(-511);
            let mut wire = vec![0xFF; garbage_len];
            wire.extend_from_slice(&encode_pendant(&cmd));

            let mut reader = FrameReader::new(Cursor::new(wire));
            let state = reader.read_frame(Duration::from_secs(1)).unwrap();

            assert_eq!(state, DecodedState::Pendant(cmd));
            assert_eq!(reader.position(), garbage_len as u64 + 7);
            assert_eq!(reader.stats().bytes_discarded, garbage_len as u64);
        }
    }

    #[test]
    fn attach_mid_frame() {
        let first = encode_pendant(&pendant(10));
        let second = encode_pendant(&pendant(20));
        let mut wire = first[3..].to_vec();
        wire.extend_from_slice(&second);

        let mut reader = FrameReader::new(Cursor::new(wire));
        let state = reader.read_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(state.position(), 20);
        assert_eq!(reader.stats().bytes_discarded, 4);
    }

    #[test]
    fn byte_at_a_time_does_not_desynchronize() {
        let cmd = pendant(777);
        let mut bytes = vec![0xFF, 0xFF];
        bytes.extend_from_slice(&encode_pendant(&cmd));
        let mut reader = FrameReader::new(ByteByByteReader { bytes, pos: 0 });

        let state = reader.read_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(state, DecodedState::Pendant(cmd));
        assert_eq!(reader.position(), 9);
        assert_eq!(reader.stats().bytes_discarded, 2);
    }

    #[test]
    fn short_initial_fill_is_not_a_shift() {
        let cmd = pendant(5);
        let frame = encode_pendant(&cmd);
        let reader = ChunkedReader {
            chunks: vec![
                frame[..2].to_vec(),
                Vec::new(),
                frame[2..5].to_vec(),
                frame[5..].to_vec(),
            ],
        };
        let mut reader = FrameReader::new(reader);

        let state = reader.read_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(state, DecodedState::Pendant(cmd));
        assert_eq!(reader.stats().bytes_discarded, 0);
    }

    #[test]
    fn silent_line_times_out() {
        let timeout = Duration::from_millis(60);
        let mut reader = FrameReader::new(ChunkedReader { chunks: Vec::new() });

        let start = Instant::now();
        let err = reader.read_frame(timeout).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, FrameError::Timeout(t) if t == timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn endless_garbage_times_out() {
        let timeout = Duration::from_millis(50);
        let mut reader = FrameReader::new(std::io::repeat(0x55));

        let start = Instant::now();
        let err = reader.read_frame(timeout).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, FrameError::Timeout(_)));
        assert!(elapsed >= timeout);
        assert!(elapsed < Duration::from_secs(2));
        assert!(reader.stats().bytes_discarded > 0);
        assert_eq!(reader.stats().frames, 0);
    }

    #[test]
    fn frame_after_timeout_is_still_found() {
        let (tx, rx) = mpsc::channel();
        let mut reader = FrameReader::new(ChannelReader {
            rx,
            pending: Vec::new(),
        });

        tx.send(vec![0xFF; 3]).unwrap();
        let err = reader.read_frame(Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, FrameError::Timeout(_)));

        let cmd = pendant(-1);
        tx.send(encode_pendant(&cmd).to_vec()).unwrap();
        let state = reader.read_frame(Duration::from_secs(1)).unwrap();
        assert_eq!(state, DecodedState::Pendant(cmd));
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn deadline_in_the_past_still_checks_available_window() {
        let cmd = pendant(9);
        let mut reader = FrameReader::new(Cursor::new(encode_pendant(&cmd).to_vec()));
        let state = reader.read_frame_until(Instant::now()).unwrap();
        assert_eq!(state, DecodedState::Pendant(cmd));
    }

    #[test]
    fn unbounded_timeout_reads_frame() {
        let cmd = PendantCommand::default();
        let mut reader = FrameReader::new(Cursor::new(encode_pendant(&cmd).to_vec()));
        let state = reader.read_frame(Duration::MAX).unwrap();
        assert_eq!(state, DecodedState::Pendant(cmd));
    }

    #[test]
    fn unbounded_timeout_still_reports_end_of_stream() {
        let mut reader = FrameReader::new(Cursor::new(vec![0xFF; 10]));
        let err = reader.read_frame(Duration::MAX).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn read_limit_keeps_slow_reads_inside_deadline() {
        let mut reader = FrameReader::new(SlowLine {
            read_timeout: Duration::from_millis(100),
        });
        reader.set_read_limit(Box::new(|line: &mut SlowLine, remaining| {
            line.read_timeout = line.read_timeout.min(remaining);
            Ok(())
        }));

        let start = Instant::now();
        let err = reader.read_frame(Duration::from_millis(5)).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, FrameError::Timeout(_)));
        assert!(elapsed < Duration::from_millis(60), "took {elapsed:?}");
    }

    #[test]
    fn read_limit_errors_propagate() {
        let mut reader = FrameReader::new(ChunkedReader { chunks: Vec::new() });
        reader.set_read_limit(Box::new(|_: &mut ChunkedReader, _| {
            Err(std::io::Error::from(ErrorKind::PermissionDenied))
        }));
        let err = reader.read_frame(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::PermissionDenied));
    }

    #[test]
    fn end_of_stream_reports_connection_closed() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x80, 0x00, 0x00]));
        let err = reader.read_frame(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(reader.buffered(), 3);
    }

    #[test]
    fn interrupted_read_retries() {
        let cmd = pendant(8);
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(encode_pendant(&cmd).to_vec()),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(
            framed.read_frame(Duration::from_secs(1)).unwrap(),
            DecodedState::Pendant(cmd)
        );
    }

    #[test]
    fn other_io_errors_propagate() {
        let mut reader = FrameReader::new(BrokenReader);
        let err = reader.read_frame(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    /// Yields one chunk per read; an empty chunk or no chunks left behaves
    /// like a serial read timeout.
    struct ChunkedReader {
        chunks: Vec<Vec<u8>>,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                std::thread::sleep(Duration::from_millis(5));
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            let chunk = self.chunks.remove(0);
            if chunk.is_empty() {
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            assert!(chunk.len() <= buf.len(), "reader asked for fewer bytes than remain");
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    struct ChannelReader {
        rx: mpsc::Receiver<Vec<u8>>,
        pending: Vec<u8>,
    }

    impl Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pending.is_empty() {
                match self.rx.recv_timeout(Duration::from_millis(5)) {
                    Ok(bytes) => self.pending = bytes,
                    Err(_) => return Err(std::io::Error::from(ErrorKind::TimedOut)),
                }
            }
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    /// Blocks for its read timeout, then reports no data.
    struct SlowLine {
        read_timeout: Duration,
    }

    impl Read for SlowLine {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(self.read_timeout);
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
