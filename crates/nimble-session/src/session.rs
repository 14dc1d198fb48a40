use std::io::{Read, Write};
use std::time::Duration;

use nimble_frame::{
    DecodedState, FrameReader, FrameWriter, PendantCommand, ReadLimit, ReaderStats, WriterConfig,
};
use tracing::{debug, trace};

use crate::cache::{Snapshot, StateCache};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// A connection to the device.
///
/// Owns both directions of the link. Reading and writing are independent;
/// use [`Session::split`] to drive them from different threads.
pub struct Session<R, W> {
    reader: SessionReader<R>,
    writer: SessionWriter<W>,
    config: SessionConfig,
}

impl<R: Read, W: Write> Session<R, W> {
    /// Build a session from a read handle and a write handle to the same link.
    pub fn new(reader: R, writer: W, config: SessionConfig) -> Self {
        let cache = StateCache::new();
        let writer_config = WriterConfig {
            range_policy: config.range_policy,
        };
        Self {
            reader: SessionReader {
                inner: FrameReader::new(reader),
                cache,
            },
            writer: SessionWriter {
                inner: FrameWriter::with_config(writer, writer_config),
            },
            config,
        }
    }

    /// Bound every blocking read of the link by the receive deadline.
    pub fn set_read_limit(&mut self, limit: ReadLimit<R>) {
        self.reader.inner.set_read_limit(limit);
    }

    /// Send a pendant command.
    pub fn send(&mut self, cmd: &PendantCommand) -> Result<()> {
        self.writer.send(cmd)
    }

    /// Receive the next frame of either role, waiting at most `timeout`.
    pub fn receive(&mut self, timeout: Duration) -> Result<DecodedState> {
        self.reader.receive(timeout)
    }

    /// Receive with the configured default timeout.
    pub fn receive_default(&mut self) -> Result<DecodedState> {
        self.reader.receive(self.config.receive_timeout)
    }

    /// Handle to the last-known state, for observers on other threads.
    pub fn cache(&self) -> StateCache {
        self.reader.cache.clone()
    }

    /// Copy of the last-known state.
    pub fn last_known(&self) -> Snapshot {
        self.reader.cache.snapshot()
    }

    /// Stream counters of the receive direction.
    pub fn reader_stats(&self) -> ReaderStats {
        self.reader.stats()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Split into independent receive and send halves.
    pub fn split(self) -> (SessionReader<R>, SessionWriter<W>) {
        (self.reader, self.writer)
    }
}

/// Receive half of a [`Session`].
pub struct SessionReader<R> {
    inner: FrameReader<R>,
    cache: StateCache,
}

impl<R: Read> SessionReader<R> {
    /// Receive the next frame and record it in the cache.
    pub fn receive(&mut self, timeout: Duration) -> Result<DecodedState> {
        let state = self
            .inner
            .read_frame(timeout)
            .map_err(SessionError::from_frame)?;
        trace!(
            node = state.node_type().name(),
            position = state.position(),
            force = state.force(),
            "frame received"
        );
        self.cache.record(state);
        Ok(state)
    }

    pub fn cache(&self) -> StateCache {
        self.cache.clone()
    }

    pub fn stats(&self) -> ReaderStats {
        self.inner.stats()
    }
}

/// Send half of a [`Session`].
pub struct SessionWriter<W> {
    inner: FrameWriter<W>,
}

impl<W: Write> SessionWriter<W> {
    /// Encode and send a pendant command.
    pub fn send(&mut self, cmd: &PendantCommand) -> Result<()> {
        self.inner.send(cmd).map_err(|err| {
            debug!(error = %err, "send failed");
            SessionError::from_frame(err)
        })
    }

    /// Frames sent so far.
    pub fn frames_sent(&self) -> u64 {
        self.inner.frames_written()
    }
}
