//! Output sinks for compressed chunks.
//!
//! The engine pushes compressed bytes through [`ChunkSink`] so the same
//! build can feed an HTTP response body, a channel, or a test buffer
//! without caring which.

use bytes::Bytes;
use std::io;
use tokio::sync::mpsc;

/// Receiver of compressed byte chunks.
///
/// Backpressure is the sink's concern: a slow consumer should block
/// `write_chunk`, which in turn pauses the build.
pub trait ChunkSink: Send {
    /// Delivers one compressed chunk.
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;
}

/// Sink that accumulates chunks in memory. Used by tests and by callers
/// that want the whole artifact at once.
#[derive(Debug, Default)]
pub struct BufferSink {
    buffer: Vec<u8>,
}

impl BufferSink {
    /// Creates an empty buffer sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the sink, returning the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Bytes accumulated so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl ChunkSink for BufferSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }
}

/// Sink that forwards chunks to a tokio channel.
///
/// This is the bridge to an async transport: the build runs on a blocking
/// thread and `blocking_send` provides the backpressure. A dropped
/// receiver surfaces as `BrokenPipe`, which aborts the build.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Wraps a channel sender.
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }
}

impl ChunkSink for ChannelSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.tx
            .blocking_send(Bytes::copy_from_slice(chunk))
            .map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "chunk receiver dropped")
            })
    }
}
