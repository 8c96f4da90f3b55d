//! Stream-and-tee engine.
//!
//! Pulls serialized chunks from an export iterator, gzip-compresses them
//! once, and fans the compressed bytes out to a live sink and/or a cache
//! file. The cache file is written under a `.tmp` suffix and renamed into
//! place only after a clean finish, so a published artifact is always
//! complete. Cancellation is observed between chunks.

mod sink;

pub use sink::{BufferSink, ChannelSink, ChunkSink};

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Errors from the streaming engine.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Failure writing to a sink or the cache file.
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// The build was cancelled between chunks.
    #[error("stream cancelled")]
    Cancelled,
}

/// What a completed stream produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Compressed bytes written to the sinks.
    pub bytes_out: u64,
    /// Serialized chunks consumed from the export iterator.
    pub chunks_in: u64,
}

/// Compresses `chunks` and fans the output to `live` and/or `cache_path`.
///
/// At least one destination should be given; with neither this compresses
/// into the void and returns a summary of zero useful work. Each chunk is
/// followed by a sync flush so a live consumer sees bytes promptly rather
/// than at gzip block boundaries.
///
/// On success the cache file is atomically renamed from `<path>.tmp` to
/// `<path>`. On any error, including cancellation, the temp file is
/// removed and the final path is left untouched.
pub fn stream_export<I>(
    chunks: I,
    live: Option<&mut dyn ChunkSink>,
    cache_path: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<StreamSummary, StreamError>
where
    I: Iterator<Item = String>,
{
    let temp_path = match cache_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Some(temp_path_for(path))
        }
        None => None,
    };
    let cache_file = match &temp_path {
        Some(path) => Some(File::create(path)?),
        None => None,
    };

    let tee = TeeWriter {
        live,
        cache: cache_file,
        bytes: 0,
    };
    let mut encoder = GzEncoder::new(tee, Compression::default());
    let mut chunks_in = 0u64;
    let mut chunks = chunks;

    let mut failure: Option<StreamError> = None;
    loop {
        if cancel.is_cancelled() {
            failure = Some(StreamError::Cancelled);
            break;
        }
        let Some(chunk) = chunks.next() else {
            break;
        };
        let written = encoder
            .write_all(chunk.as_bytes())
            .and_then(|()| encoder.flush());
        if let Err(err) = written {
            failure = Some(err.into());
            break;
        }
        chunks_in += 1;
    }

    let outcome = match failure {
        Some(err) => {
            drop(encoder);
            Err(err)
        }
        None => match encoder.finish() {
            Ok(tee) => Ok(tee.bytes),
            Err(err) => Err(err.into()),
        },
    };

    match outcome {
        Ok(bytes_out) => {
            if let (Some(temp), Some(path)) = (&temp_path, cache_path) {
                if let Err(err) = fs::rename(temp, path) {
                    let _ = fs::remove_file(temp);
                    return Err(err.into());
                }
                debug!(path = %path.display(), bytes = bytes_out, "cache artifact published");
            }
            Ok(StreamSummary {
                bytes_out,
                chunks_in,
            })
        }
        Err(err) => {
            if let Some(temp) = &temp_path {
                if fs::remove_file(temp).is_err() && temp.exists() {
                    warn!(path = %temp.display(), "failed to remove temp artifact");
                }
            }
            Err(err)
        }
    }
}

/// Streams an existing cache file to `sink` in fixed-size chunks.
///
/// The file is already compressed, so bytes pass through untouched.
pub fn stream_file(
    path: &Path,
    sink: &mut dyn ChunkSink,
    chunk_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, StreamError> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        sink.write_chunk(&buffer[..read])?;
        total += read as u64;
    }
    Ok(total)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// `io::Write` adapter that duplicates bytes to the live sink and the
/// cache file, counting what goes through.
struct TeeWriter<'a> {
    live: Option<&'a mut dyn ChunkSink>,
    cache: Option<File>,
    bytes: u64,
}

impl Write for TeeWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(file) = &mut self.cache {
            file.write_all(buf)?;
        }
        if let Some(sink) = &mut self.live {
            sink.write_chunk(buf)?;
        }
        self.bytes += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = &mut self.cache {
            file.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;

    fn decode(bytes: &[u8]) -> String {
        let mut out = String::new();
        GzDecoder::new(bytes)
            .read_to_string(&mut out)
            .expect("valid gzip");
        out
    }

    fn chunks(parts: &[&str]) -> impl Iterator<Item = String> {
        parts
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_live_only_round_trips() {
        let mut sink = BufferSink::new();
        let cancel = CancellationToken::new();
        let summary =
            stream_export(chunks(&["hello ", "world"]), Some(&mut sink), None, &cancel).unwrap();
        assert_eq!(summary.chunks_in, 2);
        assert_eq!(decode(sink.as_bytes()), "hello world");
        assert_eq!(summary.bytes_out, sink.as_bytes().len() as u64);
    }

    #[test]
    fn test_tee_writes_identical_bytes_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.lpf.gz");
        let mut sink = BufferSink::new();
        let cancel = CancellationToken::new();

        stream_export(
            chunks(&["{\"a\":1}", "{\"b\":2}"]),
            Some(&mut sink),
            Some(&path),
            &cancel,
        )
        .unwrap();

        let on_disk = fs::read(&path).unwrap();
        assert_eq!(on_disk, sink.into_bytes());
        assert_eq!(decode(&on_disk), "{\"a\":1}{\"b\":2}");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_cache_only_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/artifact.tsv.gz");
        let cancel = CancellationToken::new();

        let summary = stream_export(chunks(&["row\n"]), None, Some(&path), &cancel).unwrap();
        assert_eq!(summary.chunks_in, 1);
        assert_eq!(decode(&fs::read(&path).unwrap()), "row\n");
    }

    #[test]
    fn test_cancelled_before_start_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.lpf.gz");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = stream_export(chunks(&["never"]), None, Some(&path), &cancel).unwrap_err();
        assert!(matches!(err, StreamError::Cancelled));
        assert!(!path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_cancel_mid_stream_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.lpf.gz");
        let cancel = CancellationToken::new();

        // Cancel as a side effect of pulling the second chunk.
        let token = cancel.clone();
        let mut count = 0;
        let source = std::iter::from_fn(move || {
            count += 1;
            if count == 2 {
                token.cancel();
            }
            Some(format!("chunk-{count}"))
        });

        let err = stream_export(source, None, Some(&path), &cancel).unwrap_err();
        assert!(matches!(err, StreamError::Cancelled));
        assert!(!path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_sink_error_aborts_and_cleans_up() {
        struct FailingSink;
        impl ChunkSink for FailingSink {
            fn write_chunk(&mut self, _chunk: &[u8]) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.lpf.gz");
        let cancel = CancellationToken::new();
        let mut sink = FailingSink;

        let err =
            stream_export(chunks(&["data"]), Some(&mut sink), Some(&path), &cancel).unwrap_err();
        assert!(matches!(err, StreamError::Io(_)));
        assert!(!path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_stream_file_chunks_through_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.gz");
        fs::write(&path, b"0123456789").unwrap();

        let mut sink = BufferSink::new();
        let cancel = CancellationToken::new();
        let total = stream_file(&path, &mut sink, 4, &cancel).unwrap();
        assert_eq!(total, 10);
        assert_eq!(sink.as_bytes(), b"0123456789");
    }

    #[test]
    fn test_stream_file_respects_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.gz");
        fs::write(&path, b"data").unwrap();

        let mut sink = BufferSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = stream_file(&path, &mut sink, 4, &cancel).unwrap_err();
        assert!(matches!(err, StreamError::Cancelled));
    }
}
