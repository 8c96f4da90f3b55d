//! Export orchestration.
//!
//! [`ExportService`] is the front door: it serves download requests from
//! the artifact cache when possible, builds live otherwise, and manages
//! invalidation with throttling and deferred rebuilds. Cross-process
//! coordination goes through [`ExportCoordinator`]; background builds run
//! on a [`JobRunner`].
//!
//! An artifact is in exactly one of four states, inferred rather than
//! stored: absent (no file, no lock), building (lock held), fresh (file
//! present), or pending-rebuild (file present or absent, pending flag
//! set). Every transition below preserves that at most one writer holds
//! the lock.

use crate::cache::{CacheKey, ExportCoordinator};
use crate::config::ExportConfig;
use crate::export::{export_chunks, record_plan, ExportChunks, RecordPlan};
use crate::runner::{JobDescriptor, JobId, JobRunner};
use crate::source::{RecordIter, RecordSource, SourceError};
use crate::stream::{stream_export, stream_file, ChunkSink, StreamError, StreamSummary};
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors surfaced to a caller of the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The record backend failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The streaming engine failed or was cancelled.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Filesystem failure outside the streaming engine.
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a download request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// Replayed an existing cache artifact.
    CacheHit { bytes: u64 },
    /// Built live, teeing into the cache; the artifact is now published.
    BuiltAndCached { summary: StreamSummary },
    /// Built live without caching (another writer held the lock, or the
    /// response was a rejection).
    LiveStream { summary: StreamSummary },
}

/// What an invalidation request did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// An in-flight build was cancelled.
    pub cancelled_existing: bool,
    /// A published artifact was deleted.
    pub deleted_cache: bool,
    /// A rebuild job was submitted.
    pub started_rebuild: bool,
    /// The request fell inside the throttle window.
    pub throttled: bool,
    /// A deferred rebuild was scheduled (or was already pending).
    pub deferred: bool,
    /// Human-readable summary.
    pub message: String,
}

/// Response metadata for serving an artifact over HTTP-like transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHeaders {
    pub content_type: &'static str,
    pub content_encoding: &'static str,
    /// Known only for cache hits.
    pub content_length: Option<u64>,
    /// Suggested download filename.
    pub filename: String,
}

struct BuildResult {
    summary: StreamSummary,
    /// Whether a cache artifact was published.
    published: bool,
}

/// Delay before a deferred rebuild runs: the remainder of the throttle
/// window plus a margin, never less than the margin itself.
pub(crate) fn deferred_delay(window: Duration, elapsed: Duration, margin: Duration) -> Duration {
    window.saturating_sub(elapsed) + margin
}

/// Coordinated cache-or-build export service.
pub struct ExportService {
    coordinator: ExportCoordinator,
    source: Arc<dyn RecordSource>,
    runner: Arc<dyn JobRunner>,
    config: ExportConfig,
}

impl ExportService {
    /// Creates a service over the given backends.
    pub fn new(
        coordinator: ExportCoordinator,
        source: Arc<dyn RecordSource>,
        runner: Arc<dyn JobRunner>,
        config: ExportConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            source,
            runner,
            config,
        })
    }

    /// Service configuration.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Response metadata for `key`, with length filled in when the
    /// artifact is already cached.
    pub fn describe_artifact(&self, key: &CacheKey) -> ArtifactHeaders {
        let path = key.cache_path(&self.config.cache_dir);
        ArtifactHeaders {
            content_type: key.format.content_type(),
            content_encoding: "gzip",
            content_length: fs::metadata(&path).ok().map(|m| m.len()),
            filename: key.cache_filename(),
        }
    }

    /// Serves one download: replays the cache artifact when fresh,
    /// otherwise builds live. The first uncached request also publishes
    /// the artifact; concurrent requests stream without caching.
    pub fn serve(
        &self,
        key: &CacheKey,
        sink: &mut dyn ChunkSink,
        cancel: &CancellationToken,
    ) -> Result<ServeOutcome, ServiceError> {
        let path = key.cache_path(&self.config.cache_dir);
        if path.is_file() {
            debug!(key = %key, "serving cached artifact");
            let bytes = stream_file(&path, sink, self.config.read_chunk_size, cancel)?;
            return Ok(ServeOutcome::CacheHit { bytes });
        }

        if self.coordinator.try_acquire_lock(key) {
            info!(key = %key, "cache miss, building live with tee");
            let result = self.build_artifact(key, Some(sink), true, cancel);
            match &result {
                Ok(build) if build.published => {
                    self.coordinator.record_rebuild_time(key);
                }
                _ => {}
            }
            self.coordinator.release_lock(key);
            let build = result?;
            if build.published {
                Ok(ServeOutcome::BuiltAndCached {
                    summary: build.summary,
                })
            } else {
                Ok(ServeOutcome::LiveStream {
                    summary: build.summary,
                })
            }
        } else {
            info!(key = %key, "build in progress elsewhere, streaming without cache");
            let build = self.build_artifact(key, Some(sink), false, cancel)?;
            Ok(ServeOutcome::LiveStream {
                summary: build.summary,
            })
        }
    }

    /// Invalidates the artifact and arranges a rebuild.
    ///
    /// Inside the throttle window (and without `force`) this only marks a
    /// rebuild pending and schedules a deferred job; repeated calls while
    /// one is pending do nothing more. Otherwise it cancels any in-flight
    /// build, deletes the published artifact, and submits a fresh build.
    pub fn invalidate(self: &Arc<Self>, key: &CacheKey, force: bool) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        if !force && self
            .coordinator
            .should_throttle(key, self.config.throttle_window)
        {
            report.throttled = true;
            report.deferred = true;
            if self.coordinator.is_pending(key) {
                report.message = format!("{key}: rebuild already pending");
                debug!(key = %key, "invalidation throttled, rebuild already pending");
                return report;
            }
            self.coordinator.mark_pending(key);
            let elapsed = self
                .coordinator
                .seconds_since_rebuild(key)
                .map(Duration::from_secs_f64)
                .unwrap_or_default();
            let delay = deferred_delay(
                self.config.throttle_window,
                elapsed,
                self.config.deferred_margin,
            );
            self.submit_deferred(key, delay);
            report.message = format!(
                "{key}: rebuild throttled, deferred for {}s",
                delay.as_secs()
            );
            info!(key = %key, delay_secs = delay.as_secs(), "invalidation deferred");
            return report;
        }

        report.cancelled_existing = self.cancel_current_build(key);
        let path = key.cache_path(&self.config.cache_dir);
        if path.is_file() {
            match fs::remove_file(&path) {
                Ok(()) => report.deleted_cache = true,
                Err(err) => warn!(key = %key, error = %err, "failed to delete cache artifact"),
            }
        }
        self.coordinator.clear_pending(key);

        // Stamp the window at dispatch, not completion: a burst of
        // invalidations collapses into one rebuild plus one deferral
        // instead of repeatedly cancelling the build it just started.
        self.coordinator.record_rebuild_time(key);
        self.submit_build(key);
        report.started_rebuild = true;
        report.message = format!(
            "{key}: invalidated (cancelled={}, deleted={}), rebuild submitted",
            report.cancelled_existing, report.deleted_cache
        );
        info!(key = %key, cancelled = report.cancelled_existing,
              deleted = report.deleted_cache, "invalidated, rebuild submitted");
        report
    }

    /// Builds the artifact ahead of demand. Skips work when it is already
    /// cached or being built, unless `force` is set (which goes through a
    /// forced invalidation). Returns whether a build was arranged.
    pub fn prebuild(self: &Arc<Self>, key: &CacheKey, force: bool) -> bool {
        if force {
            self.invalidate(key, true);
            return true;
        }
        let path = key.cache_path(&self.config.cache_dir);
        if path.is_file() {
            debug!(key = %key, "prebuild skipped, artifact already cached");
            return false;
        }
        if self.coordinator.is_locked(key) {
            debug!(key = %key, "prebuild skipped, build already in progress");
            return false;
        }
        self.submit_build(key);
        true
    }

    /// Cancels the in-flight build for `key`, if any, and clears its
    /// coordination keys so a new build can start immediately.
    pub fn cancel_current_build(&self, key: &CacheKey) -> bool {
        let Some(job_id) = self.coordinator.get_job(key) else {
            return false;
        };
        let cancelled = self.runner.cancel(&job_id);
        self.coordinator.release_lock(key);
        self.coordinator.clear_job(key);
        if cancelled {
            info!(key = %key, job_id = %job_id, "cancelled in-flight build");
        } else {
            // A stale task key from a dead process; the keys are cleared
            // either way.
            warn!(key = %key, job_id = %job_id, "build job unknown to runner, cleared keys");
        }
        true
    }

    fn submit_build(self: &Arc<Self>, key: &CacheKey) {
        let service = Arc::clone(self);
        let key = key.clone();
        let name = format!("build {key}");
        self.runner.submit(
            JobDescriptor::new(
                name,
                Box::new(move |job_id, token| service.run_build(&key, job_id, &token)),
            ),
            Duration::ZERO,
        );
    }

    fn submit_deferred(self: &Arc<Self>, key: &CacheKey, delay: Duration) {
        let service = Arc::clone(self);
        let key = key.clone();
        let name = format!("deferred rebuild {key}");
        self.runner.submit(
            JobDescriptor::new(
                name,
                Box::new(move |_job_id, _token| service.run_deferred(&key)),
            ),
            delay,
        );
    }

    /// Body of a background build job. Returns the terminal message.
    fn run_build(&self, key: &CacheKey, job_id: JobId, cancel: &CancellationToken) -> String {
        if !self.coordinator.try_acquire_lock(key) {
            return format!("{key}: build already in progress, skipping");
        }
        self.coordinator.record_job(key, &job_id);

        let result = self.build_artifact(key, None, true, cancel);
        let message = match &result {
            Ok(build) if build.published => {
                self.coordinator.record_rebuild_time(key);
                format!(
                    "{key}: cache built, {} compressed bytes from {} chunks",
                    build.summary.bytes_out, build.summary.chunks_in
                )
            }
            Ok(_) => format!("{key}: nothing cacheable, no artifact published"),
            Err(ServiceError::Stream(StreamError::Cancelled)) => {
                format!("{key}: build cancelled")
            }
            Err(err) => format!("{key}: build failed: {err}"),
        };

        self.coordinator.release_lock(key);
        self.coordinator.clear_job(key);
        message
    }

    /// Body of a deferred rebuild job.
    fn run_deferred(self: &Arc<Self>, key: &CacheKey) -> String {
        if !self.coordinator.is_pending(key) {
            return format!("{key}: no rebuild pending, skipping");
        }
        if self
            .coordinator
            .should_throttle(key, self.config.throttle_window)
        {
            // Woke up early; try again after the retry delay. The pending
            // flag stays set so the rescheduled job still fires.
            self.submit_deferred(key, self.config.deferred_retry);
            return format!(
                "{key}: still throttled, deferred rebuild rescheduled for {}s",
                self.config.deferred_retry.as_secs()
            );
        }
        self.coordinator.clear_pending(key);
        let report = self.invalidate(key, true);
        format!("{key}: deferred rebuild dispatched ({})", report.message)
    }

    /// Serializes and streams the artifact for `key`.
    ///
    /// `cache` selects whether the compressed output is also teed into the
    /// cache directory. Rejection responses (unsupported entities) are
    /// never cached regardless.
    fn build_artifact(
        &self,
        key: &CacheKey,
        live: Option<&mut dyn ChunkSink>,
        cache: bool,
        cancel: &CancellationToken,
    ) -> Result<BuildResult, ServiceError> {
        let entity = self.source.load_entity(key)?;
        let plan = record_plan(key.entity_type, entity.class);
        let cacheable = matches!(plan, RecordPlan::Stream);

        let records: RecordIter = if cacheable {
            self.source.list_records(key)?
        } else {
            // The serializer emits the rejection body itself; it never
            // touches the record stream.
            Box::new(std::iter::empty())
        };
        let chunks: ExportChunks = export_chunks(
            key.format,
            key.entity_type,
            &entity,
            records,
            self.config.table_options(),
        );

        let publish = cache && cacheable;
        if !publish && live.is_none() {
            debug!(key = %key, "no destination for non-cacheable build");
            return Ok(BuildResult {
                summary: StreamSummary {
                    bytes_out: 0,
                    chunks_in: 0,
                },
                published: false,
            });
        }

        let path = key.cache_path(&self.config.cache_dir);
        let cache_path = publish.then_some(path.as_path());
        let summary = stream_export(chunks, live, cache_path, cancel)?;
        Ok(BuildResult {
            summary,
            published: publish,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_delay_remaining_window_plus_margin() {
        let delay = deferred_delay(
            Duration::from_secs(300),
            Duration::from_secs(120),
            Duration::from_secs(10),
        );
        assert_eq!(delay, Duration::from_secs(190));
    }

    #[test]
    fn test_deferred_delay_floors_at_margin() {
        let delay = deferred_delay(
            Duration::from_secs(300),
            Duration::from_secs(900),
            Duration::from_secs(10),
        );
        assert_eq!(delay, Duration::from_secs(10));
    }
}
