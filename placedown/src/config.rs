//! Service configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default artifact cache directory, under the platform cache root.
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("placedown")
        .join("downloads")
}

/// Tunables for the export service.
///
/// Defaults match production behavior; tests override the timing knobs
/// to avoid real waits.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory holding published cache artifacts.
    pub cache_dir: PathBuf,
    /// Minimum interval between rebuilds of the same artifact.
    pub throttle_window: Duration,
    /// Safety margin added when scheduling a deferred rebuild.
    pub deferred_margin: Duration,
    /// Retry delay when a deferred rebuild wakes up still throttled.
    pub deferred_retry: Duration,
    /// TTL of the distributed build lock.
    pub lock_ttl: Duration,
    /// TTL of bookkeeping keys (task id, last rebuild, pending flag).
    pub bookkeeping_ttl: Duration,
    /// Ceiling on serialized WKT length in table exports.
    pub max_wkt_len: usize,
    /// Douglas-Peucker tolerance, in degrees, for oversized geometries.
    pub simplify_tolerance: f64,
    /// Read size when replaying a cached artifact.
    pub read_chunk_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            throttle_window: Duration::from_secs(300),
            deferred_margin: Duration::from_secs(10),
            deferred_retry: Duration::from_secs(60),
            lock_ttl: Duration::from_secs(3600),
            bookkeeping_ttl: Duration::from_secs(86_400),
            max_wkt_len: 10_000,
            simplify_tolerance: 0.01,
            read_chunk_size: 8192,
        }
    }
}

impl ExportConfig {
    /// Creates a configuration with production defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Overrides the rebuild throttle window.
    pub fn with_throttle_window(mut self, window: Duration) -> Self {
        self.throttle_window = window;
        self
    }

    /// Overrides the deferred-rebuild margin.
    pub fn with_deferred_margin(mut self, margin: Duration) -> Self {
        self.deferred_margin = margin;
        self
    }

    /// Overrides the deferred-rebuild retry delay.
    pub fn with_deferred_retry(mut self, retry: Duration) -> Self {
        self.deferred_retry = retry;
        self
    }

    /// Overrides the WKT length ceiling.
    pub fn with_max_wkt_len(mut self, max: usize) -> Self {
        self.max_wkt_len = max;
        self
    }

    /// Table serializer options derived from this configuration.
    pub fn table_options(&self) -> crate::export::TableOptions {
        crate::export::TableOptions {
            max_wkt_len: self.max_wkt_len,
            simplify_tolerance: self.simplify_tolerance,
        }
    }
}
