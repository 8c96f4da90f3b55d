//! Coordination store adapter.
//!
//! [`ExportCoordinator`] wraps the raw [`KvStore`] with the per-key
//! operations the build orchestrator needs: build lock, in-flight task id
//! registry, rebuild throttling, and pending-rebuild bookkeeping.
//!
//! TTLs serve two different purposes:
//! - The lock TTL is a deadlock failsafe: a crashed builder cannot wedge a
//!   key past the TTL even though it never released the lock.
//! - The bookkeeping TTLs (last rebuild, pending flag) are storage hygiene
//!   only; correctness never depends on their expiry.

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::key::CacheKey;
use crate::cache::kv::KvStore;
use crate::runner::JobId;
use std::sync::Arc;
use std::time::Duration;

/// Default build lock TTL (one hour).
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(3600);

/// Default TTL for throttle and pending bookkeeping (one day).
pub const DEFAULT_BOOKKEEPING_TTL: Duration = Duration::from_secs(86_400);

/// Per-key coordination operations over a shared [`KvStore`].
///
/// Cloneable; all clones share the same underlying store and clock.
#[derive(Clone)]
pub struct ExportCoordinator {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    lock_ttl: Duration,
    bookkeeping_ttl: Duration,
}

impl ExportCoordinator {
    /// Creates a coordinator with default TTLs and the system clock.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            lock_ttl: DEFAULT_LOCK_TTL,
            bookkeeping_ttl: DEFAULT_BOOKKEEPING_TTL,
        }
    }

    /// Replaces the clock. Used by tests to drive the throttle window.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the build lock TTL.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Attempts to acquire the build lock for `key`.
    ///
    /// Returns true iff this caller now owns the lock. The lock expires
    /// after the configured TTL regardless of release.
    pub fn try_acquire_lock(&self, key: &CacheKey) -> bool {
        self.store.set_nx(&key.lock_key(), "building", self.lock_ttl)
    }

    /// Releases the build lock. Idempotent.
    pub fn release_lock(&self, key: &CacheKey) {
        self.store.delete(&key.lock_key());
    }

    /// Returns true iff a build lock is currently held for `key`.
    pub fn is_locked(&self, key: &CacheKey) -> bool {
        self.store.exists(&key.lock_key())
    }

    /// Records the id of the in-flight build job so a later invalidation
    /// can request cancellation.
    pub fn record_job(&self, key: &CacheKey, job_id: &JobId) {
        self.store
            .set(&key.task_key(), job_id.as_str(), self.lock_ttl);
    }

    /// Returns the recorded build job id, if any.
    pub fn get_job(&self, key: &CacheKey) -> Option<JobId> {
        self.store.get(&key.task_key()).map(JobId::new)
    }

    /// Clears the recorded build job id. Idempotent.
    pub fn clear_job(&self, key: &CacheKey) {
        self.store.delete(&key.task_key());
    }

    /// Returns true iff a rebuild completed within `window` of now.
    pub fn should_throttle(&self, key: &CacheKey, window: Duration) -> bool {
        match self.seconds_since_rebuild(key) {
            Some(elapsed) => elapsed < window.as_secs_f64(),
            None => false,
        }
    }

    /// Seconds elapsed since the last recorded rebuild, if one is recorded.
    pub fn seconds_since_rebuild(&self, key: &CacheKey) -> Option<f64> {
        let raw = self.store.get(&key.last_rebuild_key())?;
        let last: f64 = raw.parse().ok()?;
        Some(self.clock.now() - last)
    }

    /// Stamps the last-rebuild time with now.
    pub fn record_rebuild_time(&self, key: &CacheKey) {
        self.store.set(
            &key.last_rebuild_key(),
            &self.clock.now().to_string(),
            self.bookkeeping_ttl,
        );
    }

    /// Marks a deferred rebuild as pending for `key`.
    pub fn mark_pending(&self, key: &CacheKey) {
        self.store.set(
            &key.pending_key(),
            &self.clock.now().to_string(),
            self.bookkeeping_ttl,
        );
    }

    /// Returns true iff a deferred rebuild is pending for `key`.
    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.store.exists(&key.pending_key())
    }

    /// Clears the pending flag. Idempotent.
    pub fn clear_pending(&self, key: &CacheKey) {
        self.store.delete(&key.pending_key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::key::{EntityType, ExportFormat};
    use crate::cache::kv::MemoryKvStore;

    fn test_key() -> CacheKey {
        CacheKey::new(EntityType::Dataset, 7, ExportFormat::Table)
    }

    fn coordinator_with_clock(clock: Arc<ManualClock>) -> ExportCoordinator {
        ExportCoordinator::new(Arc::new(MemoryKvStore::new())).with_clock(clock)
    }

    #[test]
    fn test_lock_mutual_exclusion() {
        let coord = ExportCoordinator::new(Arc::new(MemoryKvStore::new()));
        let key = test_key();

        assert!(!coord.is_locked(&key));
        assert!(coord.try_acquire_lock(&key));
        assert!(coord.is_locked(&key));
        assert!(!coord.try_acquire_lock(&key));

        coord.release_lock(&key);
        assert!(!coord.is_locked(&key));
        assert!(coord.try_acquire_lock(&key));
    }

    #[test]
    fn test_lock_ttl_expires() {
        let coord = ExportCoordinator::new(Arc::new(MemoryKvStore::new()))
            .with_lock_ttl(Duration::from_millis(10));
        let key = test_key();

        assert!(coord.try_acquire_lock(&key));
        std::thread::sleep(Duration::from_millis(20));
        // Expired lock can be taken over without an explicit release.
        assert!(coord.try_acquire_lock(&key));
    }

    #[test]
    fn test_job_registry() {
        let coord = ExportCoordinator::new(Arc::new(MemoryKvStore::new()));
        let key = test_key();
        let job = JobId::new("job-12");

        assert_eq!(coord.get_job(&key), None);
        coord.record_job(&key, &job);
        assert_eq!(coord.get_job(&key), Some(job));
        coord.clear_job(&key);
        assert_eq!(coord.get_job(&key), None);
    }

    #[test]
    fn test_throttle_window() {
        let clock = Arc::new(ManualClock::starting_at(10_000.0));
        let coord = coordinator_with_clock(Arc::clone(&clock));
        let key = test_key();
        let window = Duration::from_secs(300);

        // No rebuild on record: never throttled.
        assert!(!coord.should_throttle(&key, window));

        coord.record_rebuild_time(&key);
        assert!(coord.should_throttle(&key, window));

        clock.advance(299.0);
        assert!(coord.should_throttle(&key, window));

        clock.advance(2.0);
        assert!(!coord.should_throttle(&key, window));
    }

    #[test]
    fn test_seconds_since_rebuild() {
        let clock = Arc::new(ManualClock::starting_at(5_000.0));
        let coord = coordinator_with_clock(Arc::clone(&clock));
        let key = test_key();

        assert_eq!(coord.seconds_since_rebuild(&key), None);
        coord.record_rebuild_time(&key);
        clock.advance(42.0);
        let elapsed = coord.seconds_since_rebuild(&key).unwrap();
        assert!((elapsed - 42.0).abs() < 1e-6);
    }

    #[test]
    fn test_pending_flag() {
        let coord = ExportCoordinator::new(Arc::new(MemoryKvStore::new()));
        let key = test_key();

        assert!(!coord.is_pending(&key));
        coord.mark_pending(&key);
        assert!(coord.is_pending(&key));
        coord.clear_pending(&key);
        assert!(!coord.is_pending(&key));
        // Clearing twice is fine.
        coord.clear_pending(&key);
    }
}
