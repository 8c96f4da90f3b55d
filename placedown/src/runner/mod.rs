//! Background job execution.
//!
//! Cache builds run off the request path on a [`JobRunner`]. The runner
//! hands each job its own [`JobId`] and a [`CancellationToken`]; the job is
//! expected to record the id in the coordination store before doing real
//! work, and to poll the token at its own safe points. Cancelling an
//! unstarted (delayed) job prevents it from running at all.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a submitted job.
///
/// Generated ids are process-unique; externally supplied ids (e.g. from a
/// distributed queue) can be wrapped with [`JobId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh process-unique identifier.
    pub fn generate() -> Self {
        Self(format!("job-{}", NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The work a job performs, boxed for submission.
///
/// The closure receives the job's id and cancellation token and returns a
/// terminal message describing the outcome, which the runner logs.
pub type JobFn = Box<dyn FnOnce(JobId, CancellationToken) -> String + Send + 'static>;

/// A unit of background work.
pub struct JobDescriptor {
    name: String,
    work: JobFn,
}

impl JobDescriptor {
    /// Creates a descriptor with a human-readable name for logging.
    pub fn new(name: impl Into<String>, work: JobFn) -> Self {
        Self {
            name: name.into(),
            work,
        }
    }

    /// The descriptor's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Splits the descriptor into its name and work closure. Used by
    /// runner implementations.
    pub fn into_parts(self) -> (String, JobFn) {
        (self.name, self.work)
    }
}

impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Submits jobs for background execution.
pub trait JobRunner: Send + Sync + 'static {
    /// Schedules `descriptor` to run after `delay`. A zero delay runs as
    /// soon as a worker is available.
    fn submit(&self, descriptor: JobDescriptor, delay: Duration) -> JobId;

    /// Cancels the job with `id`. Returns `true` if the job was known to
    /// this runner (pending or running) and its token was cancelled.
    fn cancel(&self, id: &JobId) -> bool;
}

/// [`JobRunner`] backed by the tokio runtime.
///
/// Delayed jobs wait on a timer; the work itself runs on the blocking
/// thread pool since builds are I/O-bound synchronous code. Shutdown
/// cancels every outstanding token.
pub struct TokioJobRunner {
    handle: Handle,
    jobs: Arc<DashMap<JobId, CancellationToken>>,
    shutdown: CancellationToken,
}

impl TokioJobRunner {
    /// Creates a runner on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    /// Creates a runner on an explicit runtime handle.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            jobs: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Number of jobs currently pending or running.
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Cancels all outstanding jobs and refuses no new ones; callers are
    /// expected to stop submitting once shutdown begins.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Default for TokioJobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner for TokioJobRunner {
    fn submit(&self, descriptor: JobDescriptor, delay: Duration) -> JobId {
        let id = JobId::generate();
        let token = self.shutdown.child_token();
        self.jobs.insert(id.clone(), token.clone());

        let jobs = Arc::clone(&self.jobs);
        let job_id = id.clone();
        let (name, work) = descriptor.into_parts();
        debug!(job_id = %job_id, name = %name, delay_secs = delay.as_secs(), "job submitted");

        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if token.is_cancelled() {
                info!(job_id = %job_id, name = %name, "job cancelled before start");
                jobs.remove(&job_id);
                return;
            }

            let work_id = job_id.clone();
            let work_token = token.clone();
            let outcome =
                tokio::task::spawn_blocking(move || work(work_id, work_token)).await;
            match outcome {
                Ok(message) => info!(job_id = %job_id, name = %name, %message, "job finished"),
                Err(err) => info!(job_id = %job_id, name = %name, error = %err, "job panicked"),
            }
            jobs.remove(&job_id);
        });

        id
    }

    fn cancel(&self, id: &JobId) -> bool {
        match self.jobs.remove(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_runs_work() {
        let runner = TokioJobRunner::new();
        let (tx, rx) = mpsc::channel();

        runner.submit(
            JobDescriptor::new(
                "test-build",
                Box::new(move |id, _token| {
                    tx.send(id.as_str().to_string()).unwrap();
                    "done".to_string()
                }),
            ),
            Duration::ZERO,
        );

        let seen = tokio::task::spawn_blocking(move || rx.recv().unwrap())
            .await
            .unwrap();
        assert!(seen.starts_with("job-"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_delayed_job_prevents_run() {
        let runner = TokioJobRunner::new();
        let (tx, rx) = mpsc::channel::<()>();

        let id = runner.submit(
            JobDescriptor::new(
                "delayed",
                Box::new(move |_, _| {
                    tx.send(()).unwrap();
                    "ran".to_string()
                }),
            ),
            Duration::from_secs(60),
        );

        assert!(runner.cancel(&id));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_unknown_job_is_false() {
        let runner = TokioJobRunner::new();
        assert!(!runner.cancel(&JobId::new("no-such-job")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_running_job_sees_cancellation() {
        let runner = TokioJobRunner::new();
        let (started_tx, started_rx) = mpsc::channel();
        let (outcome_tx, outcome_rx) = mpsc::channel();

        let id = runner.submit(
            JobDescriptor::new(
                "long-build",
                Box::new(move |_, token| {
                    started_tx.send(()).unwrap();
                    while !token.is_cancelled() {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    outcome_tx.send("cancelled").unwrap();
                    "build cancelled".to_string()
                }),
            ),
            Duration::ZERO,
        );

        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();
        assert!(runner.cancel(&id));
        let outcome = tokio::task::spawn_blocking(move || outcome_rx.recv().unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, "cancelled");
    }

    #[test]
    fn test_job_id_generation_is_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("job-"));
    }
}
