//! Bounded concurrent execution of independent fallible tasks.
//!
//! [`TaskPool::run`] drives at most `workers` futures at once on the current
//! task and returns only after every future has finished. Failed tasks are
//! logged and dropped; callers receive the successful results in completion
//! order together with the number of dropped tasks.

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use log::{debug, error};
use thiserror::Error;

/// Receives one notification per finished task.
pub trait ProgressSink {
    /// Called once before any task runs.
    fn start(&self, total: usize) {
        let _ = total;
    }

    /// Called once per finished task, whether it succeeded or failed.
    fn advance(&self);

    /// Called once after the last task finished.
    fn finish(&self) {}
}

impl<T: ProgressSink + ?Sized> ProgressSink for &T {
    fn start(&self, total: usize) {
        (**self).start(total);
    }

    fn advance(&self) {
        (**self).advance();
    }

    fn finish(&self) {
        (**self).finish();
    }
}

/// Hands out the [`ProgressSink`] that tracks one city's isochrone requests.
pub trait CityProgress {
    /// Return the sink for `city`.
    fn for_city(&self, city: &str) -> Box<dyn ProgressSink + '_>;
}

/// Progress counter backed by atomics.
#[derive(Debug, Default)]
pub struct AtomicProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl AtomicProgress {
    /// Number of tasks announced by the last [`ProgressSink::start`].
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Number of finished tasks.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

/// Every city reports into the same counter, which restarts per city.
impl CityProgress for AtomicProgress {
    fn for_city(&self, city: &str) -> Box<dyn ProgressSink + '_> {
        debug!("Tracking isochrone progress for {city}");
        Box::new(self)
    }
}

impl ProgressSink for AtomicProgress {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
    }

    fn advance(&self) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("{done}/{} tasks finished", self.total());
    }
}

/// Why a task produced no result.
#[derive(Debug, Error)]
pub enum TaskFailure<E> {
    /// The task returned an error.
    #[error("{0}")]
    Failed(E),
    /// The task did not finish within the pool's timeout.
    #[error("task timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Results of one [`TaskPool::run`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOutcome<T> {
    /// Successful results in completion order.
    pub results: Vec<T>,
    /// Number of tasks that failed or timed out.
    pub dropped: usize,
}

impl<T> Default for PoolOutcome<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            dropped: 0,
        }
    }
}

/// Runs futures with bounded parallelism.
///
/// # Examples
/// ```
/// use std::num::NonZeroUsize;
/// use catchment_pipeline::{AtomicProgress, TaskPool};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build()?.block_on(async {
/// let pool = TaskPool::new(NonZeroUsize::MIN);
/// let progress = AtomicProgress::default();
/// let tasks = (1..=3).map(|n| async move {
///     if n == 2 { Err("boom") } else { Ok(n) }
/// });
/// let outcome = pool.run(tasks, &progress).await;
/// assert_eq!(outcome.results.len(), 2);
/// assert_eq!(outcome.dropped, 1);
/// assert_eq!(progress.completed(), 3);
/// # });
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPool {
    workers: NonZeroUsize,
    timeout: Option<Duration>,
}

impl TaskPool {
    /// Create a pool running up to `workers` tasks at once.
    #[must_use]
    pub const fn new(workers: NonZeroUsize) -> Self {
        Self {
            workers,
            timeout: None,
        }
    }

    /// Abandon any task still running after `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Maximum number of concurrently running tasks.
    #[must_use]
    pub const fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    /// Run every task and wait for all of them.
    ///
    /// `progress` is started once, advanced exactly once per task and
    /// finished once, even for an empty task list. A failing task is
    /// logged at error level and excluded from the results; it is never
    /// retried.
    pub async fn run<I, F, T, E>(&self, tasks: I, progress: &dyn ProgressSink) -> PoolOutcome<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let pending: Vec<F> = tasks.into_iter().collect();
        progress.start(pending.len());
        if pending.is_empty() {
            progress.finish();
            return PoolOutcome::default();
        }

        let timeout = self.timeout;
        let mut finished = stream::iter(pending.into_iter().enumerate().map(|(index, task)| {
            async move { (index, guard(task, timeout).await) }
        }))
        .buffer_unordered(self.workers.get());

        let mut outcome = PoolOutcome::default();
        while let Some((index, result)) = finished.next().await {
            progress.advance();
            match result {
                Ok(value) => outcome.results.push(value),
                Err(failure) => {
                    error!("Task {index} dropped: {failure}");
                    outcome.dropped += 1;
                }
            }
        }
        progress.finish();
        outcome
    }
}

async fn guard<F, T, E>(task: F, timeout: Option<Duration>) -> Result<T, TaskFailure<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(result) => result.map_err(TaskFailure::Failed),
            Err(_) => Err(TaskFailure::TimedOut(limit)),
        },
        None => task.await.map_err(TaskFailure::Failed),
    }
}
