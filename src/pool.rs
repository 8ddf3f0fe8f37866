/*!
pool.rs - bounded task pool and sequential helpers.

  - TaskPool::run         FIFO queue, at most `concurrency` jobs in flight,
                          every job settles, results in submission order
  - TaskPool::spawn       same, on a tokio task (fire-and-forget)
  - parallel              wait_all switch over the two above
  - for_each_in_order     one item at a time, stops at the first error
  - retry                 re-run a handler up to N attempts

Jobs are polled cooperatively from the calling task (FuturesUnordered), so
"in flight" means started and not yet settled. Completion order is
unspecified. A failing or panicking job is recorded as a `JobError` and never
affects its siblings.
*/

use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;

use crate::error::JobError;

/// A deferred unit of work; nothing runs until the pool calls it.
pub type Job<T> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send>;

/// Wrap an async closure as a `Job`.
pub fn job<T, F, Fut>(f: F) -> Job<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

/// Upper bound for pool concurrency (CPU count, at least 1).
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPool {
    concurrency: usize,
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new(available_parallelism())
    }
}

impl TaskPool {
    /// `concurrency` is clamped to `[1, available_parallelism()]`.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.clamp(1, available_parallelism()),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every job and wait for all of them to settle.
    pub async fn run<T>(&self, jobs: Vec<Job<T>>) -> Vec<Result<T, JobError>>
    where
        T: Send + 'static,
    {
        let total = jobs.len();
        let mut queue: VecDeque<(usize, Job<T>)> = jobs.into_iter().enumerate().collect();
        let mut running = FuturesUnordered::new();
        let mut results: Vec<Option<Result<T, JobError>>> = (0..total).map(|_| None).collect();

        tracing::debug!(jobs = total, concurrency = self.concurrency, "task pool started");
        loop {
            while running.len() < self.concurrency
                && let Some((index, job)) = queue.pop_front()
            {
                tracing::trace!(index, "job started");
                running.push(async move {
                    let outcome = AssertUnwindSafe(async move { job().await })
                        .catch_unwind()
                        .await;
                    (index, outcome)
                });
            }

            let Some((index, outcome)) = running.next().await else {
                break;
            };
            let settled = match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(source)) => Err(JobError::Failed { index, source }),
                Err(panic) => Err(JobError::Panicked {
                    index,
                    message: panic_message(panic.as_ref()),
                }),
            };
            if let Err(e) = &settled {
                tracing::debug!(index, error = %e, "job failed");
            }
            results[index] = Some(settled);
        }

        results.into_iter().flatten().collect()
    }

    /// Start the pool on a tokio task and return immediately.
    pub fn spawn<T>(&self, jobs: Vec<Job<T>>) -> JoinHandle<Vec<Result<T, JobError>>>
    where
        T: Send + 'static,
    {
        let pool = *self;
        tokio::spawn(async move { pool.run(jobs).await })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result of `parallel`: settled outcomes, or a handle when not waiting.
#[derive(Debug)]
pub enum PoolRun<T> {
    Settled(Vec<Result<T, JobError>>),
    Detached(JoinHandle<Vec<Result<T, JobError>>>),
}

/// Run `jobs` with at most `concurrency` in flight. With `wait_all` the call
/// returns once every job settled; otherwise the pool keeps running detached.
pub async fn parallel<T>(jobs: Vec<Job<T>>, concurrency: usize, wait_all: bool) -> PoolRun<T>
where
    T: Send + 'static,
{
    let pool = TaskPool::new(concurrency);
    if wait_all {
        PoolRun::Settled(pool.run(jobs).await)
    } else {
        PoolRun::Detached(pool.spawn(jobs))
    }
}

/// Await `f(item, index)` for each item in order; the first error stops the loop.
/// Maps iterate as `(key, value)` items.
pub async fn for_each_in_order<I, F, Fut, E>(items: I, mut f: F) -> Result<(), E>
where
    I: IntoIterator,
    F: FnMut(I::Item, usize) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    for (index, item) in items.into_iter().enumerate() {
        f(item, index).await?;
    }
    Ok(())
}

/// Call `f(attempt, times)` until it succeeds or `times` attempts were made.
/// Returns the last error when every attempt failed.
pub async fn retry<T, F, Fut>(times: usize, mut f: F) -> anyhow::Result<T>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let times = times.max(1);
    let mut attempt = 1;
    loop {
        match f(attempt, times).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= times => return Err(e),
            Err(e) => {
                tracing::debug!(attempt, times, error = %e, "attempt failed; retrying");
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn concurrency_is_clamped() {
        assert_eq!(TaskPool::new(0).concurrency(), 1);
        assert_eq!(
            TaskPool::new(usize::MAX).concurrency(),
            available_parallelism()
        );
    }

    #[tokio::test]
    async fn in_flight_reaches_but_never_exceeds_limit() {
        // jobs are polled from one task, so the bound holds whatever the CPU count
        let pool = TaskPool { concurrency: 3 };
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let settled = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<Job<usize>> = (0..10)
            .map(|i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                let settled = Arc::clone(&settled);
                job(move || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5 + (i as u64 % 3) * 5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    settled.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                })
            })
            .collect();

        let results = pool.run(jobs).await;
        assert_eq!(settled.load(Ordering::SeqCst), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let jobs: Vec<Job<u32>> = vec![
            job(|| async { Ok(1) }),
            job(|| async { Err(anyhow::anyhow!("boom")) }),
            job(|| async { Ok(3) }),
        ];
        let results = TaskPool::new(2).run(jobs).await;
        assert_eq!(results.len(), 3);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert!(matches!(results[1], Err(JobError::Failed { index: 1, .. })));
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }

    #[tokio::test]
    async fn panics_are_isolated() {
        let jobs: Vec<Job<u32>> = vec![
            job(|| async { panic!("kaboom") }),
            job(|| async { Ok(2) }),
        ];
        let results = TaskPool::new(1).run(jobs).await;
        match &results[0] {
            Err(JobError::Panicked { index, message }) => {
                assert_eq!(*index, 0);
                assert_eq!(message, "kaboom");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*results[1].as_ref().unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_pool_settles() {
        let results: Vec<Result<(), JobError>> = TaskPool::new(4).run(Vec::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn detached_run_can_be_joined() {
        let jobs: Vec<Job<u32>> = (0..4).map(|i| job(move || async move { Ok(i) })).collect();
        match parallel(jobs, 2, false).await {
            PoolRun::Detached(handle) => {
                let results = handle.await.unwrap();
                assert_eq!(results.len(), 4);
            }
            PoolRun::Settled(_) => panic!("expected detached run"),
        }
        let jobs: Vec<Job<u32>> = vec![job(|| async { Ok(7) })];
        assert!(matches!(parallel(jobs, 2, true).await, PoolRun::Settled(r) if r.len() == 1));
    }

    #[tokio::test]
    async fn in_order_stops_at_first_error() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let counter = AtomicUsize::new(0);
        let result = for_each_in_order(vec![1, 2, 3, 4, 5], |item, index| {
            let seen = Arc::clone(&seen);
            let expected = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                assert_eq!(index, expected);
                seen.lock().unwrap().push(item);
                if item == 3 {
                    anyhow::bail!("stop at {item}");
                }
                Ok(())
            }
        })
        .await;
        assert_eq!(result.unwrap_err().to_string(), "stop at 3");
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn in_order_over_map() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        let mut keys = Vec::new();
        for_each_in_order(map, |(k, v), _| {
            keys.push((k, v));
            async { Ok::<(), anyhow::Error>(()) }
        })
        .await
        .unwrap();
        assert_eq!(keys, vec![("a", 1), ("b", 2)]);
    }

    #[tokio::test]
    async fn retry_until_success() {
        let attempts = AtomicUsize::new(0);
        let value = retry(3, |attempt, times| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                assert_eq!(times, 3);
                if attempt < 3 {
                    anyhow::bail!("attempt {attempt}");
                }
                Ok(attempt)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_returns_last_error() {
        let err = retry(2, |attempt, _| async move {
            Err::<(), _>(anyhow::anyhow!("attempt {attempt}"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "attempt 2");
    }
}
