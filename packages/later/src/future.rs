//! Eagerly started asynchronous values.

use crate::{
    error::{Error, Result},
    task::{cooperative_work_fn, work_fn, Config, Task},
};
use futures::future::BoxFuture;
use std::future::IntoFuture;
use tokio_util::sync::CancellationToken;


/// A value that will be available later, computed by work that starts immediately
///
/// Construction spawns the work onto the ambient tokio runtime. The work runs exactly once: every
/// call to [`value`](Self::value), on this handle or any clone of it, observes the same outcome.
/// Dropping the handle does not stop the work; only [`cancel`](Self::cancel) does.
///
/// Work built with [`new`](Self::new) never sees cancellation. It is dropped at its next suspension
/// point once cancelled. Work built with [`with_cancellation`](Self::with_cancellation) is handed
/// the task's [`CancellationToken`] and always runs to completion, so it decides for itself whether
/// and when to stop. To report that it stopped, it returns `Err(Error::Cancelled.into())`.
pub struct Future<T> {
    task: Task<T>,
}

impl<T> Future<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn `work` and return a handle to its outcome
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::builder(work).build()
    }

    /// Start configuring a future with hooks
    ///
    /// Nothing is spawned until [`FutureBuilder::build`].
    pub fn builder<F, Fut>(work: F) -> FutureBuilder<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        FutureBuilder(Config::new(work_fn(work)))
    }

    /// Spawn `work`, handing it the token that [`cancel`](Self::cancel) fires
    pub fn with_cancellation<F, Fut>(work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::builder_with_cancellation(work).build()
    }

    /// Like [`builder`](Self::builder), but `work` receives the cancellation token
    pub fn builder_with_cancellation<F, Fut>(work: F) -> FutureBuilder<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        FutureBuilder(Config::cooperative(cooperative_work_fn(work)))
    }

    /// Wait for the work to finish
    ///
    /// Resolves to the work's value, the work's error, or [`Error::Cancelled`] if a cancellation
    /// request was honored. Awaiting again returns the same result without re-running anything.
    pub async fn value(&self) -> Result<T> {
        self.task.value().await
    }

    /// The outcome, if the work has finished and its outcome has already been awaited once
    pub fn peek(&self) -> Option<Result<T>> {
        self.task.peek()
    }

    /// Request cooperative cancellation
    ///
    /// For plain work, takes effect at the work's next suspension point; work that finishes
    /// without suspending again keeps its normal outcome. For work built with
    /// [`with_cancellation`](Self::with_cancellation), this only fires the token.
    pub fn cancel(&self) {
        self.task.cancel();
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future { task: self.task.clone() }
    }
}

impl<T> IntoFuture for Future<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.value().await })
    }
}


/// Configuration for a [`Future`] that has not been spawned yet
///
/// Each setter consumes the builder and returns the updated one.
pub struct FutureBuilder<T>(Config<T>);

impl<T> FutureBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `hook` with the value when the work succeeds, before the value is released to awaiters
    pub fn on_success<F>(self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        FutureBuilder(self.0.on_success(hook))
    }

    /// Run `hook` with the error when the work fails or is cancelled, before the error is released
    /// to awaiters
    pub fn on_failure<F>(self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        FutureBuilder(self.0.on_failure(hook))
    }

    /// Spawn the work
    pub fn build(self) -> Future<T> {
        Future { task: Task::spawn(self.0, "future") }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering::SeqCst},
            Arc, Mutex,
        },
        time::Duration,
    };
    use tokio::{sync::oneshot, time::sleep};

    #[derive(Debug, thiserror::Error)]
    #[error("mock failure")]
    struct MockError;

    #[tokio::test]
    async fn resolves_to_value() {
        let future = Future::new(|| async {
            sleep(Duration::from_millis(5)).await;
            anyhow::Ok("Success")
        });
        assert_eq!(future.value().await.unwrap(), "Success");
    }

    #[tokio::test]
    async fn propagates_failure() {
        let future = Future::<&str>::new(|| async { Err(MockError.into()) });
        let error = future.value().await.unwrap_err();
        assert!(error.cause().unwrap().is::<MockError>());
    }

    #[tokio::test]
    async fn awaiting_twice_runs_work_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs2 = Arc::clone(&runs);
        let future = Future::new(move || async move {
            runs2.fetch_add(1, SeqCst);
            anyhow::Ok(42)
        });
        let clone = future.clone();
        assert_eq!(future.value().await.unwrap(), 42);
        assert_eq!(clone.value().await.unwrap(), 42);
        assert_eq!(future.await.unwrap(), 42);
        assert_eq!(runs.load(SeqCst), 1);
    }

    #[tokio::test]
    async fn starts_without_being_awaited() {
        let (send, recv) = oneshot::channel();
        let _future = Future::new(move || async move {
            let _ = send.send(());
            anyhow::Ok(())
        });
        tokio::time::timeout(Duration::from_secs(5), recv).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn hooks_fire_before_value_is_released() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let future = Future::builder(|| async { anyhow::Ok("done") })
            .on_success(move |value| seen2.lock().unwrap().push(format!("success {value}")))
            .on_failure(|_| panic!("failure hook on success path"))
            .build();
        assert_eq!(future.value().await.unwrap(), "done");
        assert_eq!(*seen.lock().unwrap(), vec!["success done".to_owned()]);
    }

    #[tokio::test]
    async fn failure_hook_sees_error() {
        let failures = Arc::new(AtomicUsize::new(0));
        let failures2 = Arc::clone(&failures);
        let future = Future::<()>::builder(|| async { Err(MockError.into()) })
            .on_success(|_| panic!("success hook on failure path"))
            .on_failure(move |error| {
                assert!(error.cause().unwrap().is::<MockError>());
                failures2.fetch_add(1, SeqCst);
            })
            .build();
        assert!(future.value().await.is_err());
        assert!(future.value().await.is_err());
        assert_eq!(failures.load(SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_is_honored_at_suspension_point() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let cancelled2 = Arc::clone(&cancelled);
        let future = Future::builder(|| async {
            sleep(Duration::from_secs(60)).await;
            anyhow::Ok("never")
        })
            .on_failure(move |error| {
                assert!(error.is_cancelled());
                cancelled2.fetch_add(1, SeqCst);
            })
            .build();
        future.cancel();
        assert!(future.value().await.unwrap_err().is_cancelled());
        assert_eq!(cancelled.load(SeqCst), 1);
    }

    #[tokio::test]
    async fn token_work_ignoring_cancel_runs_to_completion() {
        let finished = Arc::new(AtomicUsize::new(0));
        let finished2 = Arc::clone(&finished);
        let future = Future::with_cancellation(move |_token| async move {
            sleep(Duration::from_millis(50)).await;
            finished2.fetch_add(1, SeqCst);
            anyhow::Ok(1)
        });
        future.cancel();
        assert_eq!(future.value().await.unwrap(), 1);
        assert_eq!(finished.load(SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn token_lets_non_suspending_work_stop() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let cancelled2 = Arc::clone(&cancelled);
        let future = Future::<u64>::builder_with_cancellation(|token| async move {
            while !token.is_cancelled() {
                std::hint::spin_loop();
            }
            Err(Error::Cancelled.into())
        })
            .on_failure(move |error| {
                assert!(error.is_cancelled());
                cancelled2.fetch_add(1, SeqCst);
            })
            .build();
        future.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), future.value()).await.unwrap();
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(cancelled.load(SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_after_completion_keeps_outcome() {
        let future = Future::new(|| async { anyhow::Ok(5) });
        assert_eq!(future.value().await.unwrap(), 5);
        future.cancel();
        assert_eq!(future.value().await.unwrap(), 5);
        assert_eq!(future.peek().unwrap().unwrap(), 5);
    }

    #[tokio::test]
    async fn nested_future_failure_passes_through() {
        let inner = Future::<i32>::new(|| async { Err(MockError.into()) });
        let outer = Future::new(move || async move { anyhow::Ok(inner.value().await? + 1) });
        let error = outer.value().await.unwrap_err();
        assert!(error.cause().unwrap().is::<MockError>());
    }
}
