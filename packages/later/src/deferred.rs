//! Asynchronous values that start on demand.

use crate::{
    error::{Error, Result},
    task::{cooperative_work_fn, work_fn, Config, Task},
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;


/// Like a [`Future`](crate::Future), but the work does not start until [`start`](Self::start)
///
/// Reading the value of a deferred that was never started fails with
/// [`Error::DeferredNotStarted`]. Once started, it behaves exactly like a `Future`. To share one
/// deferred between tasks, wrap it in an `Arc`; `start` takes `&self` and only the first call
/// spawns anything.
pub struct Deferred<T> {
    // begins with config set and task unset. `start` moves config into a spawned task, and that
    // is the only transition.
    state: Mutex<State<T>>,
}

struct State<T> {
    config: Option<Config<T>>,
    task: Option<Task<T>>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap `work` without starting it
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::builder(work).build()
    }

    /// Start configuring a deferred with hooks
    pub fn builder<F, Fut>(work: F) -> DeferredBuilder<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        DeferredBuilder(Config::new(work_fn(work)))
    }

    /// Wrap `work` without starting it, handing it the token that [`cancel`](Self::cancel) fires
    /// once started
    ///
    /// Such work runs to completion even if cancelled. See
    /// [`Future::with_cancellation`](crate::Future::with_cancellation).
    pub fn with_cancellation<F, Fut>(work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::builder_with_cancellation(work).build()
    }

    /// Like [`builder`](Self::builder), but `work` receives the cancellation token
    pub fn builder_with_cancellation<F, Fut>(work: F) -> DeferredBuilder<T>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        DeferredBuilder(Config::cooperative(cooperative_work_fn(work)))
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // the state is only ever swapped whole, so a poisoned lock still holds a valid state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the work, unless it has already been started
    ///
    /// Calling this again after the first call does nothing.
    pub fn start(&self) {
        let mut state = self.lock();
        match state.config.take() {
            Some(config) => state.task = Some(Task::spawn(config, "deferred")),
            None => debug!("deferred already started"),
        }
    }

    /// Whether [`start`](Self::start) has been called
    pub fn is_started(&self) -> bool {
        self.lock().task.is_some()
    }

    /// Wait for the work to finish
    ///
    /// Fails immediately with [`Error::DeferredNotStarted`] if not started. Otherwise behaves like
    /// [`Future::value`](crate::Future::value).
    pub async fn value(&self) -> Result<T> {
        // don't hold the lock across the await
        let task = self.lock().task.clone();
        match task {
            Some(task) => task.value().await,
            None => Err(Error::DeferredNotStarted),
        }
    }

    /// Request cooperative cancellation
    ///
    /// Does nothing if not started. In particular, cancelling and then starting runs the work
    /// normally.
    pub fn cancel(&self) {
        match &self.lock().task {
            Some(task) => task.cancel(),
            None => debug!("cancel on deferred that was not started"),
        }
    }
}


/// Configuration for a [`Deferred`]
///
/// Each setter consumes the builder and returns the updated one.
pub struct DeferredBuilder<T>(Config<T>);

impl<T> DeferredBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `hook` with the value when the work succeeds
    pub fn on_success<F>(self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        DeferredBuilder(self.0.on_success(hook))
    }

    /// Run `hook` with the error when the work fails or is cancelled
    pub fn on_failure<F>(self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        DeferredBuilder(self.0.on_failure(hook))
    }

    /// Produce the deferred, still not started
    pub fn build(self) -> Deferred<T> {
        Deferred {
            state: Mutex::new(State {
                config: Some(self.0),
                task: None,
            }),
        }
    }
}
