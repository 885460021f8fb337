// the running-task core shared by `Future` and `Deferred`.
//
// a task is spawned onto tokio immediately. its outcome is funneled through a
// `futures::future::Shared` so that any number of handles can await it and all observe the same
// `Result`, without the work running more than once.
//
// every task owns a `CancellationToken`. plain work functions never see it, so the task races
// them against the token and drops them at their next suspension point once it fires. cooperative
// work functions receive a clone of the token and run to completion; whatever they return is the
// outcome.

use crate::{
    error::Error,
    util::cancel_on_drop::cancellable,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::{
    future::Future,
    panic::resume_unwind,
    sync::Arc,
};
use tokio_util::sync::CancellationToken;


// type-erased work function. plain work functions ignore the token.
pub(crate) type WorkFn<T> =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, anyhow::Result<T>> + Send>;

pub(crate) type SuccessHook<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) type FailureHook = Arc<dyn Fn(&Error) + Send + Sync>;

// erase a caller-supplied work function.
pub(crate) fn work_fn<F, Fut, T>(work: F) -> WorkFn<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: 'static,
{
    Box::new(move |_| work().boxed())
}

// erase a caller-supplied work function that observes cancellation itself.
pub(crate) fn cooperative_work_fn<F, Fut, T>(work: F) -> WorkFn<T>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: 'static,
{
    Box::new(move |token| work(token).boxed())
}

// work function plus optional hooks. the fluent setters consume and return the config, so a
// partially-configured value is never shared.
pub(crate) struct Config<T> {
    pub(crate) work: WorkFn<T>,
    // whether `work` is handed the token and left to honor it.
    pub(crate) cooperative: bool,
    pub(crate) on_success: Option<SuccessHook<T>>,
    pub(crate) on_failure: Option<FailureHook>,
}

impl<T> Config<T> {
    pub(crate) fn new(work: WorkFn<T>) -> Self {
        Config { work, cooperative: false, on_success: None, on_failure: None }
    }

    pub(crate) fn cooperative(work: WorkFn<T>) -> Self {
        Config { cooperative: true, ..Self::new(work) }
    }

    pub(crate) fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub(crate) fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(hook));
        self
    }
}

// handle to a spawned task. cloning shares the same outcome.
pub(crate) struct Task<T> {
    outcome: Shared<BoxFuture<'static, Result<T, Error>>>,
    token: CancellationToken,
}

impl<T> Task<T>
where
    T: Clone + Send + Sync + 'static,
{
    // spawn the configured work onto the ambient tokio runtime.
    //
    // hooks run inside the task, after the work resolves and before the outcome is released to
    // awaiters.
    pub(crate) fn spawn(config: Config<T>, kind: &'static str) -> Self {
        let Config { work, cooperative, on_success, on_failure } = config;
        let token = CancellationToken::new();
        let task_token = token.clone();
        trace!(kind, cooperative, "spawning task");
        let handle = tokio::spawn(async move {
            let work_token = task_token.clone();
            let result = if cooperative {
                work(work_token).await.map_err(Error::from)
            } else {
                cancellable(&task_token, async move {
                    work(work_token).await.map_err(Error::from)
                }).await
            };
            match &result {
                Ok(value) => {
                    trace!(kind, "task succeeded");
                    if let Some(hook) = on_success {
                        hook(value);
                    }
                }
                Err(error) => {
                    trace!(kind, %error, "task failed");
                    if let Some(hook) = on_failure {
                        hook(error);
                    }
                }
            }
            result
        });
        let outcome = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => resume_unwind(e.into_panic()),
                // the runtime dropped the task, i.e. it is shutting down
                Err(_) => Err(Error::Cancelled),
            }
        }.boxed().shared();
        Task { outcome, token }
    }

    // await the shared outcome.
    pub(crate) async fn value(&self) -> Result<T, Error> {
        self.outcome.clone().await
    }

    // the outcome, if the task has already finished and been awaited at least once.
    pub(crate) fn peek(&self) -> Option<Result<T, Error>> {
        self.outcome.peek().cloned()
    }

    pub(crate) fn cancel(&self) {
        debug!("task cancellation requested");
        self.token.cancel();
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Task {
            outcome: self.outcome.clone(),
            token: self.token.clone(),
        }
    }
}
