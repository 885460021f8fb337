// lazy multi-value streams.
//
// a `Stream` begins idle, holding its work function. the first poll launches a tokio task which
// hands the work function an `Emitter` wrapping the send half of an unbounded mpsc channel, and
// the stream keeps the receive half:
//
//      Stream --poll_next--> UnboundedReceiver <--Delivery--- Emitter <--- work function
//         |                                          ^
//         \---- CancelOnDrop guard -----> task ------/ (also sends the terminal delivery)
//
// the task, rather than the emitter being dropped, signals the end of the sequence, so an emitter
// that escapes its work function cannot hold the stream open. a panic in the work function is
// caught and forwarded so it resumes in the consumer. if the channel closes with no terminal
// delivery at all, the runtime dropped the task and the consumer sees `Cancelled`.
//
// dropping the stream drops the guard, which cancels the task at its next suspension point.

mod emitter;

pub use self::emitter::Emitter;
pub(crate) use self::emitter::EmitAction;

use crate::{
    error::{Error, Result},
    task::FailureHook,
    util::cancel_on_drop::{cancellable, CancelOnDrop},
};
use futures::{
    future::{BoxFuture, FutureExt},
    stream::FusedStream,
    StreamExt,
};
use std::{
    any::Any,
    future::Future,
    mem,
    panic::{resume_unwind, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
    task::{ready, Context, Poll},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};


// message from the producer task to the consumer.
pub(crate) enum Delivery<T> {
    Value(T),
    Finished,
    Failed(Error),
    Panicked(Box<dyn Any + Send>),
}

type StreamWorkFn<T> = Box<dyn FnOnce(Emitter<T>) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

type CompletionHook = Arc<dyn Fn() + Send + Sync>;

struct Config<T> {
    work: StreamWorkFn<T>,
    emit_action: Option<EmitAction<T>>,
    on_success: Option<CompletionHook>,
    on_failure: Option<FailureHook>,
}

enum State<T> {
    // not yet polled.
    Idle(Config<T>),
    // producer task launched.
    Running {
        recv: UnboundedReceiver<Delivery<T>>,
        _task: CancelOnDrop,
    },
    // terminal state reached and reported. stays here forever.
    Done,
}

impl<T: Send + 'static> Config<T> {
    // spawn the producer task.
    fn launch(self) -> State<T> {
        let Config { work, emit_action, on_success, on_failure } = self;
        let (send, recv) = unbounded_channel();
        trace!("launching stream task");
        let task = CancelOnDrop::spawn(move |token| async move {
            let emitter = Emitter::new(send.clone(), emit_action);
            let running = cancellable(&token, async move {
                work(emitter).await.map_err(Error::from)
            });
            let result = FutureExt::catch_unwind(AssertUnwindSafe(running)).await;
            let delivery = match result {
                Err(panic) => {
                    trace!("stream task panicked");
                    Delivery::Panicked(panic)
                }
                Ok(Ok(())) => {
                    trace!("stream task finished");
                    if let Some(hook) = on_success {
                        hook();
                    }
                    Delivery::Finished
                }
                Ok(Err(error)) => {
                    trace!(%error, "stream task failed");
                    if let Some(hook) = on_failure {
                        hook(&error);
                    }
                    Delivery::Failed(error)
                }
            };
            // the consumer may already be gone
            let _ = send.send(delivery);
        });
        State::Running { recv, _task: task }
    }
}


/// A lazy, single-pass sequence of values produced by asynchronous work
///
/// The work function receives an [`Emitter`] and may emit any number of values before returning.
/// Nothing runs until the stream is first polled. Values arrive in exactly the order they were
/// emitted, and if the work function fails, its error is yielded as the last item.
///
/// `Stream` implements [`futures::Stream`] with items of `Result<T, Error>`, and is fused: after
/// the sequence ends, it keeps returning `None`.
///
/// Dropping a stream that has started cancels its work function at its next suspension point.
pub struct Stream<T> {
    state: State<T>,
}

// never pinned structurally; the receiver is polled through `&mut`.
impl<T> Unpin for Stream<T> {}

impl<T: Send + 'static> Stream<T> {
    /// Wrap `work` without starting it
    pub fn new<F, Fut>(work: F) -> Self
    where
        F: FnOnce(Emitter<T>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::builder(work).build()
    }

    /// Start configuring a stream with hooks
    pub fn builder<F, Fut>(work: F) -> StreamBuilder<T>
    where
        F: FnOnce(Emitter<T>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        StreamBuilder(Config {
            work: Box::new(move |emitter| work(emitter).boxed()),
            emit_action: None,
            on_success: None,
            on_failure: None,
        })
    }

    /// Whether the work has been launched
    pub fn is_started(&self) -> bool {
        !matches!(self.state, State::Idle(_))
    }

    // launch the producer if still idle.
    fn start(&mut self) {
        self.state = match mem::replace(&mut self.state, State::Done) {
            State::Idle(config) => config.launch(),
            state => state,
        };
    }

    /// Transform each value with `transform`
    ///
    /// The returned stream consumes this one. An error from this stream or from `transform` ends
    /// the returned stream with that error.
    pub fn map<U, F, Fut>(self, mut transform: F) -> Stream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<U>> + Send + 'static,
    {
        Stream::new(move |emitter| async move {
            let mut upstream = self;
            while let Some(value) = upstream.next().await {
                emitter.emit(transform(value?).await?).await;
            }
            anyhow::Ok(())
        })
    }

    /// Keep only the values for which `predicate` resolves to true
    pub fn filter<F, Fut>(self, mut predicate: F) -> Stream<T>
    where
        F: FnMut(&T) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Stream::new(move |emitter| async move {
            let mut upstream = self;
            while let Some(value) = upstream.next().await {
                let value = value?;
                if predicate(&value).await? {
                    emitter.emit(value).await;
                }
            }
            anyhow::Ok(())
        })
    }

    /// Transform each value with `transform`, dropping those that map to `None`
    pub fn compact_map<U, F, Fut>(self, mut transform: F) -> Stream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Option<U>>> + Send + 'static,
    {
        Stream::new(move |emitter| async move {
            let mut upstream = self;
            while let Some(value) = upstream.next().await {
                if let Some(value) = transform(value?).await? {
                    emitter.emit(value).await;
                }
            }
            anyhow::Ok(())
        })
    }

    /// Drain the stream, folding every value into an accumulator
    ///
    /// Any error aborts the fold and is returned instead of a partial result.
    pub async fn reduce<A, F, Fut>(mut self, initial: A, mut combine: F) -> Result<A>
    where
        F: FnMut(A, T) -> Fut,
        Fut: Future<Output = anyhow::Result<A>>,
    {
        let mut acc = initial;
        while let Some(value) = self.next().await {
            acc = combine(acc, value?).await?;
        }
        Ok(acc)
    }

    /// Drain the stream, updating an accumulator in place with every value
    ///
    /// `update` borrows the accumulator for the duration of the future it returns, which is why
    /// that future is boxed.
    pub async fn reduce_into<A, F>(mut self, initial: A, mut update: F) -> Result<A>
    where
        A: Send,
        F: for<'a> FnMut(&'a mut A, T) -> BoxFuture<'a, anyhow::Result<()>>,
    {
        let mut acc = initial;
        while let Some(value) = self.next().await {
            update(&mut acc, value?).await?;
        }
        Ok(acc)
    }

    /// Drain the stream, running `f` on every value
    ///
    /// Stops at and returns the first error, whether from the stream or from `f`.
    pub async fn for_each<F, Fut>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        while let Some(value) = self.next().await {
            f(value?).await?;
        }
        Ok(())
    }

    /// Drain the stream, collecting every value in emission order
    pub async fn into_vec(mut self) -> Result<Vec<T>> {
        let mut values = Vec::new();
        while let Some(value) = self.next().await {
            values.push(value?);
        }
        Ok(values)
    }
}

impl<T: Send + 'static> futures::Stream for Stream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.start();
        let State::Running { recv, .. } = &mut this.state else {
            return Poll::Ready(None);
        };
        let item = match ready!(recv.poll_recv(cx)) {
            Some(Delivery::Value(value)) => return Poll::Ready(Some(Ok(value))),
            Some(Delivery::Finished) => None,
            Some(Delivery::Failed(error)) => Some(Err(error)),
            Some(Delivery::Panicked(panic)) => {
                this.state = State::Done;
                resume_unwind(panic);
            }
            // the task was dropped by a shutting-down runtime
            None => Some(Err(Error::Cancelled)),
        };
        this.state = State::Done;
        Poll::Ready(item)
    }
}

impl<T: Send + 'static> FusedStream for Stream<T> {
    fn is_terminated(&self) -> bool {
        matches!(self.state, State::Done)
    }
}


/// Configuration for a [`Stream`]
///
/// Each setter consumes the builder and returns the updated one.
pub struct StreamBuilder<T>(Config<T>);

impl<T: Send + 'static> StreamBuilder<T> {
    /// Run `hook` when the work function returns successfully, before the consumer sees the end
    /// of the sequence
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.0.on_success = Some(Arc::new(hook));
        self
    }

    /// Run `hook` when the work function fails or is cancelled, before the consumer sees the
    /// error
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.0.on_failure = Some(Arc::new(hook));
        self
    }

    // run `action` on every emitted value before it is delivered.
    pub(crate) fn emit_action(mut self, action: EmitAction<T>) -> Self {
        self.0.emit_action = Some(action);
        self
    }

    /// Produce the stream, still idle
    pub fn build(self) -> Stream<T> {
        Stream { state: State::Idle(self.0) }
    }
}
