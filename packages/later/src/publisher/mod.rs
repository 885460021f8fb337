// latest-value publisher.
//
// all state lives behind one tokio mutex, which is the publisher's serialized access point. every
// public operation is exactly one critical section, and subscriber callbacks run inside it, so
// notifications are totally ordered and a removal takes effect for every update serialized after
// it. tokio's mutex is FIFO-fair, so concurrent callers are served in the order they queued.

mod subscriber;

pub use self::subscriber::{AnySubscriber, Subscriber, SubscriberId};

use crate::{
    deferred::{Deferred, DeferredBuilder},
    future::{Future, FutureBuilder},
    stream::{EmitAction, Emitter, Stream, StreamBuilder},
};
use futures::future::FutureExt;
use std::sync::Arc;
use tokio::sync::Mutex;


/// A mutable latest-value cell that notifies registered [`Subscriber`]s of every change
///
/// Cloning produces another handle to the same publisher.
pub struct Publisher<V> {
    shared: Arc<Mutex<State<V>>>,
}

struct State<V> {
    value: Option<V>,
    // in registration order. ids are unique.
    subscribers: Vec<AnySubscriber<V>>,
}

impl<V> State<V>
where
    V: Clone,
{
    // register or replace in place, then deliver the current value to it.
    fn register(&mut self, subscriber: AnySubscriber<V>) -> SubscriberId {
        self.subscribers.retain(AnySubscriber::is_alive);
        let id = subscriber.id();
        match self.subscribers.iter_mut().find(|existing| existing.id() == id) {
            Some(existing) => *existing = subscriber.clone(),
            None => self.subscribers.push(subscriber.clone()),
        }
        subscriber.did_update(self.value.clone());
        id
    }
}

impl<V> Publisher<V>
where
    V: Clone + Send + 'static,
{
    /// Construct with an initial value and no subscribers
    pub fn new(initial: Option<V>) -> Self {
        Self::with_subscribers(initial, [])
    }

    /// Construct with an initial value and initial subscribers
    ///
    /// Each initial subscriber is notified of the initial value, just as if it had been
    /// [`add`](Self::add_any)ed.
    pub fn with_subscribers<I>(initial: Option<V>, subscribers: I) -> Self
    where
        I: IntoIterator<Item = AnySubscriber<V>>,
    {
        let mut state = State { value: initial, subscribers: Vec::new() };
        for subscriber in subscribers {
            state.register(subscriber);
        }
        Publisher { shared: Arc::new(Mutex::new(state)) }
    }

    /// The current value
    pub async fn current_value(&self) -> Option<V> {
        self.shared.lock().await.value.clone()
    }

    /// Number of live registrations
    pub async fn subscriber_count(&self) -> usize {
        self.shared.lock().await.subscribers.iter().filter(|s| s.is_alive()).count()
    }

    /// Register `subscriber` without taking ownership of it, and deliver the current value to it
    ///
    /// Adding a subscriber that is already registered replaces its registration and delivers the
    /// current value again.
    pub async fn add<S>(&self, subscriber: &Arc<S>) -> SubscriberId
    where
        S: Subscriber<V> + 'static,
    {
        self.add_any(AnySubscriber::new(subscriber)).await
    }

    /// Register a notification closure, and deliver the current value to it
    pub async fn add_fn<F>(&self, f: F) -> SubscriberId
    where
        F: Fn(Option<V>) + Send + Sync + 'static,
    {
        self.add_any(AnySubscriber::from_fn(f)).await
    }

    /// Register a type-erased subscriber, and deliver the current value to it
    pub async fn add_any(&self, subscriber: AnySubscriber<V>) -> SubscriberId {
        let id = self.shared.lock().await.register(subscriber);
        debug!(?id, "subscriber added");
        id
    }

    /// Deregister a subscriber
    ///
    /// Does nothing if `id` is not registered.
    pub async fn remove(&self, id: SubscriberId) {
        let mut state = self.shared.lock().await;
        let before = state.subscribers.len();
        state.subscribers.retain(|subscriber| subscriber.id() != id);
        if state.subscribers.len() < before {
            debug!(?id, "subscriber removed");
        }
    }

    /// Set the value and notify every registered subscriber of it, in registration order
    pub async fn update(&self, value: Option<V>) {
        let mut state = self.shared.lock().await;
        state.subscribers.retain(AnySubscriber::is_alive);
        state.value = value;
        for subscriber in &state.subscribers {
            subscriber.did_update(state.value.clone());
        }
    }

    /// Spawn `work` as a [`Future`] whose value is also published here
    ///
    /// On success, this publisher is updated before the future's success hook runs and before
    /// its value is released. On failure, this publisher is left alone.
    pub fn future<F, Fut>(&self, work: F) -> Future<V>
    where
        V: Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.future_builder(work).build()
    }

    /// Like [`future`](Self::future), but returns a builder to attach hooks
    pub fn future_builder<F, Fut>(&self, work: F) -> FutureBuilder<V>
    where
        V: Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let publisher = self.clone();
        Future::builder(move || publisher.publishing(work))
    }

    /// Wrap `work` as a [`Deferred`] whose value is also published here once it is started and
    /// succeeds
    pub fn deferred<F, Fut>(&self, work: F) -> Deferred<V>
    where
        V: Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.deferred_builder(work).build()
    }

    /// Like [`deferred`](Self::deferred), but returns a builder to attach hooks
    pub fn deferred_builder<F, Fut>(&self, work: F) -> DeferredBuilder<V>
    where
        V: Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let publisher = self.clone();
        Deferred::builder(move || publisher.publishing(work))
    }

    /// Wrap `work` as a [`Stream`] whose every emitted value is also published here
    ///
    /// Each value is published before it is queued for the stream's own consumer.
    pub fn stream<F, Fut>(&self, work: F) -> Stream<V>
    where
        F: FnOnce(Emitter<V>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.stream_builder(work).build()
    }

    /// Like [`stream`](Self::stream), but returns a builder to attach hooks
    pub fn stream_builder<F, Fut>(&self, work: F) -> StreamBuilder<V>
    where
        F: FnOnce(Emitter<V>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let publisher = self.clone();
        let action: EmitAction<V> = Arc::new(move |value: &V| {
            let publisher = publisher.clone();
            let value = value.clone();
            async move { publisher.update(Some(value)).await }.boxed()
        });
        Stream::builder(work).emit_action(action)
    }

    // run `work`, publishing its value on success.
    async fn publishing<F, Fut>(self, work: F) -> anyhow::Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<V>>,
    {
        let value = work().await?;
        self.update(Some(value.clone())).await;
        Ok(value)
    }
}

impl<V> Clone for Publisher<V> {
    fn clone(&self) -> Self {
        Publisher { shared: Arc::clone(&self.shared) }
    }
}

impl<V> Default for Publisher<V>
where
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new(None)
    }
}
