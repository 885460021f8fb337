// subscriber capability and its type-erasing adapter.

use std::{
    fmt,
    sync::{Arc, Weak},
};


/// Something that wants to hear about a [`Publisher`](crate::Publisher)'s value changes
pub trait Subscriber<V>: Send + Sync {
    /// Called with the publisher's new value, or `None` if it was unset
    ///
    /// Runs inside the publisher's serialized section, so it must not wait on the same publisher.
    fn did_update(&self, new_value: Option<V>);
}

/// Identity of a registration with a [`Publisher`](crate::Publisher)
///
/// For subscribers registered by `Arc`, this is derived from the `Arc`'s address, and can be
/// recovered with [`SubscriberId::of`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriberId(usize);

impl SubscriberId {
    /// The identity under which `subscriber` is registered when added by reference
    pub fn of<S: ?Sized>(subscriber: &Arc<S>) -> Self {
        SubscriberId(Arc::as_ptr(subscriber) as *const () as usize)
    }
}

/// Type-erased [`Subscriber`]
///
/// Holds the notification as a closure over `Option<V>`. A subscriber wrapped with
/// [`AnySubscriber::new`] is held weakly: the publisher never keeps it alive, and once its last
/// `Arc` is dropped the registration becomes inert and is pruned.
pub struct AnySubscriber<V> {
    id: SubscriberId,
    notify: Arc<dyn Fn(Option<V>) + Send + Sync>,
    // set iff the subscriber is held weakly.
    owner: Option<Weak<dyn Send + Sync>>,
}

impl<V> AnySubscriber<V> {
    /// Erase `subscriber`, without taking ownership of it
    pub fn new<S>(subscriber: &Arc<S>) -> Self
    where
        S: Subscriber<V> + 'static,
        V: 'static,
    {
        let weak = Arc::downgrade(subscriber);
        let owner: Weak<dyn Send + Sync> = weak.clone();
        AnySubscriber {
            id: SubscriberId::of(subscriber),
            notify: Arc::new(move |value: Option<V>| {
                if let Some(subscriber) = weak.upgrade() {
                    subscriber.did_update(value);
                }
            }),
            owner: Some(owner),
        }
    }

    /// Erase a notification closure, taking ownership of it
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Option<V>) + Send + Sync + 'static,
    {
        let notify: Arc<dyn Fn(Option<V>) + Send + Sync> = Arc::new(f);
        AnySubscriber {
            // the closure's allocation is owned here, so its address stays unique while registered
            id: SubscriberId::of(&notify),
            notify,
            owner: None,
        }
    }

    /// The identity this subscriber is registered under
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the underlying subscriber still exists
    pub fn is_alive(&self) -> bool {
        self.owner.as_ref().map_or(true, |owner| owner.strong_count() > 0)
    }
}

impl<V> Subscriber<V> for AnySubscriber<V> {
    fn did_update(&self, new_value: Option<V>) {
        (self.notify)(new_value)
    }
}

impl<V> Clone for AnySubscriber<V> {
    fn clone(&self) -> Self {
        AnySubscriber {
            id: self.id,
            notify: Arc::clone(&self.notify),
            owner: self.owner.clone(),
        }
    }
}

impl<V> fmt::Debug for AnySubscriber<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AnySubscriber")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}
