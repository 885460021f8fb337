//! Lock-guarded value cell.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};


/// A single value that can be read and written from any number of tasks
///
/// Every operation holds the lock for its whole duration, so operations on one cell never
/// interleave. [`update`](Self::update) works on a copy and stores it back in one step, so no
/// reader ever observes a half-applied update.
///
/// The lock is never held across an await point, which also makes the cell safe to use from
/// synchronous callbacks such as [`Subscriber::did_update`](crate::Subscriber::did_update).
pub struct SendableValue<T> {
    value: Mutex<T>,
}

impl<T> SendableValue<T> {
    /// Construct with an initial value
    pub fn new(initial: T) -> Self {
        SendableValue { value: Mutex::new(initial) }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        // writes are whole-value swaps, so a poisoned lock still holds a consistent value
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the value
    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    /// Consume the cell, returning the value
    pub fn into_inner(self) -> T {
        self.value.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> SendableValue<T> {
    /// Read the value
    pub async fn value(&self) -> T {
        self.lock().clone()
    }

    /// Read-modify-write the value
    ///
    /// `f` mutates a copy. If it panics, the stored value is left untouched.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut guard = self.lock();
        let mut copy = guard.clone();
        f(&mut copy);
        *guard = copy;
    }
}

impl<T: Default> Default for SendableValue<T> {
    fn default() -> Self {
        SendableValue::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SendableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("SendableValue").field(&*self.lock()).finish()
    }
}
