// File: src/value.rs
// Purpose: Reactive values (Stored/Derived) and subscription handles

use std::sync::{Arc, Mutex, Weak};

use crate::observers::{lock, Listener, ObserverList};

/// Teardown handle for an object-shaped subscription.
///
/// Stores from different eras expose either a bare unsubscribe function or
/// an object with an `unsubscribe()` method; [`Subscription`] accepts both.
pub trait SubscriptionGuard: Send {
    fn unsubscribe(self: Box<Self>);
}

/// A live subscription to a store or reactive value.
///
/// Cancellation is explicit: dropping a `Subscription` without calling
/// [`Subscription::cancel`] leaves the listener registered. [`Derived`]
/// owns its upstream subscriptions and cancels them on drop.
pub enum Subscription {
    /// Bare teardown function.
    Callback(Box<dyn FnOnce() + Send>),
    /// `{ unsubscribe() }`-shaped handle.
    Guard(Box<dyn SubscriptionGuard>),
}

impl Subscription {
    pub fn callback(teardown: impl FnOnce() + Send + 'static) -> Self {
        Subscription::Callback(Box::new(teardown))
    }

    pub fn guard(guard: impl SubscriptionGuard + 'static) -> Self {
        Subscription::Guard(Box::new(guard))
    }

    /// Tears the subscription down, whichever shape it carries.
    pub fn cancel(self) {
        match self {
            Subscription::Callback(teardown) => teardown(),
            Subscription::Guard(guard) => guard.unsubscribe(),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shape = match self {
            Subscription::Callback(_) => "callback",
            Subscription::Guard(_) => "guard",
        };
        f.debug_struct("Subscription").field("shape", &shape).finish()
    }
}

struct StoredInner<T> {
    value: Mutex<T>,
    observers: Mutex<ObserverList>,
}

/// A reactive value: `get()` the current snapshot, `on_change()` to watch.
///
/// Observers are notified after the new value is committed, in registration
/// order. `set()` always notifies; equality suppression is the caller's
/// concern (the bridges apply it before calling `set`).
pub struct Stored<T> {
    inner: Arc<StoredInner<T>>,
}

impl<T> Clone for Stored<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: Clone> Stored<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(StoredInner {
                value: Mutex::new(value),
                observers: Mutex::new(ObserverList::default()),
            }),
        }
    }

    pub fn get(&self) -> T {
        lock(&self.inner.value).clone()
    }

    /// Reads the value without cloning it out.
    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&lock(&self.inner.value))
    }

    pub fn set(&self, value: T) {
        *lock(&self.inner.value) = value;
        self.notify();
    }

    pub fn on_change(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription
    where
        T: Send + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = lock(&self.inner.observers).add(listener);
        let weak: Weak<StoredInner<T>> = Arc::downgrade(&self.inner);
        Subscription::callback(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.observers).remove(id);
            }
        })
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    fn notify(&self) {
        let listeners = lock(&self.inner.observers).snapshot();
        for listener in listeners {
            listener();
        }
    }
}

/// A reactive value kept current by upstream subscriptions.
///
/// Dropping a `Derived` cancels every subscription it owns; a server-pass
/// snapshot simply owns none.
pub struct Derived<T> {
    value: Stored<T>,
    upstream: Mutex<Vec<Subscription>>,
}

impl<T: Clone> Derived<T> {
    pub(crate) fn new(value: Stored<T>, upstream: Vec<Subscription>) -> Self {
        Self { value, upstream: Mutex::new(upstream) }
    }

    /// One-shot snapshot with no update source (server render pass).
    pub(crate) fn snapshot(value: Stored<T>) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn get(&self) -> T {
        self.value.get()
    }

    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        self.value.with(read)
    }

    pub fn on_change(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription
    where
        T: Send + 'static,
    {
        self.value.on_change(listener)
    }

    /// Whether this value has a live update source.
    pub fn is_live(&self) -> bool {
        !lock(&self.upstream).is_empty()
    }

    /// Adds a subscription whose lifetime should follow this value.
    ///
    /// Used by accessors that layer an index-tracking subscription on top
    /// of a bridge-produced value.
    pub fn adopt(&self, subscription: Subscription) {
        lock(&self.upstream).push(subscription);
    }
}

impl<T> Drop for Derived<T> {
    fn drop(&mut self) {
        for subscription in lock(&self.upstream).drain(..) {
            subscription.cancel();
        }
    }
}
