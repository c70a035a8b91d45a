// File: src/store.rs
// Purpose: Push-subscribable snapshot store (single writer, many readers)

use std::sync::{Arc, Mutex};

use crate::observers::{lock, Listener, ObserverList};

struct StoreInner<S> {
    state: Mutex<S>,
    observers: Mutex<ObserverList>,
}

/// A push-subscribable store: `state()` for the current snapshot,
/// `subscribe(listener)` for change notification.
///
/// The store is a single-writer resource — the router core mutates it,
/// everything else reads and subscribes. Notifications are delivered in
/// emission order with no coalescing; redundant-update suppression happens
/// in the bridges, not here.
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<S: Clone> Store<S> {
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(state),
                observers: Mutex::new(ObserverList::default()),
            }),
        }
    }

    /// Current snapshot of the state.
    pub fn state(&self) -> S {
        lock(&self.inner.state).clone()
    }

    /// Reads the state in place without cloning the whole snapshot.
    pub fn with_state<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        read(&lock(&self.inner.state))
    }

    /// Mutates the state and notifies every subscriber.
    ///
    /// The state lock is released before listeners run, so listeners may
    /// read the store re-entrantly.
    pub fn update(&self, mutate: impl FnOnce(&mut S)) {
        mutate(&mut lock(&self.inner.state));
        let listeners = lock(&self.inner.observers).snapshot();
        for listener in listeners {
            listener();
        }
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> crate::Subscription
    where
        S: Send + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = lock(&self.inner.observers).add(listener);
        let weak = Arc::downgrade(&self.inner);
        crate::Subscription::callback(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.observers).remove(id);
            }
        })
    }

    /// How many listeners are registered. The server-render short-circuit
    /// keeps this at zero.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    /// Identity comparison — two handles to the same underlying store.
    pub fn ptr_eq(a: &Store<S>, b: &Store<S>) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_update_notifies_in_emission_order() {
        let store = Store::new(0usize);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = store.subscribe({
            let store = store.clone();
            let seen = seen.clone();
            move || seen.lock().unwrap().push(store.state())
        });
        for n in 1..=3 {
            store.update(|state| *state = n);
        }
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let store = Store::new(0usize);
        let seen = Arc::new(Mutex::new(0usize));
        let sub = store.subscribe({
            let seen = seen.clone();
            move || *seen.lock().unwrap() += 1
        });
        store.update(|state| *state = 1);
        sub.cancel();
        store.update(|state| *state = 2);
        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_ptr_eq_distinguishes_stores() {
        let a = Store::new(1);
        let b = a.clone();
        let c = Store::new(1);
        assert!(Store::ptr_eq(&a, &b));
        assert!(!Store::ptr_eq(&a, &c));
    }
}
