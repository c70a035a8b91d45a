// File: src/observers.rs
// Purpose: Shared observer list used by stores and reactive values

use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) type Listener = Arc<dyn Fn() + Send + Sync>;

/// Recovers the guard from a poisoned mutex instead of propagating the
/// poison. Listener panics must not wedge every other subscriber.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Listener registry keyed by monotonically increasing ids.
///
/// Notification order is registration order; removal by id. The listener
/// snapshot is cloned out before invocation so listeners may re-enter the
/// owning store or value without deadlocking.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

impl ObserverList {
    pub(crate) fn add(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    pub(crate) fn snapshot(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, listener)| listener.clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_in_registration_order() {
        let mut list = ObserverList::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let log = log.clone();
            list.add(Arc::new(move || lock(&log).push(tag)));
        }
        for listener in list.snapshot() {
            listener();
        }
        assert_eq!(*lock(&log), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_removed_listener_not_notified() {
        let mut list = ObserverList::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = {
            let hits = hits.clone();
            list.add(Arc::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
        };
        list.remove(id);
        for listener in list.snapshot() {
            listener();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(list.len(), 0);
    }
}
