// File: src/bridge.rs
// Purpose: Adapt an externally-owned store (and store references) into derived reactive values

use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::observers::lock;
use crate::{shallow_eq, Derived, ShallowEq, Store, Stored, Subscription};

/// Which kind of render pass the bridge is serving.
///
/// A server pass is a single synchronous render: there is no change
/// notification to observe inside it, and subscribing would leak a
/// listener with no teardown point. The bridges return a one-shot
/// snapshot instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Server,
    Client,
}

/// Derives a reactive value from `selector` over `store`, using
/// [`shallow_eq`] to suppress redundant notifications.
pub fn subscribe<S, T>(
    store: &Store<S>,
    selector: impl Fn(&S) -> T + Send + Sync + 'static,
    mode: RenderMode,
) -> Derived<T>
where
    S: Clone + Send + 'static,
    T: ShallowEq + Clone + Send + Sync + 'static,
{
    subscribe_with(store, selector, shallow_eq, mode)
}

/// [`subscribe`] with a caller-supplied equality function.
///
/// The initial value is computed synchronously; afterwards the selector is
/// recomputed on every store notification and committed only when
/// `equality(old, new)` is false. Equality only suppresses redundant
/// notifications — distinct updates are delivered in store emission order.
pub fn subscribe_with<S, T, E>(
    store: &Store<S>,
    selector: impl Fn(&S) -> T + Send + Sync + 'static,
    equality: E,
    mode: RenderMode,
) -> Derived<T>
where
    S: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let value = Stored::new(store.with_state(&selector));
    if mode == RenderMode::Server {
        trace!("server render pass: one-shot snapshot, no subscription");
        return Derived::snapshot(value);
    }

    let subscription = store.subscribe({
        let store = store.clone();
        let value = value.clone();
        move || {
            let next = store.with_state(&selector);
            let changed = value.with(|current| !equality(current, &next));
            if changed {
                value.set(next);
            } else {
                trace!("suppressing redundant store notification");
            }
        }
    });
    Derived::new(value, vec![subscription])
}

/// Follows a *reference* to a store, using [`shallow_eq`] on the selected
/// value. See [`subscribe_ref_with`].
pub fn subscribe_ref<S, T>(
    store_ref: &Stored<Option<Store<S>>>,
    selector: impl Fn(&S) -> T + Send + Sync + 'static,
    mode: RenderMode,
) -> Derived<Option<T>>
where
    S: Clone + Send + 'static,
    T: ShallowEq + Clone + Send + Sync + 'static,
{
    subscribe_ref_with(store_ref, selector, shallow_eq, mode)
}

struct ActiveSubscription<S> {
    store: Store<S>,
    subscription: Subscription,
}

/// Derives a single stable value from whichever store `store_ref`
/// currently points at.
///
/// Whenever the reference changes identity (`Store::ptr_eq`), the old
/// subscription is fully torn down before the new store is touched, and
/// the selector is recomputed immediately against the new store's current
/// state — or `None` when the reference is absent — so no frame observes
/// a stale store.
pub fn subscribe_ref_with<S, T, E>(
    store_ref: &Stored<Option<Store<S>>>,
    selector: impl Fn(&S) -> T + Send + Sync + 'static,
    equality: E,
    mode: RenderMode,
) -> Derived<Option<T>>
where
    S: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let selector: Arc<dyn Fn(&S) -> T + Send + Sync> = Arc::new(selector);
    let initial = store_ref
        .get()
        .map(|store| store.with_state(|state| selector(state)));
    let value = Stored::new(initial);
    if mode == RenderMode::Server {
        trace!("server render pass: one-shot snapshot, no subscription");
        return Derived::snapshot(value);
    }

    let equality = Arc::new(equality);
    let apply: Arc<dyn Fn(Option<T>) + Send + Sync> = {
        let value = value.clone();
        Arc::new(move |next: Option<T>| {
            let changed = value.with(|current| match (current, &next) {
                (None, None) => false,
                (Some(a), Some(b)) => !equality(a, b),
                _ => true,
            });
            if changed {
                value.set(next);
            } else {
                trace!("suppressing redundant store notification");
            }
        })
    };

    let active: Arc<Mutex<Option<ActiveSubscription<S>>>> = Arc::new(Mutex::new(None));
    let resubscribe: Arc<dyn Fn() + Send + Sync> = {
        let store_ref = store_ref.clone();
        let selector = selector.clone();
        let apply = apply.clone();
        let active = active.clone();
        Arc::new(move || {
            let next_store = store_ref.get();
            {
                let current = lock(&active);
                match (current.as_ref(), next_store.as_ref()) {
                    (Some(live), Some(next)) if Store::ptr_eq(&live.store, next) => return,
                    (None, None) => return,
                    _ => {}
                }
            }
            // Old subscription comes down before the new store is touched,
            // so no notification from a stale store can be observed.
            if let Some(previous) = lock(&active).take() {
                previous.subscription.cancel();
            }
            match next_store {
                None => apply(None),
                Some(store) => {
                    let subscription = store.subscribe({
                        let store = store.clone();
                        let selector = selector.clone();
                        let apply = apply.clone();
                        move || apply(Some(store.with_state(|state| selector(state))))
                    });
                    *lock(&active) = Some(ActiveSubscription {
                        store: store.clone(),
                        subscription,
                    });
                    apply(Some(store.with_state(|state| selector(state))));
                }
            }
        })
    };
    resubscribe();

    let ref_subscription = store_ref.on_change({
        let resubscribe = resubscribe.clone();
        move || resubscribe()
    });
    let teardown_active = Subscription::callback(move || {
        if let Some(previous) = lock(&active).take() {
            previous.subscription.cancel();
        }
    });
    Derived::new(value, vec![ref_subscription, teardown_active])
}
