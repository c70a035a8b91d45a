//! # Trellis Reactive
//!
//! The reactivity layer under the Trellis match tree: push-subscribable
//! stores, observer-list reactive values, and the bridges that adapt an
//! externally-owned store into derived reactive values.
//!
//! The host reactivity primitive is deliberately small: a value you can
//! `get()` and watch with `on_change()`. Everything else — selectors,
//! equality suppression, re-subscription when a store reference moves —
//! lives in [`bridge`].
//!
//! - [`Store`]: single-writer snapshot store with ordered notification
//! - [`Stored`] / [`Derived`]: reactive values over plain observer lists
//! - [`bridge::subscribe`]: derive a value from a selector over one store
//! - [`bridge::subscribe_ref`]: follow a *reference* to a store that
//!   changes identity over time
//! - [`shallow_eq`]: the default equality used to suppress redundant
//!   notifications

mod bridge;
mod equality;
mod observers;
mod store;
mod value;

pub use bridge::{subscribe, subscribe_ref, subscribe_ref_with, subscribe_with, RenderMode};
pub use equality::{shallow_eq, ShallowEq};
pub use store::Store;
pub use value::{Derived, Stored, Subscription, SubscriptionGuard};
