// File: src/accessors.rs
// Purpose: Reactive lookups into the active match list

use std::sync::Arc;

use tracing::trace;
use trellis_reactive::{
    shallow_eq, subscribe_ref_with, Derived, RenderMode, ShallowEq, Store, Stored,
};

use crate::core::RouterCore;
use crate::match_model::{MatchId, RouteId, RouteMatch};

/// How to find the match a derived value should follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchLookup {
    /// The currently active match for a route id, tracked across
    /// transitions as the route is re-matched.
    Route(RouteId),
    /// One specific match instance, by id.
    Nearest(MatchId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchLookupError {
    #[error("route {0} has no active match")]
    RouteNotActive(RouteId),
    #[error("match {0} is not active")]
    MatchNotActive(MatchId),
}

/// [`use_match_with`] using [`shallow_eq`] on the selected value.
pub fn use_match<T>(
    router: Arc<RouterCore>,
    lookup: MatchLookup,
    should_throw: bool,
    selector: impl Fn(&RouteMatch) -> T + Send + Sync + 'static,
    mode: RenderMode,
) -> Result<Derived<Option<T>>, MatchLookupError>
where
    T: ShallowEq + Clone + Send + Sync + 'static,
{
    use_match_with(router, lookup, should_throw, selector, shallow_eq, mode)
}

/// Derives a value from whichever match `lookup` currently names.
///
/// The derived value follows the *live* match: when a transition installs
/// a new match for the same route, the old subscription is torn down and
/// the selector recomputed against the new store before any frame can
/// observe the stale one. `None` while the lookup has no active match.
///
/// With `should_throw`, a lookup that has no active match right now is an
/// error instead of a `None`-valued derivation.
pub fn use_match_with<T, E>(
    router: Arc<RouterCore>,
    lookup: MatchLookup,
    should_throw: bool,
    selector: impl Fn(&RouteMatch) -> T + Send + Sync + 'static,
    equality: E,
    mode: RenderMode,
) -> Result<Derived<Option<T>>, MatchLookupError>
where
    T: Clone + Send + Sync + 'static,
    E: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let resolve: Arc<dyn Fn() -> Option<Store<RouteMatch>> + Send + Sync> = {
        let router = Arc::clone(&router);
        let lookup = lookup.clone();
        Arc::new(move || match &lookup {
            MatchLookup::Route(route_id) => {
                router.last_match_for_route(route_id).map(|(_, store)| store)
            }
            MatchLookup::Nearest(match_id) => router.get_match(match_id),
        })
    };

    let initial = resolve();
    if should_throw && initial.is_none() {
        return Err(match lookup {
            MatchLookup::Route(route_id) => MatchLookupError::RouteNotActive(route_id),
            MatchLookup::Nearest(match_id) => MatchLookupError::MatchNotActive(match_id),
        });
    }

    let store_ref: Stored<Option<Store<RouteMatch>>> = Stored::new(initial);
    let derived = subscribe_ref_with(&store_ref, selector, equality, mode);
    if mode == RenderMode::Client {
        // retarget the ref whenever the active list changes identity
        let subscription = router.id_list().subscribe({
            let store_ref = store_ref.clone();
            let resolve = Arc::clone(&resolve);
            move || {
                let next = resolve();
                let changed = store_ref.with(|current| match (current, &next) {
                    (Some(live), Some(next)) => !Store::ptr_eq(live, next),
                    (None, None) => false,
                    _ => true,
                });
                if changed {
                    store_ref.set(next);
                } else {
                    trace!("active list changed but lookup still points at the same store");
                }
            }
        });
        derived.adopt(subscription);
    }
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_model::{MatchStatus, Params};
    use crate::routes::{Route, RouterDefaults};
    use pretty_assertions::assert_eq;

    fn router() -> Arc<RouterCore> {
        Arc::new(RouterCore::new(
            vec![Route::root("root"), Route::new("users.detail")],
            RouterDefaults::new(),
        ))
    }

    fn detail_match(id: &str) -> RouteMatch {
        let mut params = Params::new();
        params.insert("id".to_string(), id.to_string());
        RouteMatch::new("users.detail")
            .with_status(MatchStatus::Success)
            .with_params(params)
    }

    #[test]
    fn test_route_lookup_follows_reinstall() {
        let router = router();
        router
            .install_matches(vec![RouteMatch::new("root"), detail_match("1")])
            .expect("install");
        let derived = use_match(
            Arc::clone(&router),
            MatchLookup::Route(RouteId::from("users.detail")),
            false,
            |m| m.params.get("id").cloned(),
            RenderMode::Client,
        )
        .expect("lookup");
        assert_eq!(derived.get(), Some(Some("1".to_string())));

        // a new transition installs a fresh match for the same route
        router
            .install_matches(vec![RouteMatch::new("root"), detail_match("2")])
            .expect("install");
        assert_eq!(derived.get(), Some(Some("2".to_string())));
    }

    #[test]
    fn test_inactive_route_yields_none() {
        let router = router();
        router.install_matches(vec![RouteMatch::new("root")]).expect("install");
        let derived = use_match(
            router,
            MatchLookup::Route(RouteId::from("users.detail")),
            false,
            |m| m.status,
            RenderMode::Client,
        )
        .expect("lookup");
        assert_eq!(derived.get(), None);
    }

    #[test]
    fn test_should_throw_on_inactive_route() {
        let router = router();
        router.install_matches(vec![RouteMatch::new("root")]).expect("install");
        let result = use_match(
            router,
            MatchLookup::Route(RouteId::from("users.detail")),
            true,
            |m| m.status,
            RenderMode::Client,
        );
        assert_eq!(
            result.err(),
            Some(MatchLookupError::RouteNotActive(RouteId::from("users.detail")))
        );
    }

    #[test]
    fn test_nearest_lookup_tracks_one_match() {
        let router = router();
        let ids = router
            .install_matches(vec![RouteMatch::new("root"), detail_match("1")])
            .expect("install");
        let derived = use_match(
            Arc::clone(&router),
            MatchLookup::Nearest(ids[1].clone()),
            true,
            |m| m.status,
            RenderMode::Client,
        )
        .expect("lookup");
        assert_eq!(derived.get(), Some(MatchStatus::Success));

        router.set_status(&ids[1], MatchStatus::Pending, None).expect("status");
        assert_eq!(derived.get(), Some(MatchStatus::Pending));
    }

    #[test]
    fn test_server_mode_takes_snapshot_only() {
        let router = router();
        router
            .install_matches(vec![RouteMatch::new("root"), detail_match("1")])
            .expect("install");
        let derived = use_match(
            Arc::clone(&router),
            MatchLookup::Route(RouteId::from("users.detail")),
            false,
            |m| m.status,
            RenderMode::Server,
        )
        .expect("lookup");
        assert_eq!(derived.get(), Some(MatchStatus::Success));
        assert!(!derived.is_live());
        assert_eq!(router.id_list().listener_count(), 0);
    }
}
