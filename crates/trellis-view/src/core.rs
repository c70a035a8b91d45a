// File: src/core.rs
// Purpose: Store-owning router core facade — single writer of the logical stores

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;
use trellis_reactive::Store;

use crate::match_model::{
    LoadHandle, MatchError, MatchId, MatchStatus, RouteId, RouteMatch, TransitionState,
    TransitionStatus,
};
use crate::matcher::{parse_location, MatchedRoutes, ParsedLocation, PathMatcher, SegmentMatcher};
use crate::routes::{Route, RouterDefaults};

/// Recovers the guard from a poisoned mutex instead of propagating the
/// poison.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The router core owns every logical store the match tree observes:
/// per-match stores keyed by match id, a last-known index keyed by route
/// id, the ordered active id list, loaded-at timestamps, pending ids, and
/// the transition state.
///
/// Single writer: only the navigation engine mutates through the methods
/// here. The tree, bridges, and accessors read and subscribe.
pub struct RouterCore {
    routes: HashMap<RouteId, Route>,
    defaults: RouterDefaults,
    matcher: Box<dyn PathMatcher>,
    matches: Mutex<HashMap<MatchId, Store<RouteMatch>>>,
    by_route: Mutex<HashMap<RouteId, MatchId>>,
    id_list: Store<Vec<MatchId>>,
    loaded_at: Store<HashMap<MatchId, DateTime<Utc>>>,
    pending_ids: Store<HashSet<MatchId>>,
    transition: Store<TransitionState>,
}

impl RouterCore {
    /// Builds a core whose path matcher is derived from the routes' URL
    /// patterns.
    pub fn new(routes: Vec<Route>, defaults: RouterDefaults) -> Self {
        let mut matcher = SegmentMatcher::new();
        for route in &routes {
            if let Some(pattern) = &route.pattern {
                matcher.add_pattern(pattern, route.id.clone());
            }
        }
        Self::with_matcher(routes, defaults, Box::new(matcher))
    }

    pub fn with_matcher(
        routes: Vec<Route>,
        defaults: RouterDefaults,
        matcher: Box<dyn PathMatcher>,
    ) -> Self {
        Self {
            routes: routes.into_iter().map(|route| (route.id.clone(), route)).collect(),
            defaults,
            matcher,
            matches: Mutex::new(HashMap::new()),
            by_route: Mutex::new(HashMap::new()),
            id_list: Store::new(Vec::new()),
            loaded_at: Store::new(HashMap::new()),
            pending_ids: Store::new(HashSet::new()),
            transition: Store::new(TransitionState::default()),
        }
    }

    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn defaults(&self) -> &RouterDefaults {
        &self.defaults
    }

    /// Exact lookup by match id.
    pub fn get_match(&self, id: &MatchId) -> Option<Store<RouteMatch>> {
        lock(&self.matches).get(id).cloned()
    }

    /// Last-known match for a route id — the fallback the tree uses while
    /// the by-id index churns mid-transition.
    pub fn last_match_for_route(&self, route_id: &RouteId) -> Option<(MatchId, Store<RouteMatch>)> {
        let id = lock(&self.by_route).get(route_id).cloned()?;
        let store = lock(&self.matches).get(&id).cloned()?;
        Some((id, store))
    }

    pub fn ordered_ids(&self) -> Vec<MatchId> {
        self.id_list.state()
    }

    pub fn root_match_id(&self) -> Option<MatchId> {
        self.id_list.with_state(|ids| ids.first().cloned())
    }

    pub fn id_list(&self) -> &Store<Vec<MatchId>> {
        &self.id_list
    }

    pub fn pending_ids(&self) -> &Store<HashSet<MatchId>> {
        &self.pending_ids
    }

    pub fn loaded_at_store(&self) -> &Store<HashMap<MatchId, DateTime<Utc>>> {
        &self.loaded_at
    }

    pub fn loaded_at(&self, id: &MatchId) -> Option<DateTime<Utc>> {
        self.loaded_at.with_state(|map| map.get(id).copied())
    }

    pub fn transition(&self) -> &Store<TransitionState> {
        &self.transition
    }

    /// Swaps the active match list wholesale, root to leaf.
    ///
    /// Match stores are installed before the id list commits so no
    /// subscriber ever observes an id without a backing store. Stores for
    /// matches no longer present are dropped, and the by-route index is
    /// repointed at the new ids.
    pub fn install_matches(&self, list: Vec<RouteMatch>) -> Result<Vec<MatchId>> {
        for m in &list {
            ensure!(
                self.routes.contains_key(&m.route_id),
                "unknown route {} in match list",
                m.route_id
            );
        }
        let ids: Vec<MatchId> = list.iter().map(|m| m.id.clone()).collect();
        let pending: HashSet<MatchId> = list
            .iter()
            .filter(|m| m.status == MatchStatus::Pending)
            .map(|m| m.id.clone())
            .collect();
        debug!(matches = list.len(), pending = pending.len(), "installing active match list");

        // A store that survives the swap is updated in place so its
        // subscribers stay attached; updates run after the map lock drops
        // so listeners may re-enter the core.
        let mut carried: Vec<(Store<RouteMatch>, RouteMatch)> = Vec::new();
        {
            let mut matches = lock(&self.matches);
            let mut by_route = lock(&self.by_route);
            let keep: HashSet<MatchId> = ids.iter().cloned().collect();
            matches.retain(|id, _| keep.contains(id));
            by_route.clear();
            for m in list {
                by_route.insert(m.route_id.clone(), m.id.clone());
                match matches.get(&m.id) {
                    Some(store) => carried.push((store.clone(), m)),
                    None => {
                        matches.insert(m.id.clone(), Store::new(m));
                    }
                }
            }
        }
        for (store, m) in carried {
            store.update(|current| *current = m);
        }
        self.loaded_at.update(|map| map.retain(|id, _| ids.contains(id)));
        self.pending_ids.update(|set| *set = pending.clone());
        self.transition.update(|t| {
            t.pending_match_ids = pending.iter().cloned().collect();
            t.is_transitioning = true;
            t.status = TransitionStatus::Pending;
        });
        // list commits last
        self.id_list.update(|current| *current = ids.clone());
        Ok(ids)
    }

    /// Marks the transition resolved at the given location key.
    pub fn commit_resolved(&self, location_key: impl Into<String>) {
        let key = location_key.into();
        debug!(%key, "transition resolved");
        self.transition.update(|t| {
            t.pending_match_ids.clear();
            t.is_transitioning = false;
            t.status = TransitionStatus::Idle;
            t.resolved_location_key = Some(key);
        });
    }

    /// Mutates one match in place and notifies its subscribers.
    pub fn update_match(
        &self,
        id: &MatchId,
        mutate: impl FnOnce(&mut RouteMatch),
    ) -> Result<()> {
        let store = self.get_match(id).with_context(|| format!("no match with id {id}"))?;
        store.update(mutate);
        Ok(())
    }

    pub fn set_status(
        &self,
        id: &MatchId,
        status: MatchStatus,
        error: Option<MatchError>,
    ) -> Result<()> {
        self.update_match(id, |m| {
            m.status = status;
            m.error = error;
        })?;
        if status != MatchStatus::Pending {
            self.pending_ids.update(|set| {
                set.remove(id);
            });
        }
        Ok(())
    }

    /// Commits a successful load: success status, fresh loaded-at
    /// timestamp (the error-boundary reset key), no longer pending.
    pub fn settle_loaded(&self, id: &MatchId) -> Result<()> {
        self.update_match(id, |m| {
            m.status = MatchStatus::Success;
            m.error = None;
        })?;
        self.loaded_at.update(|map| {
            map.insert(id.clone(), Utc::now());
        });
        self.pending_ids.update(|set| {
            set.remove(id);
        });
        Ok(())
    }

    /// Sets the per-match minimum-pending latch slot.
    pub fn set_min_pending(&self, id: &MatchId, latch: LoadHandle) -> Result<()> {
        self.update_match(id, |m| m.min_pending = Some(latch))
    }

    /// Clears the latch slot. Idempotent — the timer may fire after the
    /// match already resolved.
    pub fn clear_min_pending(&self, id: &MatchId) -> Result<()> {
        self.update_match(id, |m| m.min_pending = None)
    }

    pub fn parse_location(&self, href: &str) -> ParsedLocation {
        parse_location(href)
    }

    pub fn get_matched_routes(&self, pathname: &str) -> MatchedRoutes {
        self.matcher.get_matched_routes(pathname)
    }
}

impl std::fmt::Debug for RouterCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterCore")
            .field("routes", &self.routes.len())
            .field("active_matches", &self.id_list.with_state(Vec::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn core() -> RouterCore {
        RouterCore::new(
            vec![Route::root("root"), Route::new("users")],
            RouterDefaults::new(),
        )
    }

    #[test]
    fn test_install_then_lookup() {
        let core = core();
        let root = RouteMatch::new(RouteId::from("root")).with_status(MatchStatus::Success);
        let child = RouteMatch::new(RouteId::from("users"));
        let root_id = root.id.clone();
        let child_id = child.id.clone();

        let ids = core.install_matches(vec![root, child]).expect("install");
        assert_eq!(ids, vec![root_id.clone(), child_id.clone()]);
        assert!(core.get_match(&root_id).is_some());
        assert_eq!(
            core.last_match_for_route(&RouteId::from("users")).map(|(id, _)| id),
            Some(child_id.clone())
        );
        assert!(core.pending_ids().with_state(|set| set.contains(&child_id)));
        assert!(core.transition().with_state(|t| t.is_transitioning));
    }

    #[test]
    fn test_install_rejects_unknown_route() {
        let core = core();
        let stray = RouteMatch::new(RouteId::from("nowhere"));
        assert!(core.install_matches(vec![stray]).is_err());
    }

    #[test]
    fn test_reinstall_repoints_by_route_index() {
        let core = core();
        let first = RouteMatch::new(RouteId::from("root"));
        let first_id = first.id.clone();
        core.install_matches(vec![first]).expect("install");

        let second = RouteMatch::new(RouteId::from("root"));
        let second_id = second.id.clone();
        core.install_matches(vec![second]).expect("reinstall");

        assert!(core.get_match(&first_id).is_none());
        assert_eq!(
            core.last_match_for_route(&RouteId::from("root")).map(|(id, _)| id),
            Some(second_id)
        );
    }

    #[test]
    fn test_settle_loaded_sets_reset_key() {
        let core = core();
        let m = RouteMatch::new(RouteId::from("root"));
        let id = m.id.clone();
        core.install_matches(vec![m]).expect("install");
        assert!(core.loaded_at(&id).is_none());

        core.settle_loaded(&id).expect("settle");
        assert!(core.loaded_at(&id).is_some());
        let store = core.get_match(&id).expect("match store");
        assert_eq!(store.with_state(|m| m.status), MatchStatus::Success);
        assert!(core.pending_ids().with_state(HashSet::is_empty));
    }

    #[test]
    fn test_min_pending_clear_is_idempotent() {
        let core = core();
        let m = RouteMatch::new(RouteId::from("root"));
        let id = m.id.clone();
        core.install_matches(vec![m]).expect("install");

        core.set_min_pending(&id, LoadHandle::new()).expect("set");
        core.clear_min_pending(&id).expect("clear");
        core.clear_min_pending(&id).expect("clear again");
        let store = core.get_match(&id).expect("match store");
        assert!(store.with_state(|m| m.min_pending.is_none()));
    }
}
