// File: src/node.rs
// Purpose: The recursive match/outlet composition — one node per rendered match position

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};
use trellis_reactive::RenderMode;

use crate::core::RouterCore;
use crate::error::{NotFoundError, RenderBreak, UserError};
use crate::match_model::{LoadHandle, MatchId, MatchStatus, Params, RouteId, RouteMatch, SsrMode};
use crate::rendered::Rendered;
use crate::resolve::{derive_remount_key, pending_component, resolve_match_view, ResolvedView};
use crate::routes::{Component, Route, RouterDefaults};
use crate::tree::TreeCtx;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// What a component sees while rendering: its match, its router, and its
/// child position.
pub struct RenderScope<'a> {
    ctx: &'a TreeCtx,
    match_id: MatchId,
    route_id: RouteId,
    slot: &'a mut OutletSlot,
    error: Option<UserError>,
    not_found: Option<NotFoundError>,
}

impl<'a> RenderScope<'a> {
    fn new(ctx: &'a TreeCtx, match_id: MatchId, route_id: RouteId, slot: &'a mut OutletSlot) -> Self {
        Self { ctx, match_id, route_id, slot, error: None, not_found: None }
    }

    /// Renders the child position of this match — the next entry in the
    /// active match list, if any.
    pub fn outlet(&mut self) -> Result<Rendered, RenderBreak> {
        render_outlet(self.ctx, &self.match_id, &self.route_id, self.slot)
    }

    pub fn router(&self) -> &Arc<RouterCore> {
        &self.ctx.router
    }

    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    pub fn route_id(&self) -> &RouteId {
        &self.route_id
    }

    pub fn match_snapshot(&self) -> Option<RouteMatch> {
        self.ctx.router.get_match(&self.match_id).map(|store| store.state())
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.match_snapshot().and_then(|m| m.params.get(name).cloned())
    }

    /// The error this boundary caught, when rendering an error view.
    pub fn caught_error(&self) -> Option<&UserError> {
        self.error.as_ref()
    }

    /// The signal this boundary caught, when rendering a not-found view.
    pub fn not_found(&self) -> Option<&NotFoundError> {
        self.not_found.as_ref()
    }
}

/// The child position below a match. Keyed by route id plus strict
/// params; loader-dependency state is deliberately excluded so a
/// search-only reload does not remount the subtree.
#[derive(Default)]
pub struct OutletSlot {
    child: Option<ChildEntry>,
}

struct ChildEntry {
    key: String,
    node: Box<MatchNode>,
}

/// Identity probe for mounted nodes, exposed for embedders and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub route_id: RouteId,
    pub match_id: MatchId,
    pub instance: u64,
    pub generation: u64,
}

#[derive(Clone)]
struct CaughtError {
    reset_key: Option<DateTime<Utc>>,
    error: UserError,
}

/// One rendered match position.
///
/// Holds the state a bare render function cannot: the child slot, the
/// remount generation, and any caught error waiting for its reset key.
pub struct MatchNode {
    target: MatchId,
    route_id: RouteId,
    instance: u64,
    generation: u64,
    /// `None` until the first render; then the last derived remount key.
    last_remount_key: Option<Option<String>>,
    slot: OutletSlot,
    caught: Option<CaughtError>,
}

impl MatchNode {
    pub(crate) fn new(target: MatchId, route_id: RouteId) -> Self {
        Self {
            target,
            route_id,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            last_remount_key: None,
            slot: OutletSlot::default(),
            caught: None,
        }
    }

    pub(crate) fn render(&mut self, ctx: &TreeCtx) -> Result<Rendered, RenderBreak> {
        let router = &ctx.router;
        let store = match router.get_match(&self.target) {
            Some(store) => store,
            None => match router.last_match_for_route(&self.route_id) {
                // Grace path for index churn mid-transition: the id can
                // briefly vanish from the by-id index before the new list
                // commits. Keep the rendered position alive on the last
                // known match for the same route.
                Some((id, store)) => {
                    warn!(
                        stale = %self.target,
                        fallback = %id,
                        route = %self.route_id,
                        "match id missing from by-id index, using last known match for route"
                    );
                    self.target = id;
                    store
                }
                None => {
                    error!(match_id = %self.target, route = %self.route_id, "match vanished from the active list");
                    return Err(RenderBreak::MissingMatch(self.target.clone()));
                }
            },
        };
        let m = store.state();
        let route = router.route(&m.route_id).cloned().ok_or_else(|| {
            RenderBreak::Integrity(format!("no route definition for {}", m.route_id))
        })?;
        let defaults = router.defaults().clone();

        let remount_key = derive_remount_key(&route, &defaults, &m)?;
        if let Some(previous) = &self.last_remount_key {
            if previous != &remount_key {
                debug!(route = %self.route_id, "remount key changed, recreating subtree");
                self.generation += 1;
                self.slot = OutletSlot::default();
                self.caught = None;
            }
        }
        self.last_remount_key = Some(remount_key);

        // A caught error clears itself once a newer successful load
        // commits a fresh loaded-at timestamp.
        let reset_key = router.loaded_at(&m.id);
        if self.caught.as_ref().is_some_and(|caught| caught.reset_key != reset_key) {
            debug!(route = %self.route_id, "fresh load cleared previously caught error");
            self.caught = None;
        }
        if let Some(caught) = &self.caught {
            let caught_error = caught.error.clone();
            return self.render_error_view(ctx, &m, &route, &defaults, caught_error);
        }

        if ctx.options.mode == RenderMode::Server && m.ssr != SsrMode::Full {
            debug!(route = %self.route_id, ssr = ?m.ssr, "non-full ssr match renders a placeholder on the server");
            return self.render_pending_view(ctx, &m, &route, &defaults, None);
        }

        let view = resolve_match_view(&m, &route, &defaults)?;
        let content = self.render_view(ctx, &m, &route, &defaults, view);
        let content = self.catch_not_found(ctx, &m, &route, &defaults, content);
        self.catch_error(ctx, &m, &route, &defaults, content)
    }

    fn render_view(
        &mut self,
        ctx: &TreeCtx,
        m: &RouteMatch,
        route: &Route,
        defaults: &RouterDefaults,
        view: ResolvedView,
    ) -> Result<Rendered, RenderBreak> {
        match view {
            ResolvedView::Propagate(break_) => Err(break_),
            ResolvedView::Pending { component, waiting_min, schedule_min_ms } => {
                if let Some(ms) = schedule_min_ms {
                    self.schedule_min_pending(ctx, &m.id, ms);
                }
                if let Some(latch) = waiting_min {
                    ctx.note_suspended(latch);
                }
                self.render_pending_view(ctx, m, route, defaults, component)
            }
            ResolvedView::Success { component, remount_key } => {
                if m.min_pending.as_ref().is_some_and(LoadHandle::settled) {
                    let _ = ctx.router.clear_min_pending(&m.id);
                }
                let mut scope =
                    RenderScope::new(ctx, m.id.clone(), self.route_id.clone(), &mut self.slot);
                let inner = match component {
                    Some(component) => component(&mut scope)?,
                    // a route with no component is a pure pass-through
                    None => scope.outlet()?,
                };
                Ok(Rendered::keyed(self.route_id.to_string(), remount_key, vec![inner]))
            }
        }
    }

    fn render_pending_view(
        &mut self,
        ctx: &TreeCtx,
        m: &RouteMatch,
        route: &Route,
        defaults: &RouterDefaults,
        component: Option<Component>,
    ) -> Result<Rendered, RenderBreak> {
        match component.or_else(|| pending_component(route, defaults)) {
            Some(component) => {
                let mut scratch = OutletSlot::default();
                let mut scope =
                    RenderScope::new(ctx, m.id.clone(), self.route_id.clone(), &mut scratch);
                component(&mut scope)
            }
            None => Ok(default_pending_view()),
        }
    }

    /// Not-found boundary. Exists only where this route declares a view
    /// (or, for the root, the router's global handler), and owns only
    /// signals scoped to this route — everything else is rethrown to the
    /// ancestor actually responsible.
    fn catch_not_found(
        &mut self,
        ctx: &TreeCtx,
        m: &RouteMatch,
        route: &Route,
        defaults: &RouterDefaults,
        result: Result<Rendered, RenderBreak>,
    ) -> Result<Rendered, RenderBreak> {
        let not_found = match result {
            Err(RenderBreak::NotFound(not_found)) => not_found,
            other => return other,
        };
        let component = route
            .not_found_component
            .clone()
            .or_else(|| route.is_root.then(|| defaults.not_found_component.clone()).flatten());
        let Some(component) = component else {
            return Err(RenderBreak::NotFound(not_found));
        };
        let owns = match &not_found.route_id {
            Some(route_id) => route_id == &self.route_id,
            None => route.is_root,
        };
        if !owns {
            debug!(route = %self.route_id, owner = ?not_found.route_id, "not-found scoped to another route, rethrowing");
            return Err(RenderBreak::NotFound(not_found));
        }
        debug!(route = %self.route_id, "rendering not-found view");
        let mut scratch = OutletSlot::default();
        let mut scope = RenderScope::new(ctx, m.id.clone(), self.route_id.clone(), &mut scratch);
        scope.not_found = Some(not_found);
        component(&mut scope)
    }

    /// Error boundary. Exists only where this route declares an error
    /// view (the router default attaches at the root). Not-found and
    /// redirect signals never stop here.
    fn catch_error(
        &mut self,
        ctx: &TreeCtx,
        m: &RouteMatch,
        route: &Route,
        defaults: &RouterDefaults,
        result: Result<Rendered, RenderBreak>,
    ) -> Result<Rendered, RenderBreak> {
        let caught = match result {
            Err(RenderBreak::User(error)) => error,
            other => return other,
        };
        if route.error_component.is_none()
            && !(route.is_root && defaults.error_component.is_some())
        {
            return Err(RenderBreak::User(caught));
        }
        debug!(route = %self.route_id, error = %caught, "error boundary caught route error");
        // hooks fire exactly once per caught error; the sticky render
        // path above bypasses this method entirely
        if let Some(hook) = route.on_catch.as_ref().or(defaults.on_catch.as_ref()) {
            hook(&caught);
        }
        if let Some(hook) = &route.on_error {
            hook(&caught);
        }
        self.caught = Some(CaughtError {
            reset_key: ctx.router.loaded_at(&m.id),
            error: caught.clone(),
        });
        self.render_error_view(ctx, m, route, defaults, caught)
    }

    fn render_error_view(
        &mut self,
        ctx: &TreeCtx,
        m: &RouteMatch,
        route: &Route,
        defaults: &RouterDefaults,
        error: UserError,
    ) -> Result<Rendered, RenderBreak> {
        let component = route
            .error_component
            .clone()
            .or_else(|| route.is_root.then(|| defaults.error_component.clone()).flatten());
        let Some(component) = component else {
            return Err(RenderBreak::User(error));
        };
        let mut scratch = OutletSlot::default();
        let mut scope = RenderScope::new(ctx, m.id.clone(), self.route_id.clone(), &mut scratch);
        scope.error = Some(error);
        component(&mut scope)
    }

    fn schedule_min_pending(&self, ctx: &TreeCtx, id: &MatchId, ms: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime available, skipping minimum-pending latch");
            return;
        };
        let latch = LoadHandle::new();
        if ctx.router.set_min_pending(id, latch.clone()).is_err() {
            return;
        }
        ctx.note_suspended(latch.clone());
        debug!(match_id = %id, ms, "scheduling minimum-pending timer");
        let router = ctx.router.clone();
        let id = id.clone();
        handle.spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            latch.settle();
            // Clearing the slot notifies watchers, but only once the load
            // resolved — a still-pending match must not re-arm the window.
            let resolved = router
                .get_match(&id)
                .map(|store| store.with_state(|m| m.status != MatchStatus::Pending))
                .unwrap_or(false);
            if resolved {
                let _ = router.clear_min_pending(&id);
            }
        });
    }

    pub(crate) fn collect_identities(&self, out: &mut Vec<NodeIdentity>) {
        out.push(NodeIdentity {
            route_id: self.route_id.clone(),
            match_id: self.target.clone(),
            instance: self.instance,
            generation: self.generation,
        });
        if let Some(entry) = &self.slot.child {
            entry.node.collect_identities(out);
        }
    }
}

/// Rendering-identity key for a child position: route id plus strict
/// params, loader deps excluded.
pub(crate) fn child_key(route_id: &RouteId, strict_params: &Params) -> Result<String, RenderBreak> {
    Ok(format!("{}|{}", route_id, serde_json::to_string(strict_params)?))
}

/// Installs or reuses the child node for `key`, retargeting it at the
/// current match id.
pub(crate) fn ensure_child(
    slot: &mut OutletSlot,
    key: String,
    target: MatchId,
    route_id: RouteId,
) -> &mut MatchNode {
    if slot.child.as_ref().is_some_and(|entry| entry.key != key) {
        slot.child = None;
    }
    let entry = slot.child.get_or_insert_with(|| {
        debug!(route = %route_id, %key, "mounting match node");
        ChildEntry { key, node: Box::new(MatchNode::new(target.clone(), route_id)) }
    });
    entry.node.target = target;
    &mut entry.node
}

pub(crate) fn collect_slot_identities(slot: &OutletSlot, out: &mut Vec<NodeIdentity>) {
    if let Some(entry) = &slot.child {
        entry.node.collect_identities(out);
    }
}

/// The outlet: renders the next match in the active list after
/// `current_id`, or nothing / a not-found signal when the list ends here.
pub(crate) fn render_outlet(
    ctx: &TreeCtx,
    current_id: &MatchId,
    current_route_id: &RouteId,
    slot: &mut OutletSlot,
) -> Result<Rendered, RenderBreak> {
    let router = &ctx.router;
    let ids = router.ordered_ids();
    let index = ids.iter().position(|id| id == current_id).ok_or_else(|| {
        RenderBreak::Integrity(format!("match {current_id} not in the active id list"))
    })?;
    let current = router
        .get_match(current_id)
        .ok_or_else(|| RenderBreak::MissingMatch(current_id.clone()))?
        .state();

    if current.global_not_found {
        debug!(route = %current_route_id, "no child route matched, surfacing not-found at this route");
        let scoped = router
            .route(current_route_id)
            .map(|route| route.not_found_component.is_some())
            .unwrap_or(false);
        let not_found = if scoped {
            NotFoundError::scoped(current_route_id.clone())
        } else {
            NotFoundError::unscoped()
        };
        return Err(RenderBreak::NotFound(not_found));
    }

    let next_id = match ids.get(index + 1) {
        Some(next_id) => next_id,
        None => {
            slot.child = None;
            return Ok(Rendered::Nothing);
        }
    };
    let next = router
        .get_match(next_id)
        .ok_or_else(|| RenderBreak::MissingMatch(next_id.clone()))?
        .state();
    let key = child_key(&next.route_id, &next.strict_params)?;
    let node = ensure_child(slot, key, next_id.clone(), next.route_id.clone());
    let result = node.render(ctx);

    if index == 0 {
        // first-paint suspense point directly under the root match
        return match result {
            Err(RenderBreak::Redirect(signal)) => {
                debug!(location = %signal.location, "suspending on redirected child under root");
                ctx.note_suspended(signal.load.clone());
                fallback_pending(ctx, current_id, current_route_id)
            }
            other => other,
        };
    }
    result
}

pub(crate) fn fallback_pending(
    ctx: &TreeCtx,
    match_id: &MatchId,
    route_id: &RouteId,
) -> Result<Rendered, RenderBreak> {
    match ctx.router.defaults().pending_component.clone() {
        Some(component) => {
            let mut scratch = OutletSlot::default();
            let mut scope =
                RenderScope::new(ctx, match_id.clone(), route_id.clone(), &mut scratch);
            component(&mut scope)
        }
        None => Ok(default_pending_view()),
    }
}

pub(crate) fn default_pending_view() -> Rendered {
    Rendered::element("pending", vec![])
}

pub(crate) fn default_error_view(error: &UserError) -> Rendered {
    Rendered::element(
        "default-error",
        vec![
            Rendered::text("Something went wrong"),
            // revealed by the host's toggle
            Rendered::element("error-message", vec![Rendered::text(error.message())]),
            Rendered::element("error-reset", vec![]),
        ],
    )
}

pub(crate) fn default_not_found_view() -> Rendered {
    Rendered::element("default-not-found", vec![Rendered::text("Not Found")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MatchTreeOptions;

    #[test]
    fn test_missing_match_is_fatal() {
        let router = Arc::new(RouterCore::new(
            vec![crate::routes::Route::root("root")],
            RouterDefaults::new(),
        ));
        let ctx = TreeCtx::new(router, MatchTreeOptions::default());
        let mut node = MatchNode::new(MatchId::new(), RouteId::from("root"));
        let result = node.render(&ctx);
        assert!(matches!(result, Err(RenderBreak::MissingMatch(_))));
    }
}
