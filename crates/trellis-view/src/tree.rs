// File: src/tree.rs
// Purpose: The tree root — drives match nodes, absorbs escapes, emits render events

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, warn};
use trellis_reactive::{RenderMode, Stored, Subscription};

use crate::core::{lock, RouterCore};
use crate::error::{RenderBreak, TreeError};
use crate::match_model::LoadHandle;
use crate::node::{
    self, default_error_view, default_not_found_view, NodeIdentity, OutletSlot,
};
use crate::rendered::Rendered;

/// Shared render-pass context handed down the node recursion.
pub(crate) struct TreeCtx {
    pub(crate) router: Arc<RouterCore>,
    pub(crate) options: MatchTreeOptions,
    suspended: Mutex<Vec<LoadHandle>>,
}

impl TreeCtx {
    pub(crate) fn new(router: Arc<RouterCore>, options: MatchTreeOptions) -> Self {
        Self { router, options, suspended: Mutex::new(Vec::new()) }
    }

    /// Records an unsettled load the current pass suspended on.
    pub(crate) fn note_suspended(&self, latch: LoadHandle) {
        lock(&self.suspended).push(latch);
    }

    pub(crate) fn take_suspended(&self) -> Vec<LoadHandle> {
        std::mem::take(&mut *lock(&self.suspended))
    }
}

type RenderedHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Knobs for a [`MatchTree`].
#[derive(Clone)]
pub struct MatchTreeOptions {
    pub mode: RenderMode,
    /// When set, not-found signals and route errors that escape every
    /// boundary render a built-in fallback view instead of failing the
    /// pass.
    pub global_catch: bool,
    pub on_rendered: Option<RenderedHook>,
    pub scroll_restoration: Option<RenderedHook>,
}

impl Default for MatchTreeOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Client,
            global_catch: true,
            on_rendered: None,
            scroll_restoration: None,
        }
    }
}

impl MatchTreeOptions {
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_global_catch(mut self, global_catch: bool) -> Self {
        self.global_catch = global_catch;
        self
    }

    pub fn with_on_rendered(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_rendered = Some(Arc::new(hook));
        self
    }

    pub fn with_scroll_restoration(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.scroll_restoration = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for MatchTreeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchTreeOptions")
            .field("mode", &self.mode)
            .field("global_catch", &self.global_catch)
            .field("on_rendered", &self.on_rendered.as_ref().map(|_| "<hook>"))
            .field("scroll_restoration", &self.scroll_restoration.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

/// The root of the rendered match tree.
///
/// Owns the node hierarchy across passes, watches the router's match
/// list and transition state for invalidation, and absorbs the escapes
/// no route boundary claimed.
pub struct MatchTree {
    ctx: TreeCtx,
    root: OutletSlot,
    last_emitted_key: Option<String>,
    render_epoch: Stored<u64>,
    subscriptions: Vec<Subscription>,
}

impl MatchTree {
    pub fn new(router: Arc<RouterCore>, options: MatchTreeOptions) -> Self {
        let render_epoch = Stored::new(0u64);
        let mut subscriptions = Vec::new();
        // A server pass renders once from a snapshot and never watches.
        if options.mode == RenderMode::Client {
            for bump in [
                router.id_list().subscribe(Self::bump(&render_epoch)),
                router.transition().subscribe(Self::bump(&render_epoch)),
                router.pending_ids().subscribe(Self::bump(&render_epoch)),
            ] {
                subscriptions.push(bump);
            }
        }
        Self {
            ctx: TreeCtx::new(router, options),
            root: OutletSlot::default(),
            last_emitted_key: None,
            render_epoch,
            subscriptions,
        }
    }

    fn bump(epoch: &Stored<u64>) -> impl Fn() + Send + Sync + 'static {
        let epoch = epoch.clone();
        move || {
            let next = epoch.get().wrapping_add(1);
            epoch.set(next);
        }
    }

    pub fn router(&self) -> &Arc<RouterCore> {
        &self.ctx.router
    }

    /// Monotonic counter bumped whenever router state invalidates the
    /// current render. Embedders subscribe and call [`Self::render`].
    pub fn render_epoch(&self) -> u64 {
        self.render_epoch.get()
    }

    pub fn on_invalidate(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.render_epoch.on_change(listener)
    }

    /// One synchronous render pass over the active match list.
    pub fn render(&mut self) -> Result<Rendered, TreeError> {
        // latches noted by an earlier pass belong to that pass
        let _ = self.ctx.take_suspended();

        let ids = self.ctx.router.ordered_ids();
        let Some(root_id) = ids.first() else {
            debug!("no active matches, rendering nothing");
            return Ok(Rendered::Nothing);
        };
        let root = self
            .ctx
            .router
            .get_match(root_id)
            .ok_or_else(|| TreeError::MissingMatch(root_id.clone()))?
            .state();
        let key = node::child_key(&root.route_id, &root.strict_params)
            .map_err(|err| TreeError::Integrity(err.to_string()))?;
        let node =
            node::ensure_child(&mut self.root, key, root_id.clone(), root.route_id.clone());
        let result = node.render(&self.ctx);

        let rendered = match result {
            Ok(rendered) => rendered,
            Err(RenderBreak::Redirect(signal)) => {
                // the root match itself redirected before first paint
                debug!(location = %signal.location, "root redirect, rendering suspense fallback");
                self.ctx.note_suspended(signal.load.clone());
                node::fallback_pending(&self.ctx, root_id, &root.route_id)
                    .map_err(|err| TreeError::Integrity(err.to_string()))?
            }
            Err(RenderBreak::NotFound(not_found)) if self.ctx.options.global_catch => {
                warn!(route = ?not_found.route_id, "not-found escaped every boundary, rendering default view");
                default_not_found_view()
            }
            Err(RenderBreak::NotFound(not_found)) => {
                return Err(TreeError::UnhandledNotFound(not_found.route_id));
            }
            Err(RenderBreak::User(user)) if self.ctx.options.global_catch => {
                error!(error = %user, "route error escaped every boundary, rendering default view");
                default_error_view(&user)
            }
            Err(RenderBreak::User(user)) => return Err(TreeError::Unhandled(user)),
            Err(RenderBreak::MissingMatch(id)) => return Err(TreeError::MissingMatch(id)),
            Err(RenderBreak::Integrity(message)) => return Err(TreeError::Integrity(message)),
        };

        self.emit_rendered();
        Ok(rendered)
    }

    /// Renders, then re-renders after every suspended load settles, until
    /// a pass completes without suspending.
    pub async fn render_settled(&mut self) -> Result<Rendered, TreeError> {
        loop {
            let rendered = self.render()?;
            let suspended = self.ctx.take_suspended();
            if suspended.is_empty() {
                return Ok(rendered);
            }
            debug!(count = suspended.len(), "waiting for suspended loads to settle");
            for latch in suspended {
                latch.wait().await;
            }
        }
    }

    /// Identity of every mounted node, root-first. Instance numbers
    /// survive re-renders; generations advance on remount.
    pub fn mounted_nodes(&self) -> Vec<NodeIdentity> {
        let mut out = Vec::new();
        node::collect_slot_identities(&self.root, &mut out);
        out
    }

    /// Fires the render hooks once per newly resolved location.
    fn emit_rendered(&mut self) {
        let Some(key) = self.ctx.router.transition().state().resolved_location_key else {
            return;
        };
        if self.last_emitted_key.as_deref() == Some(key.as_str()) {
            return;
        }
        debug!(%key, "location committed to screen");
        if let Some(hook) = &self.ctx.options.on_rendered {
            hook(&key);
        }
        if let Some(hook) = &self.ctx.options.scroll_restoration {
            hook(&key);
        }
        self.last_emitted_key = Some(key);
    }
}

impl fmt::Debug for MatchTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchTree")
            .field("options", &self.ctx.options)
            .field("mounted", &self.mounted_nodes().len())
            .field("last_emitted_key", &self.last_emitted_key)
            .finish()
    }
}

impl Drop for MatchTree {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{Route, RouterDefaults};

    #[test]
    fn test_empty_router_renders_nothing() {
        let router = Arc::new(RouterCore::new(
            vec![Route::root("root")],
            RouterDefaults::new(),
        ));
        let mut tree = MatchTree::new(router, MatchTreeOptions::default());
        let rendered = tree.render().expect("empty tree renders");
        assert!(matches!(rendered, Rendered::Nothing));
        assert!(tree.mounted_nodes().is_empty());
    }

    #[test]
    fn test_invalidation_bumps_epoch_on_list_change() {
        let router = Arc::new(RouterCore::new(
            vec![Route::root("root").with_component(crate::routes::component(|_scope| {
                Ok(crate::rendered::Rendered::text("root"))
            }))],
            RouterDefaults::new(),
        ));
        let tree = MatchTree::new(router.clone(), MatchTreeOptions::default());
        let before = tree.render_epoch();
        let m = crate::match_model::RouteMatch::new("root")
            .with_status(crate::match_model::MatchStatus::Success);
        router.install_matches(vec![m]).expect("install");
        assert!(tree.render_epoch() > before);
    }
}
