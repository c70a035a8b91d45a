// File: src/routes.rs
// Purpose: Per-route view configuration and router-wide defaults

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{RenderBreak, UserError};
use crate::match_model::{Params, RouteId};
use crate::node::RenderScope;
use crate::rendered::Rendered;

/// A renderable view: success component, pending view, error view, or
/// not-found view. Pure function of its scope.
pub type Component =
    Arc<dyn Fn(&mut RenderScope<'_>) -> Result<Rendered, RenderBreak> + Send + Sync>;

/// Wraps a render function as a [`Component`].
pub fn component(
    f: impl Fn(&mut RenderScope<'_>) -> Result<Rendered, RenderBreak> + Send + Sync + 'static,
) -> Component {
    Arc::new(f)
}

/// Input to a route's remount-dependency function.
#[derive(Debug, Clone)]
pub struct RemountContext {
    pub route_id: RouteId,
    pub params: Params,
    pub loader_deps: Value,
}

pub type RemountDepsFn = Arc<dyn Fn(&RemountContext) -> Option<Value> + Send + Sync>;

/// Hook invoked when a boundary catches an error.
pub type CatchHookFn = Arc<dyn Fn(&UserError) + Send + Sync>;

/// One route definition: which views it declares and how its subtree
/// remounts. Boundaries exist only where a view is declared.
#[derive(Clone)]
pub struct Route {
    pub id: RouteId,
    pub is_root: bool,
    /// URL pattern registered with the path matcher, e.g. "/users/:id".
    pub pattern: Option<String>,
    pub component: Option<Component>,
    pub pending_component: Option<Component>,
    pub error_component: Option<Component>,
    pub not_found_component: Option<Component>,
    pub on_catch: Option<CatchHookFn>,
    pub on_error: Option<CatchHookFn>,
    pub remount_deps: Option<RemountDepsFn>,
    /// Minimum time the pending view stays up once shown, in milliseconds.
    pub pending_min_ms: Option<u64>,
}

impl Route {
    pub fn new(id: impl Into<RouteId>) -> Self {
        Self {
            id: id.into(),
            is_root: false,
            pattern: None,
            component: None,
            pending_component: None,
            error_component: None,
            not_found_component: None,
            on_catch: None,
            on_error: None,
            remount_deps: None,
            pending_min_ms: None,
        }
    }

    pub fn root(id: impl Into<RouteId>) -> Self {
        let mut route = Self::new(id);
        route.is_root = true;
        route
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.component = Some(component);
        self
    }

    pub fn with_pending_component(mut self, component: Component) -> Self {
        self.pending_component = Some(component);
        self
    }

    pub fn with_error_component(mut self, component: Component) -> Self {
        self.error_component = Some(component);
        self
    }

    pub fn with_not_found_component(mut self, component: Component) -> Self {
        self.not_found_component = Some(component);
        self
    }

    pub fn with_on_catch(mut self, hook: CatchHookFn) -> Self {
        self.on_catch = Some(hook);
        self
    }

    pub fn with_on_error(mut self, hook: CatchHookFn) -> Self {
        self.on_error = Some(hook);
        self
    }

    pub fn with_remount_deps(mut self, deps: RemountDepsFn) -> Self {
        self.remount_deps = Some(deps);
        self
    }

    pub fn with_pending_min_ms(mut self, ms: u64) -> Self {
        self.pending_min_ms = Some(ms);
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("is_root", &self.is_root)
            .field("pattern", &self.pattern)
            .field("has_component", &self.component.is_some())
            .field("has_error_component", &self.error_component.is_some())
            .field("has_not_found_component", &self.not_found_component.is_some())
            .field("pending_min_ms", &self.pending_min_ms)
            .finish()
    }
}

/// Router-wide view defaults. Resolution is always an explicit
/// `{route, defaults}` pair — see the resolver module.
#[derive(Clone, Default)]
pub struct RouterDefaults {
    pub component: Option<Component>,
    pub pending_component: Option<Component>,
    pub error_component: Option<Component>,
    pub not_found_component: Option<Component>,
    pub on_catch: Option<CatchHookFn>,
    pub remount_deps: Option<RemountDepsFn>,
    pub pending_min_ms: Option<u64>,
}

impl RouterDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.component = Some(component);
        self
    }

    pub fn with_pending_component(mut self, component: Component) -> Self {
        self.pending_component = Some(component);
        self
    }

    pub fn with_error_component(mut self, component: Component) -> Self {
        self.error_component = Some(component);
        self
    }

    pub fn with_not_found_component(mut self, component: Component) -> Self {
        self.not_found_component = Some(component);
        self
    }

    pub fn with_on_catch(mut self, hook: CatchHookFn) -> Self {
        self.on_catch = Some(hook);
        self
    }

    pub fn with_remount_deps(mut self, deps: RemountDepsFn) -> Self {
        self.remount_deps = Some(deps);
        self
    }

    pub fn with_pending_min_ms(mut self, ms: u64) -> Self {
        self.pending_min_ms = Some(ms);
        self
    }
}

impl fmt::Debug for RouterDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterDefaults")
            .field("has_component", &self.component.is_some())
            .field("has_pending_component", &self.pending_component.is_some())
            .field("has_error_component", &self.error_component.is_some())
            .field("has_not_found_component", &self.not_found_component.is_some())
            .field("pending_min_ms", &self.pending_min_ms)
            .finish()
    }
}
