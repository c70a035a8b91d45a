// File: src/blocker.rs
// Purpose: Router-aware navigation blocking with an optional confirm/deny resolver

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::{debug, warn};
use trellis_reactive::{Stored, Subscription};

use crate::core::{lock, RouterCore};
use crate::history::{
    BlockArgs, BlockDecision, BlockerHook, History, HistoryLocation, NavigationAction,
};
use crate::match_model::{Params, RouteId};

/// Sentinel route id reported for locations the matcher cannot place.
pub const NOT_FOUND_ROUTE_ID: &str = "__notFound__";

/// A location as the blocker predicate sees it: resolved against the
/// route table, not just a raw href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockerLocation {
    pub route_id: RouteId,
    /// The matched route's pattern, or the raw pathname when unmatched.
    pub full_path: String,
    pub pathname: String,
    pub params: Params,
    pub search: String,
}

/// What a blocker predicate is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockerArgs {
    pub action: NavigationAction,
    pub current: BlockerLocation,
    pub next: BlockerLocation,
}

pub type ShouldBlockFuture = Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send>>;

/// Asynchronous predicate deciding whether a navigation should block.
pub type ShouldBlockFn = Arc<dyn Fn(BlockerArgs) -> ShouldBlockFuture + Send + Sync>;

/// Wraps a synchronous predicate as a [`ShouldBlockFn`].
pub fn should_block(
    predicate: impl Fn(&BlockerArgs) -> bool + Send + Sync + 'static,
) -> ShouldBlockFn {
    Arc::new(move |args| {
        let decision = predicate(&args);
        Box::pin(async move { Ok(decision) })
    })
}

/// What a blocked navigation is waiting on. `Blocked` exposes the pair of
/// locations so a confirm prompt can describe the navigation it holds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BlockerState {
    #[default]
    Idle,
    Blocked {
        action: NavigationAction,
        current: BlockerLocation,
        next: BlockerLocation,
    },
}

/// Hand-off between a blocked navigation and the prompt that decides it.
///
/// `proceed` keeps the block in place (the navigation is denied) and
/// `reset` releases it (the navigation goes through) — the names follow
/// the prompt's point of view, where proceeding means staying on the page
/// being guarded.
#[derive(Clone)]
pub struct BlockerResolver {
    state: Stored<BlockerState>,
    pending: Arc<Mutex<Option<oneshot::Sender<bool>>>>,
}

impl BlockerResolver {
    pub fn new() -> Self {
        Self {
            state: Stored::new(BlockerState::Idle),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> BlockerState {
        self.state.get()
    }

    pub fn is_blocked(&self) -> bool {
        self.state.with(|state| matches!(state, BlockerState::Blocked { .. }))
    }

    pub fn on_change(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.state.on_change(listener)
    }

    /// Confirms the block: the held navigation is denied.
    pub fn proceed(&self) {
        self.settle(true);
    }

    /// Dismisses the block: the held navigation is allowed through.
    pub fn reset(&self) {
        self.settle(false);
    }

    fn settle(&self, deny: bool) {
        match lock(&self.pending).take() {
            Some(sender) => {
                debug!(deny, "blocker resolver settled");
                let _ = sender.send(deny);
            }
            None => warn!(deny, "blocker resolver settled with no pending navigation"),
        }
    }

    pub(crate) fn begin(
        &self,
        action: NavigationAction,
        current: BlockerLocation,
        next: BlockerLocation,
    ) -> oneshot::Receiver<bool> {
        let (sender, receiver) = oneshot::channel();
        *lock(&self.pending) = Some(sender);
        self.state.set(BlockerState::Blocked { action, current, next });
        receiver
    }

    pub(crate) fn ensure_idle(&self) {
        let blocked = self.state.with(|state| *state != BlockerState::Idle);
        if blocked {
            self.state.set(BlockerState::Idle);
        }
        // a dropped sender resolves any stale receiver as allow
        lock(&self.pending).take();
    }
}

impl Default for BlockerResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BlockerResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockerResolver")
            .field("state", &self.state.get())
            .finish()
    }
}

/// Configuration for [`use_blocker`].
#[derive(Clone)]
pub struct BlockerOptions {
    pub should_block: ShouldBlockFn,
    /// When set, a blocking predicate parks the navigation on this
    /// resolver instead of denying it outright.
    pub with_resolver: Option<BlockerResolver>,
    pub enable_before_unload: bool,
}

impl BlockerOptions {
    pub fn new(should_block: ShouldBlockFn) -> Self {
        Self { should_block, with_resolver: None, enable_before_unload: false }
    }

    pub fn with_resolver(mut self, resolver: BlockerResolver) -> Self {
        self.with_resolver = Some(resolver);
        self
    }

    pub fn with_before_unload(mut self, enable: bool) -> Self {
        self.enable_before_unload = enable;
        self
    }
}

impl fmt::Debug for BlockerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockerOptions")
            .field("has_resolver", &self.with_resolver.is_some())
            .field("enable_before_unload", &self.enable_before_unload)
            .finish()
    }
}

/// An active navigation blocker. Dropping it unregisters the hook.
pub struct NavigationBlocker {
    resolver: BlockerResolver,
    registration: Option<Subscription>,
}

impl NavigationBlocker {
    pub fn resolver(&self) -> &BlockerResolver {
        &self.resolver
    }
}

impl fmt::Debug for NavigationBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationBlocker")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl Drop for NavigationBlocker {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.cancel();
        }
    }
}

/// Resolves a raw history location against the route table.
pub fn blocker_location(router: &RouterCore, location: &HistoryLocation) -> BlockerLocation {
    let matched = router.get_matched_routes(&location.pathname);
    match matched.found_route {
        Some(route_id) => {
            let full_path = router
                .route(&route_id)
                .and_then(|route| route.pattern.clone())
                .unwrap_or_else(|| location.pathname.clone());
            BlockerLocation {
                route_id,
                full_path,
                pathname: location.pathname.clone(),
                params: matched.route_params,
                search: location.search.clone(),
            }
        }
        None => BlockerLocation {
            route_id: RouteId::from(NOT_FOUND_ROUTE_ID),
            full_path: location.pathname.clone(),
            pathname: location.pathname.clone(),
            params: Params::new(),
            search: location.search.clone(),
        },
    }
}

/// Registers a route-aware blocker on `history`.
///
/// The predicate sees both endpoints resolved against the route table.
/// Leaving an unmatched location for a matched one is always allowed —
/// nothing worth guarding is mounted there. When a resolver is supplied,
/// a blocking predicate parks the navigation on it and the final decision
/// comes from `proceed` (deny) or `reset` (allow); without one the
/// navigation is denied immediately.
pub fn use_blocker(
    router: Arc<RouterCore>,
    history: &History,
    options: BlockerOptions,
) -> NavigationBlocker {
    let resolver = options.with_resolver.clone().unwrap_or_default();
    let hook_resolver = options.with_resolver.clone();
    let should_block = options.should_block.clone();

    let blocker_fn = Arc::new(move |args: BlockArgs| -> crate::history::BlockerFuture {
        let router = Arc::clone(&router);
        let should_block = should_block.clone();
        let resolver = hook_resolver.clone();
        Box::pin(async move {
            let current = blocker_location(&router, &args.current);
            let next = blocker_location(&router, &args.next);

            if current.route_id.as_str() == NOT_FOUND_ROUTE_ID
                && next.route_id.as_str() != NOT_FOUND_ROUTE_ID
            {
                debug!(next = %next.route_id, "leaving unmatched location, never blocked");
                return Ok(BlockDecision::Allow);
            }

            let predicate_args =
                BlockerArgs { action: args.action, current: current.clone(), next: next.clone() };
            if !should_block(predicate_args).await? {
                return Ok(BlockDecision::Allow);
            }

            let Some(resolver) = resolver else {
                debug!("navigation blocked without resolver");
                return Ok(BlockDecision::Block);
            };

            let receiver = resolver.begin(args.action, current, next);
            // a dropped resolver counts as allow
            let deny = receiver.await.unwrap_or(false);
            resolver.ensure_idle();
            if deny {
                Ok(BlockDecision::Block)
            } else {
                Ok(BlockDecision::Allow)
            }
        })
    });

    let registration = history.block(BlockerHook {
        blocker_fn,
        enable_before_unload: options.enable_before_unload,
    });
    NavigationBlocker { resolver, registration: Some(registration) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{Route, RouterDefaults};
    use pretty_assertions::assert_eq;

    fn router() -> Arc<RouterCore> {
        Arc::new(RouterCore::new(
            vec![
                Route::root("root").with_pattern("/"),
                Route::new("users.detail").with_pattern("/users/:id"),
            ],
            RouterDefaults::new(),
        ))
    }

    #[test]
    fn test_blocker_location_resolves_params() {
        let router = router();
        let location = HistoryLocation::from_href("/users/42?tab=posts");
        let resolved = blocker_location(&router, &location);
        assert_eq!(resolved.route_id.as_str(), "users.detail");
        assert_eq!(resolved.full_path, "/users/:id");
        assert_eq!(resolved.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(resolved.search, "tab=posts");
    }

    #[test]
    fn test_unmatched_location_gets_sentinel() {
        let router = router();
        let resolved = blocker_location(&router, &HistoryLocation::from_href("/nowhere/else"));
        assert_eq!(resolved.route_id.as_str(), NOT_FOUND_ROUTE_ID);
        assert_eq!(resolved.full_path, "/nowhere/else");
    }

    #[tokio::test]
    async fn test_predicate_false_allows() {
        let router = router();
        let history = History::new("/");
        let _blocker = use_blocker(
            router,
            &history,
            BlockerOptions::new(should_block(|_args| false)),
        );
        assert!(history.push("/users/1").await.expect("navigate"));
        assert_eq!(history.location().pathname, "/users/1");
    }

    #[tokio::test]
    async fn test_predicate_true_blocks_without_resolver() {
        let router = router();
        let history = History::new("/");
        let _blocker = use_blocker(
            router,
            &history,
            BlockerOptions::new(should_block(|_args| true)),
        );
        assert!(!history.push("/users/1").await.expect("navigate"));
        assert_eq!(history.location().pathname, "/");
    }

    #[tokio::test]
    async fn test_departure_from_unmatched_location_never_blocks() {
        let router = router();
        let history = History::new("/nowhere");
        let _blocker = use_blocker(
            router,
            &history,
            BlockerOptions::new(should_block(|_args| true)),
        );
        assert!(history.push("/users/1").await.expect("navigate"));
    }

    #[tokio::test]
    async fn test_resolver_reset_allows_navigation() {
        let router = router();
        let history = History::new("/");
        let resolver = BlockerResolver::new();
        let _blocker = use_blocker(
            router,
            &history,
            BlockerOptions::new(should_block(|_args| true)).with_resolver(resolver.clone()),
        );

        let navigation = {
            let history = history.clone();
            tokio::spawn(async move { history.push("/users/1").await })
        };
        while !resolver.is_blocked() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(resolver.state(), BlockerState::Blocked { .. }));
        resolver.reset();
        let committed = navigation.await.expect("join").expect("navigate");
        assert!(committed);
        assert_eq!(history.location().pathname, "/users/1");
        assert_eq!(resolver.state(), BlockerState::Idle);
    }

    #[tokio::test]
    async fn test_resolver_proceed_denies_navigation() {
        let router = router();
        let history = History::new("/");
        let resolver = BlockerResolver::new();
        let _blocker = use_blocker(
            router,
            &history,
            BlockerOptions::new(should_block(|_args| true)).with_resolver(resolver.clone()),
        );

        let navigation = {
            let history = history.clone();
            tokio::spawn(async move { history.push("/users/1").await })
        };
        while !resolver.is_blocked() {
            tokio::task::yield_now().await;
        }
        resolver.proceed();
        let committed = navigation.await.expect("join").expect("navigate");
        assert!(!committed);
        assert_eq!(history.location().pathname, "/");
    }

    #[tokio::test]
    async fn test_predicate_error_propagates() {
        let router = router();
        let history = History::new("/");
        let _blocker = use_blocker(
            router,
            &history,
            BlockerOptions::new(Arc::new(|_args| {
                Box::pin(async { Err(anyhow::anyhow!("predicate exploded")) })
            })),
        );
        assert!(history.push("/users/1").await.is_err());
        assert_eq!(history.location().pathname, "/");
    }
}
