// File: src/history.rs
// Purpose: In-memory location history with asynchronous navigation blocking hooks

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;
use trellis_reactive::{Store, Subscription};

use crate::core::lock;
use crate::matcher::parse_location;

/// How a navigation was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NavigationAction {
    Push,
    Replace,
    Back,
    Forward,
}

/// A location as the history layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLocation {
    pub pathname: String,
    pub search: String,
}

impl HistoryLocation {
    pub fn from_href(href: &str) -> Self {
        let parsed = parse_location(href);
        Self { pathname: parsed.pathname, search: parsed.search }
    }

    pub fn href(&self) -> String {
        if self.search.is_empty() {
            self.pathname.clone()
        } else {
            format!("{}?{}", self.pathname, self.search)
        }
    }
}

/// What a blocker hook is asked about.
#[derive(Debug, Clone)]
pub struct BlockArgs {
    pub action: NavigationAction,
    pub current: HistoryLocation,
    pub next: HistoryLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDecision {
    Allow,
    Block,
}

pub type BlockerFuture = Pin<Box<dyn Future<Output = anyhow::Result<BlockDecision>> + Send>>;

pub type BlockerHookFn = Arc<dyn Fn(BlockArgs) -> BlockerFuture + Send + Sync>;

/// A registered navigation blocker.
#[derive(Clone)]
pub struct BlockerHook {
    pub blocker_fn: BlockerHookFn,
    /// Whether the host should also arm a before-unload prompt while this
    /// hook is registered.
    pub enable_before_unload: bool,
}

impl fmt::Debug for BlockerHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockerHook")
            .field("enable_before_unload", &self.enable_before_unload)
            .finish()
    }
}

struct HistoryInner {
    location: Store<HistoryLocation>,
    blockers: Mutex<Vec<(u64, BlockerHook)>>,
    next_blocker_id: Mutex<u64>,
}

/// An in-memory history. Clones share state.
#[derive(Clone)]
pub struct History {
    inner: Arc<HistoryInner>,
}

impl History {
    pub fn new(initial: impl Into<String>) -> Self {
        let initial = initial.into();
        Self {
            inner: Arc::new(HistoryInner {
                location: Store::new(HistoryLocation::from_href(&initial)),
                blockers: Mutex::new(Vec::new()),
                next_blocker_id: Mutex::new(1),
            }),
        }
    }

    pub fn location(&self) -> HistoryLocation {
        self.inner.location.state()
    }

    /// The location store, for bridging into derived subscriptions.
    pub fn location_store(&self) -> Store<HistoryLocation> {
        self.inner.location.clone()
    }

    /// Registers a blocker hook. The returned subscription unregisters it.
    pub fn block(&self, hook: BlockerHook) -> Subscription {
        let id = {
            let mut next = lock(&self.inner.next_blocker_id);
            let id = *next;
            *next += 1;
            id
        };
        lock(&self.inner.blockers).push((id, hook));
        debug!(blocker_id = id, "registered navigation blocker");
        let inner = Arc::clone(&self.inner);
        Subscription::callback(move || {
            lock(&inner.blockers).retain(|(entry_id, _)| *entry_id != id);
            debug!(blocker_id = id, "unregistered navigation blocker");
        })
    }

    pub fn blocker_count(&self) -> usize {
        lock(&self.inner.blockers).len()
    }

    pub fn has_before_unload_blockers(&self) -> bool {
        lock(&self.inner.blockers).iter().any(|(_, hook)| hook.enable_before_unload)
    }

    /// Attempts a navigation. Every registered hook runs in registration
    /// order; the first one that blocks wins and the location stays put.
    /// Returns whether the navigation committed.
    pub async fn navigate(
        &self,
        action: NavigationAction,
        href: &str,
    ) -> anyhow::Result<bool> {
        let next = HistoryLocation::from_href(href);
        let current = self.location();
        let hooks: Vec<BlockerHook> = lock(&self.inner.blockers)
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        for hook in hooks {
            let args = BlockArgs {
                action,
                current: current.clone(),
                next: next.clone(),
            };
            match (hook.blocker_fn)(args).await? {
                BlockDecision::Allow => {}
                BlockDecision::Block => {
                    debug!(href, "navigation blocked");
                    return Ok(false);
                }
            }
        }
        debug!(href, ?action, "navigation committed");
        self.inner.location.update(|location| *location = next);
        Ok(true)
    }

    pub async fn push(&self, href: &str) -> anyhow::Result<bool> {
        self.navigate(NavigationAction::Push, href).await
    }

    pub async fn replace(&self, href: &str) -> anyhow::Result<bool> {
        self.navigate(NavigationAction::Replace, href).await
    }
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("location", &self.location())
            .field("blockers", &self.blocker_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn allow_all() -> BlockerHook {
        BlockerHook {
            blocker_fn: Arc::new(|_args| Box::pin(async { Ok(BlockDecision::Allow) })),
            enable_before_unload: false,
        }
    }

    #[test]
    fn test_from_href_splits_search() {
        let location = HistoryLocation::from_href("/users/7?tab=posts");
        assert_eq!(location.pathname, "/users/7");
        assert_eq!(location.search, "tab=posts");
        assert_eq!(location.href(), "/users/7?tab=posts");
    }

    #[tokio::test]
    async fn test_navigate_commits_when_unblocked() {
        let history = History::new("/");
        let _registration = history.block(allow_all());
        let committed = history.push("/about").await.expect("navigate");
        assert!(committed);
        assert_eq!(history.location().pathname, "/about");
    }

    #[tokio::test]
    async fn test_blocked_navigation_keeps_location() {
        let history = History::new("/");
        let _registration = history.block(BlockerHook {
            blocker_fn: Arc::new(|_args| Box::pin(async { Ok(BlockDecision::Block) })),
            enable_before_unload: true,
        });
        let committed = history.push("/about").await.expect("navigate");
        assert!(!committed);
        assert_eq!(history.location().pathname, "/");
        assert!(history.has_before_unload_blockers());
    }

    #[tokio::test]
    async fn test_any_one_blocking_hook_denies() {
        let history = History::new("/");
        let _allow = history.block(allow_all());
        let _block = history.block(BlockerHook {
            blocker_fn: Arc::new(|_args| Box::pin(async { Ok(BlockDecision::Block) })),
            enable_before_unload: false,
        });
        let committed = history.push("/about").await.expect("navigate");
        assert!(!committed);
        assert_eq!(history.location().pathname, "/");
    }

    #[tokio::test]
    async fn test_unregistered_blocker_no_longer_runs() {
        let history = History::new("/");
        let registration = history.block(BlockerHook {
            blocker_fn: Arc::new(|_args| Box::pin(async { Ok(BlockDecision::Block) })),
            enable_before_unload: false,
        });
        registration.cancel();
        assert_eq!(history.blocker_count(), 0);
        let committed = history.push("/about").await.expect("navigate");
        assert!(committed);
    }
}
