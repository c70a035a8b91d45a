// File: src/match_model.rs
// Purpose: One segment of the currently-resolved route tree, and its supporting types

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{NotFoundError, RedirectSignal, UserError};

/// Stable identity of a match for the lifetime of one navigation
/// resolution. A new resolution of the same route gets a new id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchId(Uuid);

impl MatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies which route definition produced a match — stable across
/// remounts of the same route at a new param value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RouteId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RouteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Committed lifecycle status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStatus {
    Pending,
    Success,
    Error,
    NotFound,
    Redirected,
}

impl trellis_reactive::ShallowEq for MatchStatus {
    fn shallow_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// Tri-state server-rendering mode for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SsrMode {
    /// Render on the server.
    Full,
    /// Load data on the server, render on the client.
    DataOnly,
    /// Client only.
    ClientOnly,
}

impl Default for SsrMode {
    fn default() -> Self {
        SsrMode::Full
    }
}

/// A clonable settle-once latch over a pending load.
///
/// `settle()` is idempotent; `wait()` resolves immediately once settled.
#[derive(Clone)]
pub struct LoadHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl LoadHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// A handle that is already settled.
    pub fn settled_handle() -> Self {
        let handle = Self::new();
        handle.settle();
        handle
    }

    pub fn settled(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn settle(&self) {
        // send_replace never fails and repeated settles are harmless
        self.tx.send_replace(true);
    }

    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Default for LoadHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandle").field("settled", &self.settled()).finish()
    }
}

/// The error slot of a match. Present iff the status is error, notFound,
/// or redirected; the status resolver asserts the shape matches.
#[derive(Debug, Clone)]
pub enum MatchError {
    NotFound(NotFoundError),
    Redirect(RedirectSignal),
    Runtime(UserError),
}

pub type Params = BTreeMap<String, String>;

/// One position in the active match list.
///
/// `display_pending`/`force_pending` are transient render hints, distinct
/// from the committed `status`; `min_pending` is the per-match mutable
/// side slot for the minimum-pending latch, accessed only through the
/// router core.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub id: MatchId,
    pub route_id: RouteId,
    pub status: MatchStatus,
    pub params: Params,
    pub strict_params: Params,
    pub search: serde_json::Map<String, Value>,
    pub strict_search: serde_json::Map<String, Value>,
    pub loader_deps: Value,
    pub error: Option<MatchError>,
    pub ssr: SsrMode,
    pub display_pending: bool,
    pub force_pending: bool,
    pub context: Value,
    /// Set by the core when no child route matched below this match.
    pub global_not_found: bool,
    /// Pending load promise; required when the status is redirected.
    pub load: Option<LoadHandle>,
    pub min_pending: Option<LoadHandle>,
}

impl RouteMatch {
    pub fn new(route_id: impl Into<RouteId>) -> Self {
        Self {
            id: MatchId::new(),
            route_id: route_id.into(),
            status: MatchStatus::Pending,
            params: Params::new(),
            strict_params: Params::new(),
            search: serde_json::Map::new(),
            strict_search: serde_json::Map::new(),
            loader_deps: Value::Null,
            error: None,
            ssr: SsrMode::default(),
            display_pending: false,
            force_pending: false,
            context: Value::Null,
            global_not_found: false,
            load: None,
            min_pending: None,
        }
    }

    pub fn with_status(mut self, status: MatchStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.strict_params = params.clone();
        self.params = params;
        self
    }

    pub fn with_loader_deps(mut self, loader_deps: Value) -> Self {
        self.loader_deps = loader_deps;
        self
    }

    pub fn with_error(mut self, error: MatchError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_ssr(mut self, ssr: SsrMode) -> Self {
        self.ssr = ssr;
        self
    }
}

/// Transition status of the router as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionStatus {
    #[default]
    Idle,
    Pending,
}

/// Internal transition state store.
#[derive(Debug, Clone, Default)]
pub struct TransitionState {
    pub pending_match_ids: Vec<MatchId>,
    pub is_transitioning: bool,
    pub status: TransitionStatus,
    /// Key of the last fully-resolved location; drives the onRendered
    /// lifecycle event.
    pub resolved_location_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_handle_settle_is_idempotent() {
        let handle = LoadHandle::new();
        assert!(!handle.settled());
        handle.settle();
        handle.settle();
        assert!(handle.settled());
    }

    #[tokio::test]
    async fn test_load_handle_wait_resolves_after_settle() {
        let handle = LoadHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.wait().await });
        handle.settle();
        task.await.expect("wait task");
        // waiting on an already-settled handle returns immediately
        handle.wait().await;
    }

    #[test]
    fn test_match_ids_are_unique() {
        assert_ne!(MatchId::new(), MatchId::new());
    }
}
