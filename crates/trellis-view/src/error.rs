// File: src/error.rs
// Purpose: The exception channel of the match tree — structured signals and fatal errors

use std::fmt;
use std::sync::Arc;

use crate::match_model::{LoadHandle, MatchId, RouteId};

/// An opaque user/loader error travelling the exception channel.
///
/// Clonable so a caught error can be held by a boundary across renders
/// while the original travels on when rethrown.
#[derive(Debug, Clone)]
pub struct UserError(Arc<anyhow::Error>);

impl UserError {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    pub fn message(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<anyhow::Error> for UserError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(error)
    }
}

/// A not-found signal. Structured value, not an exception in spirit —
/// caught only by the boundary whose route id matches, or by the root
/// handler when unscoped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not found (route {route_id:?})")]
pub struct NotFoundError {
    /// The route responsible for handling this signal; `None` is unscoped
    /// and falls to the nearest root handler.
    pub route_id: Option<RouteId>,
    pub message: Option<String>,
}

impl NotFoundError {
    pub fn scoped(route_id: RouteId) -> Self {
        Self { route_id: Some(route_id), message: None }
    }

    pub fn unscoped() -> Self {
        Self { route_id: None, message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A redirect signal. Carries the pending load promise the renderer must
/// await rather than render.
#[derive(Debug, Clone)]
pub struct RedirectSignal {
    pub location: String,
    pub load: LoadHandle,
}

impl RedirectSignal {
    pub fn new(location: impl Into<String>, load: LoadHandle) -> Self {
        Self { location: location.into(), load }
    }
}

/// Everything that can break out of a render pass.
///
/// `MissingMatch` and `Integrity` are fatal — bugs in the surrounding
/// list-maintenance logic, never recovered. The rest are caught by the
/// boundary rules in the match node.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderBreak {
    #[error("no active match with id {0}")]
    MissingMatch(MatchId),
    #[error("match tree integrity violation: {0}")]
    Integrity(String),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("redirect to {}", .0.location)]
    Redirect(RedirectSignal),
    #[error("{0}")]
    User(UserError),
}

impl From<anyhow::Error> for RenderBreak {
    fn from(error: anyhow::Error) -> Self {
        RenderBreak::User(UserError::new(error))
    }
}

impl From<serde_json::Error> for RenderBreak {
    fn from(error: serde_json::Error) -> Self {
        RenderBreak::Integrity(format!("non-serializable render key: {error}"))
    }
}

/// Errors surfaced by the tree root after the global boundary has had its
/// say. Redirects never reach here — the root async boundary absorbs them.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("no active match with id {0}")]
    MissingMatch(MatchId),
    #[error("match tree integrity violation: {0}")]
    Integrity(String),
    #[error("unhandled not-found (route {0:?})")]
    UnhandledNotFound(Option<RouteId>),
    #[error("unhandled route error: {0}")]
    Unhandled(UserError),
}
