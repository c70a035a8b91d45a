// File: src/resolve.rs
// Purpose: Pure decision logic — which view a match renders, and its remount key

use serde_json::Value;

use crate::error::RenderBreak;
use crate::match_model::{LoadHandle, MatchError, MatchStatus, RouteMatch};
use crate::routes::{Component, RemountContext, Route, RouterDefaults};

/// What a match should render this pass.
#[derive(Clone)]
pub enum ResolvedView {
    Pending {
        component: Option<Component>,
        /// An unsettled minimum-pending latch holding the view open.
        waiting_min: Option<LoadHandle>,
        /// A minimum-pending duration that still needs its timer.
        schedule_min_ms: Option<u64>,
    },
    /// Propagate through the exception channel — the boundary rules in
    /// the match node decide who catches.
    Propagate(RenderBreak),
    Success {
        component: Option<Component>,
        remount_key: Option<String>,
    },
}

impl std::fmt::Debug for ResolvedView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedView::Pending { waiting_min, schedule_min_ms, .. } => f
                .debug_struct("Pending")
                .field("waiting_min", waiting_min)
                .field("schedule_min_ms", schedule_min_ms)
                .finish(),
            ResolvedView::Propagate(break_) => f.debug_tuple("Propagate").field(break_).finish(),
            ResolvedView::Success { remount_key, .. } => {
                f.debug_struct("Success").field("remount_key", remount_key).finish()
            }
        }
    }
}

pub(crate) fn pending_component(route: &Route, defaults: &RouterDefaults) -> Option<Component> {
    route.pending_component.clone().or_else(|| defaults.pending_component.clone())
}

fn pending_min_ms(route: &Route, defaults: &RouterDefaults) -> Option<u64> {
    route.pending_min_ms.or(defaults.pending_min_ms)
}

/// Derives the remount key: `remount_deps ?? defaults.remount_deps`
/// applied to `{route_id, params, loader_deps}`, stringified. `None` when
/// no dependency function is declared or it returns null — component
/// identity then persists across param changes.
pub fn derive_remount_key(
    route: &Route,
    defaults: &RouterDefaults,
    m: &RouteMatch,
) -> Result<Option<String>, RenderBreak> {
    let deps_fn = match route.remount_deps.as_ref().or(defaults.remount_deps.as_ref()) {
        Some(deps_fn) => deps_fn,
        None => return Ok(None),
    };
    let context = RemountContext {
        route_id: m.route_id.clone(),
        params: m.strict_params.clone(),
        loader_deps: m.loader_deps.clone(),
    };
    match deps_fn(&context) {
        None | Some(Value::Null) => Ok(None),
        Some(deps) => Ok(Some(serde_json::to_string(&deps)?)),
    }
}

/// Decides what a match renders.
///
/// The transient render hints win over the durable status — they cover
/// the window where a match is about to be pending but the store has not
/// committed yet. For notFound and redirected the error field must carry
/// the matching shape; that is an invariant asserted here, not inferred.
pub fn resolve_match_view(
    m: &RouteMatch,
    route: &Route,
    defaults: &RouterDefaults,
) -> Result<ResolvedView, RenderBreak> {
    if m.display_pending || m.force_pending {
        return Ok(ResolvedView::Pending {
            component: pending_component(route, defaults),
            waiting_min: None,
            schedule_min_ms: None,
        });
    }

    match m.status {
        MatchStatus::NotFound => match &m.error {
            Some(MatchError::NotFound(not_found)) => {
                Ok(ResolvedView::Propagate(RenderBreak::NotFound(not_found.clone())))
            }
            other => Err(RenderBreak::Integrity(format!(
                "match {} has notFound status but error {:?}",
                m.id, other
            ))),
        },
        MatchStatus::Redirected => match &m.error {
            // propagate the pending load promise, never render
            Some(MatchError::Redirect(signal)) => {
                Ok(ResolvedView::Propagate(RenderBreak::Redirect(signal.clone())))
            }
            other => Err(RenderBreak::Integrity(format!(
                "match {} has redirected status but error {:?}",
                m.id, other
            ))),
        },
        MatchStatus::Error => {
            let error = match &m.error {
                Some(MatchError::Runtime(error)) => error.clone(),
                other => {
                    return Err(RenderBreak::Integrity(format!(
                        "match {} has error status but error {:?}",
                        m.id, other
                    )))
                }
            };
            Ok(ResolvedView::Propagate(RenderBreak::User(error)))
        }
        MatchStatus::Pending => {
            let (waiting_min, schedule_min_ms) = match &m.min_pending {
                Some(latch) if !latch.settled() => (Some(latch.clone()), None),
                Some(_) => (None, None),
                None => (None, pending_min_ms(route, defaults)),
            };
            Ok(ResolvedView::Pending {
                component: pending_component(route, defaults),
                waiting_min,
                schedule_min_ms,
            })
        }
        MatchStatus::Success => {
            // a still-running minimum-pending latch holds the pending view
            if let Some(latch) = &m.min_pending {
                if !latch.settled() {
                    return Ok(ResolvedView::Pending {
                        component: pending_component(route, defaults),
                        waiting_min: Some(latch.clone()),
                        schedule_min_ms: None,
                    });
                }
            }
            Ok(ResolvedView::Success {
                component: route.component.clone().or_else(|| defaults.component.clone()),
                remount_key: derive_remount_key(route, defaults, m)?,
            })
        }
    }
}
