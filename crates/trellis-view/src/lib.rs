// Trellis View - match-tree rendering core
// Renders the active route match list as a recursive node tree with
// boundaries, suspense latches, remount keys, and navigation blocking

pub mod accessors;
pub mod blocker;
pub mod core;
pub mod error;
pub mod history;
pub mod match_model;
pub mod matcher;
pub mod node;
pub mod rendered;
pub mod resolve;
pub mod routes;
pub mod tree;

// Re-export the router core and its data model
pub use crate::core::RouterCore;
pub use match_model::{
    LoadHandle, MatchError, MatchId, MatchStatus, Params, RouteId, RouteMatch, SsrMode,
    TransitionState, TransitionStatus,
};

// Re-export the exception channel
pub use error::{NotFoundError, RedirectSignal, RenderBreak, TreeError, UserError};

// Re-export view configuration and the rendered tree
pub use node::{NodeIdentity, RenderScope};
pub use rendered::Rendered;
pub use routes::{component, CatchHookFn, Component, RemountContext, Route, RouterDefaults};
pub use tree::{MatchTree, MatchTreeOptions};

// Re-export path matching
pub use matcher::{MatchedRoutes, ParsedLocation, PathMatcher, SegmentMatcher};

// Re-export navigation, blocking, and reactive accessors
pub use accessors::{use_match, use_match_with, MatchLookup, MatchLookupError};
pub use blocker::{
    blocker_location, should_block, use_blocker, BlockerArgs, BlockerLocation, BlockerOptions,
    BlockerResolver, BlockerState, NavigationBlocker, ShouldBlockFn, NOT_FOUND_ROUTE_ID,
};
pub use history::{
    BlockArgs, BlockDecision, BlockerHook, History, HistoryLocation, NavigationAction,
};

// Re-export the reactive layer this crate renders from
pub use trellis_reactive;
pub use trellis_reactive::RenderMode;
