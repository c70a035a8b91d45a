// File: tests/pending_min.rs
// Purpose: Minimum-pending window behavior under a paused clock

use std::sync::Arc;
use std::time::Duration;

use trellis_view::{
    component, MatchStatus, MatchTree, MatchTreeOptions, Rendered, Route, RouteMatch, RouterCore,
    RouterDefaults,
};

fn setup(pending_min_ms: u64) -> (Arc<RouterCore>, MatchTree, Vec<trellis_view::MatchId>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let router = Arc::new(RouterCore::new(
        vec![
            Route::root("root").with_component(component(|scope| {
                let child = scope.outlet()?;
                Ok(Rendered::element("shell", vec![child]))
            })),
            Route::new("report")
                .with_component(component(|_scope| Ok(Rendered::text("report body"))))
                .with_pending_component(component(|_scope| Ok(Rendered::text("crunching"))))
                .with_pending_min_ms(pending_min_ms),
        ],
        RouterDefaults::new(),
    ));
    let tree = MatchTree::new(Arc::clone(&router), MatchTreeOptions::default());
    let ids = router
        .install_matches(vec![
            RouteMatch::new("root").with_status(MatchStatus::Success),
            RouteMatch::new("report"),
        ])
        .expect("install");
    (router, tree, ids)
}

async fn let_timers_run() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_fast_load_stays_pending_until_window_elapses() {
    let (router, mut tree, ids) = setup(200);

    // first pass shows the pending view and arms the 200ms window
    let rendered = tree.render().expect("render");
    assert!(rendered.contains_text("crunching"));

    // the load settles at 50ms, well inside the window
    tokio::time::advance(Duration::from_millis(50)).await;
    let_timers_run().await;
    router.settle_loaded(&ids[1]).expect("settle");
    let rendered = tree.render().expect("render");
    assert!(rendered.contains_text("crunching"));
    assert!(!rendered.contains_text("report body"));

    // once the window elapses the success view appears
    tokio::time::advance(Duration::from_millis(200)).await;
    let_timers_run().await;
    let rendered = tree.render().expect("render");
    assert!(rendered.contains_text("report body"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_load_is_not_held_by_the_window() {
    let (router, mut tree, ids) = setup(200);

    let rendered = tree.render().expect("render");
    assert!(rendered.contains_text("crunching"));

    // the window elapses while the load is still out
    tokio::time::advance(Duration::from_millis(300)).await;
    let_timers_run().await;
    let rendered = tree.render().expect("render");
    assert!(rendered.contains_text("crunching"));

    // the load lands after the window: success renders immediately
    router.settle_loaded(&ids[1]).expect("settle");
    let rendered = tree.render().expect("render");
    assert!(rendered.contains_text("report body"));
}

#[tokio::test(start_paused = true)]
async fn test_render_settled_spans_the_whole_window() {
    let (router, mut tree, ids) = setup(200);

    let settle_router = Arc::clone(&router);
    let settle_id = ids[1].clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        settle_router.settle_loaded(&settle_id).expect("settle");
    });

    // the paused clock auto-advances while everything is parked on timers
    let rendered = tree.render_settled().await.expect("settled");
    assert!(rendered.contains_text("report body"));
}

#[test]
fn test_window_is_skipped_without_a_runtime() {
    let (router, mut tree, ids) = setup(200);

    let rendered = tree.render().expect("render");
    assert!(rendered.contains_text("crunching"));

    // no timer was armed, so a settled load renders straight away
    router.settle_loaded(&ids[1]).expect("settle");
    let rendered = tree.render().expect("render");
    assert!(rendered.contains_text("report body"));
}
