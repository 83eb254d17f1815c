//! Integration tests for timeline mirroring

mod common;

use common::{TestContext, status};
use twittcache::data::{Session, Timeline};
use twittcache::error::RemoteError;
use twittcache::service::{Origin, TimelineRequest};

#[tokio::test]
async fn test_refresh_then_offline_serves_mirror() {
    let ctx = TestContext::new().await;
    ctx.remote.serve(vec![status(1), status(2), status(3)]);
    let timelines = ctx.timelines();
    let mut session = Session::default();

    let online = timelines.load(TimelineRequest::Home, &mut session).await;
    assert_eq!(online.origin, Origin::Remote);

    ctx.connectivity.set_online(false);
    let offline = timelines.load(TimelineRequest::Home, &mut session).await;

    assert_eq!(offline.origin, Origin::Cache);
    assert_eq!(offline.statuses, online.statuses);
    assert_eq!(ctx.remote.calls(), 1);
}

#[tokio::test]
async fn test_second_refresh_replaces_first_generation() {
    let ctx = TestContext::new().await;
    let timelines = ctx.timelines();
    let mut session = Session::default();

    ctx.remote.serve(vec![status(1), status(2)]);
    timelines.load(TimelineRequest::Mentions, &mut session).await;
    ctx.remote.serve(vec![status(3)]);
    timelines.load(TimelineRequest::Mentions, &mut session).await;

    let cached = ctx
        .context
        .stores
        .timeline(Timeline::Mentions)
        .find_all()
        .await;
    assert_eq!(cached, vec![status(3)]);
}

#[tokio::test]
async fn test_remote_failure_keeps_previous_generation() {
    let ctx = TestContext::new().await;
    let timelines = ctx.timelines();
    let mut session = Session::default();
    ctx.remote.serve(vec![status(4)]);
    timelines.load(TimelineRequest::FixedQuery, &mut session).await;

    ctx.remote.fail_with(Some(RemoteError::Unauthorized));
    let loaded = timelines
        .load(TimelineRequest::FixedQuery, &mut session)
        .await;

    assert_eq!(loaded.origin, Origin::Cache);
    assert_eq!(loaded.remote_error, Some(RemoteError::Unauthorized));
    assert_eq!(loaded.statuses, vec![status(4)]);
}

#[tokio::test]
async fn test_mirror_survives_restart() {
    let ctx = TestContext::new().await;
    ctx.remote.serve(vec![status(7), status(8)]);
    {
        let mut session = ctx.context.session.lock().await;
        ctx.timelines()
            .load(TimelineRequest::Query("crab".to_string()), &mut session)
            .await;
    }

    let ctx = ctx.restart().await;
    ctx.connectivity.set_online(false);
    let mut session = ctx.context.session.lock().await;
    assert_eq!(session.last_query.as_deref(), Some("crab"));

    let loaded = ctx
        .timelines()
        .load(TimelineRequest::Query("crab".to_string()), &mut session)
        .await;
    assert_eq!(loaded.statuses, vec![status(7), status(8)]);
}

#[tokio::test]
async fn test_lists_are_mirrored_independently() {
    let ctx = TestContext::new().await;
    let timelines = ctx.timelines();
    let mut session = Session::default();

    ctx.remote.serve(vec![status(10)]);
    timelines.load(TimelineRequest::List(1), &mut session).await;
    ctx.remote.serve(vec![status(20), status(21)]);
    timelines.load(TimelineRequest::List(2), &mut session).await;

    ctx.connectivity.set_online(false);
    let first = timelines.load(TimelineRequest::List(1), &mut session).await;
    let second = timelines.load(TimelineRequest::List(2), &mut session).await;

    assert_eq!(first.statuses, vec![status(10)]);
    assert_eq!(second.statuses, vec![status(20), status(21)]);
}

#[tokio::test]
async fn test_clear_caches_keeps_session() {
    let ctx = TestContext::new().await;
    ctx.remote.serve(vec![status(1)]);
    let mut session = Session::default();
    ctx.timelines()
        .load(TimelineRequest::Home, &mut session)
        .await;
    ctx.context.db.set_preference("oauth_token", "kept").await.unwrap();

    ctx.context.clear_caches().await.unwrap();

    for (table, rows) in ctx.context.stores.table_counts().await {
        assert_eq!(rows, 0, "{table} should be empty");
    }
    assert_eq!(
        ctx.context.db.get_preference("oauth_token").await.unwrap().as_deref(),
        Some("kept")
    );
}

#[tokio::test]
async fn test_status_actions_need_network() {
    let ctx = TestContext::new().await;
    ctx.remote.serve(vec![status(5)]);
    let statuses = ctx.statuses();

    assert_eq!(statuses.post("hello").await.unwrap().text.as_deref(), Some("hello"));
    assert_eq!(statuses.retweet(5).await.unwrap().id, 5);

    ctx.connectivity.set_online(false);
    assert!(matches!(
        statuses.favorite(5).await,
        Err(twittcache::error::AppError::Offline)
    ));
}
