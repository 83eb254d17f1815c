//! Integration tests for login, logout and user lookup

mod common;

use common::{TestContext, status, user};
use twittcache::service::{Origin, TimelineRequest};

#[tokio::test]
async fn test_login_persists_across_restart() {
    let ctx = TestContext::new().await;
    {
        let mut session = ctx.context.session.lock().await;
        assert!(session.has_consumer_credentials());
        assert!(!session.is_logged_in());

        ctx.accounts()
            .complete_login(
                &mut session,
                "access-token".to_string(),
                "access-secret".to_string(),
                user(42, "ferris"),
            )
            .await
            .unwrap();
    }

    let ctx = ctx.restart().await;
    let session = ctx.context.session.lock().await;

    assert!(session.is_logged_in());
    assert_eq!(session.screen_name.as_deref(), Some("ferris"));
    assert_eq!(session.user_id, Some(42));
    assert_eq!(session.current_user, Some(user(42, "ferris")));
}

#[tokio::test]
async fn test_user_timeline_follows_logged_in_handle() {
    let ctx = TestContext::new().await;
    ctx.remote.serve(vec![status(1)]);
    let mut session = ctx.context.session.lock().await;
    ctx.accounts()
        .complete_login(&mut session, "t".into(), "s".into(), user(42, "ferris"))
        .await
        .unwrap();

    let loaded = ctx
        .timelines()
        .load(TimelineRequest::User, &mut session)
        .await;

    assert_eq!(loaded.origin, Origin::Remote);
    assert_eq!(loaded.statuses, vec![status(1)]);
}

#[tokio::test]
async fn test_lookup_falls_back_to_cached_user_offline() {
    let ctx = TestContext::new().await;
    ctx.remote.add_user(user(7, "crab"));
    let accounts = ctx.accounts();

    let online = accounts.lookup_user("crab").await;
    ctx.connectivity.set_online(false);
    let offline = accounts.lookup_user("crab").await;

    assert_eq!(online.origin, Origin::Remote);
    assert_eq!(offline.origin, Origin::Cache);
    assert_eq!(offline.user, Some(user(7, "crab")));
}

#[tokio::test]
async fn test_logout_clears_session_tables_and_images() {
    let ctx = TestContext::new().await;
    ctx.remote.serve(vec![status(1), status(2)]);
    {
        let mut session = ctx.context.session.lock().await;
        ctx.accounts()
            .complete_login(&mut session, "t".into(), "s".into(), user(42, "ferris"))
            .await
            .unwrap();
        ctx.timelines()
            .load(TimelineRequest::Home, &mut session)
            .await;
    }
    ctx.context
        .images
        .get("https://pbs.example.com/ferris.gif")
        .await
        .unwrap();

    ctx.context.logout().await.unwrap();

    let ctx = ctx.restart().await;
    let session = ctx.context.session.lock().await;
    assert!(!session.is_logged_in());
    assert_eq!(session.current_user, None);
    assert!(session.has_consumer_credentials());
    for (table, rows) in ctx.context.stores.table_counts().await {
        assert_eq!(rows, 0, "{table} should be empty");
    }
    assert_eq!(ctx.context.images.disk().unwrap().size_bytes().await, 0);
}
