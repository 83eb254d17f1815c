//! Integration tests for the image cache

mod common;

use common::{TINY_GIF, TestContext};
use twittcache::storage::cache_key;

#[tokio::test]
async fn test_fetches_once_and_serves_identical_bytes() {
    let ctx = TestContext::new().await;
    let url = "https://pbs.example.com/ferris.gif";

    let first = ctx.context.images.get(url).await.unwrap();
    let second = ctx.context.images.get(url).await.unwrap();

    assert_eq!(ctx.fetcher.calls(), 1);
    assert_eq!(first.data, TINY_GIF);
    assert_eq!(second.data, first.data);
    assert_eq!((first.width(), first.height()), (1, 1));
}

#[tokio::test]
async fn test_disk_tier_survives_restart() {
    let ctx = TestContext::new().await;
    let url = "https://pbs.example.com/banner.gif";
    ctx.context.images.get(url).await.unwrap();

    let ctx = ctx.restart().await;
    let image = ctx.context.images.get_cached(&cache_key(url)).await;

    assert_eq!(image.map(|image| image.data.clone()), Some(TINY_GIF.to_vec()));
    assert_eq!(ctx.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_disk_file_is_named_by_content_key() {
    let ctx = TestContext::new().await;
    let url = "https://pbs.example.com/key.gif";
    ctx.context.images.get(url).await.unwrap();

    let disk = ctx.context.images.disk().unwrap();
    assert!(disk.dir().join(cache_key(url)).is_file());
}

#[tokio::test]
async fn test_clear_forces_refetch() {
    let ctx = TestContext::new().await;
    let url = "https://pbs.example.com/avatar.gif";
    ctx.context.images.get(url).await.unwrap();

    ctx.context.clear_caches().await.unwrap();
    ctx.context.images.get(url).await.unwrap();

    assert_eq!(ctx.fetcher.calls(), 2);
}
