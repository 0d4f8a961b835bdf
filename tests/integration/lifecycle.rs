//! Multi-generation scenarios against the library API

use shellcache::fetch::FetchRequest;
use shellcache::manager::{
    AssetCacheManager, ControlMessage, FetchOutcome, LifecycleState, MessageOutcome, StoredManifest,
};
use shellcache::manifest::{CorePaths, ResourceManifest};
use shellcache::store::{CacheStorage, DiskStorage, MemoryStorage};
use shellcache::testing::StaticFetcher;
use shellcache::Origin;
use std::sync::Arc;
use tempfile::TempDir;

const ORIGIN: &str = "http://app.local";
const CONTENT: &str = "flutter-app-cache";
const TEMP: &str = "flutter-temp-cache";
const MANIFEST: &str = "flutter-app-manifest";

fn url(key: &str) -> String {
    format!("{}/{}", ORIGIN, key)
}

fn generation(
    entries: &[(&str, &str)],
    core: &[&str],
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<StaticFetcher>,
) -> AssetCacheManager {
    let manifest: ResourceManifest = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let core = CorePaths::new(core.iter().copied(), &manifest).unwrap();
    AssetCacheManager::new(Origin::parse(ORIGIN).unwrap(), manifest, core, storage, fetcher)
}

async fn install_and_activate(manager: &AssetCacheManager) {
    manager.install().await.unwrap();
    assert!(manager.should_activate());
    manager.activate().await.unwrap();
    assert_eq!(manager.state(), LifecycleState::Activated);
}

async fn body(storage: &dyn CacheStorage, key: &str) -> Option<Vec<u8>> {
    storage
        .get(CONTENT, &url(key))
        .await
        .unwrap()
        .map(|r| r.body)
}

#[tokio::test]
async fn first_run_caches_core_and_records_manifest() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.serve(&url("a.js"), "a1");

    let manager = generation(
        &[("/", "h1"), ("a.js", "h2")],
        &["a.js"],
        storage.clone(),
        fetcher.clone(),
    );
    install_and_activate(&manager).await;

    assert_eq!(storage.keys(CONTENT).await.unwrap(), vec![url("a.js")]);
    assert_eq!(storage.keys(MANIFEST).await.unwrap(), vec!["manifest"]);
    assert!(!storage.has_store(TEMP).await.unwrap());
    assert!(manager.clients_claimed());

    let stored = manager.stored_manifest().await.unwrap().unwrap();
    assert_eq!(&stored, manager.manifest());
}

#[tokio::test]
async fn upgrade_keeps_unchanged_and_replaces_changed() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.serve(&url("a.js"), "a1").serve(&url("b.js"), "b1");

    let first = generation(
        &[("a.js", "h1"), ("b.js", "h2")],
        &["a.js", "b.js"],
        storage.clone(),
        fetcher.clone(),
    );
    install_and_activate(&first).await;

    fetcher.serve(&url("b.js"), "b2");
    let second = generation(
        &[("a.js", "h1"), ("b.js", "h3")],
        &["b.js"],
        storage.clone(),
        fetcher.clone(),
    );
    second.install().await.unwrap();
    let report = second.activate().await.unwrap();

    assert!(!report.fresh_install);
    assert_eq!(report.evicted, vec!["b.js"]);
    assert_eq!(report.retained, 1);
    assert_eq!(body(storage.as_ref(), "a.js").await, Some(b"a1".to_vec()));
    assert_eq!(body(storage.as_ref(), "b.js").await, Some(b"b2".to_vec()));
    assert_eq!(
        storage.keys(CONTENT).await.unwrap(),
        vec![url("a.js"), url("b.js")]
    );
    assert!(!storage.has_store(TEMP).await.unwrap());
    assert_eq!(fetcher.request_count(&url("a.js")), 1);
}

#[tokio::test]
async fn waiting_generation_leaves_nothing_for_the_next_one() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.serve(&url("a.js"), "a1").serve(&url("b.js"), "b1");

    let first = generation(
        &[("a.js", "h1"), ("b.js", "h1")],
        &["a.js", "b.js"],
        storage.clone(),
        fetcher.clone(),
    );
    install_and_activate(&first).await;

    fetcher.serve(&url("b.js"), "b2");
    let skipped = generation(&[("b.js", "h2")], &["b.js"], storage.clone(), fetcher.clone())
        .with_skip_waiting_on_install(false);
    skipped.install().await.unwrap();
    assert!(!skipped.should_activate());

    fetcher.serve(&url("b.js"), "b3");
    let current = generation(
        &[("a.js", "h1"), ("b.js", "h3")],
        &["a.js"],
        storage.clone(),
        fetcher.clone(),
    );
    install_and_activate(&current).await;

    assert_eq!(storage.keys(CONTENT).await.unwrap(), vec![url("a.js")]);

    let outcome = current.handle_fetch(&FetchRequest::get(url("b.js"))).await.unwrap();
    assert_eq!(outcome.source(), "network");
    assert_eq!(outcome.response().unwrap().body, b"b3".to_vec());
}

#[tokio::test]
async fn removed_and_lazily_cached_resources_do_not_survive() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher
        .serve(&url("a.js"), "a1")
        .serve(&url("old.js"), "o1")
        .serve(&url("img.png"), "p1");

    let first = generation(
        &[("a.js", "h1"), ("old.js", "h2"), ("img.png", "h3")],
        &["a.js"],
        storage.clone(),
        fetcher.clone(),
    );
    install_and_activate(&first).await;

    for key in ["old.js", "img.png"] {
        let outcome = first.handle_fetch(&FetchRequest::get(url(key))).await.unwrap();
        assert_eq!(outcome.source(), "network");
    }
    assert_eq!(storage.keys(CONTENT).await.unwrap().len(), 3);

    fetcher.serve(&url("img.png"), "p2");
    let second = generation(
        &[("a.js", "h1"), ("img.png", "h4")],
        &["a.js"],
        storage.clone(),
        fetcher.clone(),
    );
    install_and_activate(&second).await;

    let content = storage.keys(CONTENT).await.unwrap();
    assert_eq!(content, vec![url("a.js")]);
    assert!(body(storage.as_ref(), "old.js").await.is_none());

    let outcome = second.handle_fetch(&FetchRequest::get(url("img.png"))).await.unwrap();
    assert_eq!(outcome.response().unwrap().body, b"p2".to_vec());
}

#[tokio::test]
async fn download_offline_is_idempotent() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher
        .serve(&url(""), "<html>")
        .serve(&url("a.js"), "a1")
        .serve(&url("b.js"), "b1");

    let manager = generation(
        &[("/", "r1"), ("a.js", "h1"), ("b.js", "h2")],
        &["a.js"],
        storage.clone(),
        fetcher.clone(),
    );
    install_and_activate(&manager).await;

    let first = manager
        .handle_message(ControlMessage::DownloadOffline)
        .await
        .unwrap();
    match first {
        MessageOutcome::DownloadOffline(report) => {
            assert_eq!(report.fetched, 2);
            assert_eq!(report.already_cached, 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let requests = fetcher.requests().len();
    let second = manager
        .handle_message(ControlMessage::DownloadOffline)
        .await
        .unwrap();
    match second {
        MessageOutcome::DownloadOffline(report) => assert_eq!(report.fetched, 0),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(fetcher.requests().len(), requests);
    assert!(manager.status().await.unwrap().missing.is_empty());
}

#[tokio::test]
async fn cache_busting_query_hits_cached_copy() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.serve(&url("main.dart.js"), "js");

    let manager = generation(
        &[("main.dart.js", "h1")],
        &["main.dart.js"],
        storage.clone(),
        fetcher.clone(),
    );
    install_and_activate(&manager).await;

    let outcome = manager
        .handle_fetch(&FetchRequest::get(url("main.dart.js?v=3")))
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Cached(_)));
    assert_eq!(fetcher.request_count(&url("main.dart.js")), 1);
}

#[tokio::test]
async fn root_falls_back_to_cache_when_offline() {
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.serve(&url(""), "<html>v1");

    let manager = generation(&[("/", "r1")], &[], storage.clone(), fetcher.clone());
    install_and_activate(&manager).await;

    let online = manager.handle_fetch(&FetchRequest::get(url(""))).await.unwrap();
    assert!(matches!(online, FetchOutcome::Network(_)));

    fetcher.fail(&url("")).fail(&format!("{}/#/settings", ORIGIN));
    let offline = manager.handle_fetch(&FetchRequest::get(url(""))).await.unwrap();
    assert_eq!(offline.response().unwrap().body, b"<html>v1".to_vec());

    let hash_nav = manager
        .handle_fetch(&FetchRequest::get(format!("{}/#/settings", ORIGIN)))
        .await
        .unwrap();
    assert!(matches!(hash_nav, FetchOutcome::Cached(_)));
}

#[tokio::test]
async fn disk_stores_survive_across_processes() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.serve(&url("a.js"), "a1").serve(&url("b.js"), "b1");
    let entries = [("a.js", "h1"), ("b.js", "h2")];

    let first = generation(
        &entries,
        &["a.js"],
        Arc::new(DiskStorage::new(dir.path())),
        fetcher.clone(),
    );
    install_and_activate(&first).await;

    let reopened = generation(
        &entries,
        &["a.js"],
        Arc::new(DiskStorage::new(dir.path())),
        fetcher.clone(),
    );
    let status = reopened.status().await.unwrap();

    assert_eq!(status.stored_manifest, StoredManifest::Current);
    assert_eq!(status.backend, "disk");
    assert_eq!(status.content_entries, 1);
    assert_eq!(status.missing, vec!["b.js"]);

    let outcome = reopened.handle_fetch(&FetchRequest::get(url("a.js"))).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Cached(_)));
    assert_eq!(outcome.response().unwrap().body, b"a1".to_vec());
}
