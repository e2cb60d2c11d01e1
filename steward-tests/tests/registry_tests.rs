//! Registry behaviour under concurrent use

use std::time::Duration;

use steward_daemon::events::EventType;
use steward_tests::TestRegistryHarness;
use steward_tests::helpers::registry_harness::HARNESS_EVENT_CAPACITY;
use steward_tests::helpers::wait_utils::collect_events;
use tokio::time::timeout;

/// Concurrent attaches from many clones are all recorded exactly once
#[tokio::test]
async fn test_concurrent_attach() {
    let mut harness = TestRegistryHarness::new(&[]).unwrap();
    let mut events = harness.take_events();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let registry = harness.registry.clone();
        tasks.push(tokio::spawn(async move {
            registry.attach(&format!("svc-{}", i)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut services = harness.registry.services().await;
    services.sort();
    assert_eq!(services.len(), 20);
    services.dedup();
    assert_eq!(services.len(), 20);
    assert_eq!(harness.persisted().services.len(), 20);

    let created = collect_events(&mut events, Duration::from_millis(100)).await;
    assert_eq!(created.len(), 20);
    assert!(created.iter().all(|(t, _)| *t == EventType::Created));
}

/// Only one of two racing attaches of the same name wins
#[tokio::test]
async fn test_racing_duplicate_attach() {
    let harness = TestRegistryHarness::new(&[]).unwrap();
    let a = harness.registry.clone();
    let b = harness.registry.clone();

    let (ra, rb) = tokio::join!(a.attach("web"), b.attach("web"));
    assert!(ra.is_ok() ^ rb.is_ok());
    assert_eq!(harness.registry.services().await, vec!["web"]);
}

/// A slow service manager call does not hold the registry lock
#[tokio::test(start_paused = true)]
async fn test_slow_control_does_not_block_reads() {
    let harness = TestRegistryHarness::new(&["web"]).unwrap();
    harness.manager.set_delay(Duration::from_secs(30));

    let registry = harness.registry.clone();
    let slow = tokio::spawn(async move { registry.run("web").await });
    tokio::task::yield_now().await;

    let services = timeout(Duration::from_secs(1), harness.registry.services())
        .await
        .expect("read blocked by control operation");
    assert_eq!(services, vec!["web"]);

    slow.await.unwrap().unwrap();
}

/// With nobody draining the stream, emitters wait for space but readers do not
#[tokio::test(start_paused = true)]
async fn test_full_event_channel_blocks_only_emitters() {
    let mut harness = TestRegistryHarness::new(&["web"]).unwrap();
    let mut events = harness.take_events();

    // Fill the raw channel
    for _ in 0..HARNESS_EVENT_CAPACITY {
        harness.registry.restart("web").await.unwrap();
    }

    let registry = harness.registry.clone();
    let blocked = tokio::spawn(async move { registry.stop("web").await });
    tokio::task::yield_now().await;
    assert!(!blocked.is_finished());

    assert_eq!(harness.registry.services().await, vec!["web"]);
    harness.registry.group("ops").await.unwrap();

    events.recv().await.unwrap();
    blocked.await.unwrap().unwrap();
}

/// Group membership stays consistent while services come and go
#[tokio::test]
async fn test_membership_follows_tracking() {
    let harness = TestRegistryHarness::new(&["web", "db", "cache"]).unwrap();
    for service in ["web", "db", "cache"] {
        harness.registry.join("all", service).await.unwrap();
    }
    harness.registry.forget("db").await.unwrap();
    harness.registry.attach("db").await.unwrap();

    assert_eq!(harness.registry.members("all").await, vec!["web", "cache"]);
    assert!(harness.registry.join("all", "queue").await.is_err());
}
