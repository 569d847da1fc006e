//! Fan-out to subscribers

use std::sync::Arc;
use std::time::Duration;

use server_monitor::{ServerMonitor, ServerOptions, ServerType, TryRecvError};

use crate::mock::MockServer;
use crate::{init_tracing, run_for};

#[tokio::test(start_paused = true)]
async fn test_latest_wins_for_idle_subscriber() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();
    let (mut sub, _unsub) = monitor.subscribe().unwrap();

    // Never read while five heartbeats are published
    run_for(4).await;
    assert_eq!(server.probes(), 5);

    let pending = sub.try_recv().unwrap();
    assert_eq!(pending.set_version, Some(5));
    assert!(Arc::ptr_eq(&pending, &monitor.description()));
    assert_eq!(sub.try_recv().unwrap_err(), TryRecvError::Empty);

    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_every_subscriber_gets_each_update() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();
    let (mut a, _ua) = monitor.subscribe().unwrap();
    let (mut b, _ub) = monitor.subscribe().unwrap();

    // Seeded with the unknown description
    assert_eq!(a.recv().await.unwrap().server_type, ServerType::Unknown);
    assert_eq!(b.recv().await.unwrap().server_type, ServerType::Unknown);

    for expected in 1..=3u32 {
        let from_a = a.recv().await.unwrap();
        let from_b = b.recv().await.unwrap();
        assert_eq!(from_a.set_version, Some(expected));
        assert!(Arc::ptr_eq(&from_a, &from_b));
    }

    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_leaves_others_running() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();
    let (mut gone, unsub) = monitor.subscribe().unwrap();
    let (mut stays, _keep) = monitor.subscribe().unwrap();
    run_for(1).await;

    unsub.unsubscribe();
    unsub.unsubscribe();
    assert_eq!(monitor.subscriber_count(), 1);
    assert!(gone.is_closed());

    run_for(1).await;
    while gone.try_recv().is_ok() {}
    assert!(gone.recv().await.is_none());

    let latest = stays.recv().await.unwrap();
    assert!(Arc::ptr_eq(&latest, &monitor.description()));

    monitor.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_subscribers_under_load() {
    init_tracing();
    let server = MockServer::primary();
    let options = ServerOptions::new("db1.example.com:27017")
        .with_heartbeat_interval(Duration::from_millis(10));
    let monitor = Arc::new(ServerMonitor::start(options, server.dialer()).unwrap());

    let mut workers = Vec::new();
    for _ in 0..8 {
        let monitor = monitor.clone();
        workers.push(tokio::spawn(async move {
            for _ in 0..20 {
                let (mut sub, unsub) = monitor.subscribe().unwrap();
                let first = sub.try_recv().unwrap();
                assert_eq!(first.endpoint.as_str(), "db1.example.com:27017");
                tokio::time::sleep(Duration::from_millis(3)).await;
                unsub.unsubscribe();
                assert!(sub.is_closed());
            }
        }));
    }

    let (mut survivor, _keep) = monitor.subscribe().unwrap();
    for worker in workers {
        worker.await.unwrap();
    }
    assert_eq!(monitor.subscriber_count(), 1);

    monitor.stop().await;
    while survivor.try_recv().is_ok() {}
    assert!(survivor.recv().await.is_none());
    assert_eq!(monitor.subscriber_count(), 0);
}
