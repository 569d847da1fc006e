//! Start/subscribe/stop lifecycle

use std::sync::Arc;
use std::time::Duration;

use server_monitor::{MonitorError, ServerMonitor, ServerOptions, ServerType, TryRecvError};

use crate::mock::MockServer;
use crate::{init_tracing, run_for};

#[tokio::test]
async fn test_start_rejects_invalid_configuration() {
    init_tracing();
    let server = MockServer::primary();

    let result = ServerMonitor::start(ServerOptions::new("db1:notaport"), server.dialer());
    assert!(matches!(result, Err(MonitorError::Configuration(_))));

    // No task was started, so nothing was dialed
    tokio::task::yield_now().await;
    assert_eq!(server.dials(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_seed_on_subscribe() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();
    run_for(2).await;

    let current = monitor.description();
    let (mut sub, _unsub) = monitor.subscribe().unwrap();

    // Value is there immediately, before any further tick
    let seeded = sub.try_recv().unwrap();
    assert!(Arc::ptr_eq(&seeded, &current));
    assert_eq!(sub.try_recv().unwrap_err(), TryRecvError::Empty);

    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_post_stop_rejection() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();
    run_for(1).await;

    monitor.stop().await;

    assert!(monitor.is_stopped());
    assert!(matches!(monitor.subscribe(), Err(MonitorError::Stopped)));
    assert_eq!(monitor.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_all_subscriptions() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();

    let mut subs = Vec::new();
    for _ in 0..3 {
        subs.push(monitor.subscribe().unwrap());
    }
    assert_eq!(monitor.subscriber_count(), 3);
    run_for(1).await;

    monitor.stop().await;
    assert_eq!(monitor.subscriber_count(), 0);

    for (sub, unsub) in subs.iter_mut() {
        assert!(sub.is_closed());
        // Drain whatever was pending, then the closed signal
        while sub.try_recv().is_ok() {}
        assert_eq!(sub.try_recv().unwrap_err(), TryRecvError::Closed);
        assert!(sub.recv().await.is_none());
        // Unsubscribing after shutdown is harmless
        unsub.unsubscribe();
    }

    // Heartbeat connection is released on shutdown
    assert_eq!(server.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_heartbeats() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();
    run_for(2).await;
    assert_eq!(server.probes(), 3);

    monitor.stop().await;
    run_for(5).await;
    assert_eq!(server.probes(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_the_loop() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();
    run_for(1).await;
    let probes = server.probes();

    drop(monitor);
    run_for(3).await;
    assert_eq!(server.probes(), probes);
}

#[tokio::test(start_paused = true)]
async fn test_interval_is_measured_from_heartbeat_completion() {
    init_tracing();
    let server = MockServer::primary();
    let monitor = server.monitor();

    // Heartbeats at 0s, 1s, 2s, 3s
    run_for(3).await;
    assert_eq!(server.probes(), 4);
    assert_eq!(monitor.description().set_version, Some(4));
    assert_eq!(monitor.description().server_type, ServerType::RsPrimary);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(server.probes(), 4);

    monitor.stop().await;
}
