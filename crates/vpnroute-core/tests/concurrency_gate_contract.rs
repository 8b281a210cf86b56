//! Contract Test: Concurrency Gate
//!
//! Constraints verified:
//! - Guard cycles on the same server never interleave
//! - Independent servers make progress in parallel under the per-server scope
//! - The global scope serializes every server
//! - Reads wait for an in-flight mutation on the same server
//! - No deadlock under concurrent load

mod common;

use common::*;
use std::time::Duration;
use tokio::time::timeout;
use vpnroute_core::traits::ServerStatus;
use vpnroute_core::{GateScope, ReconcilerConfig, RouteSpec};

const GUARD_CYCLE: [&str; 4] = ["get_server", "stop", "add", "start"];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_server_operations_are_totally_ordered() {
    let store = RecordingRouteStore::with_server(SERVER_ID, ServerStatus::Online).await;
    store.set_stop_delay(Duration::from_millis(10));
    let (reconciler, _rx) = reconciler(&store);

    let mut handles = Vec::new();
    for i in 0..8 {
        let reconciler = reconciler.clone();
        handles.push(tokio::spawn(async move {
            reconciler
                .create(&RouteSpec::new(SERVER_ID, format!("10.{}.0.0/16", i)))
                .await
        }));
    }

    timeout(Duration::from_secs(5), async {
        for handle in handles {
            handle.await.unwrap().expect("create succeeds");
        }
    })
    .await
    .expect("no deadlock");

    let log = store.log_for(SERVER_ID);
    assert_eq!(log.len(), 8 * GUARD_CYCLE.len());
    for cycle in log.chunks(GUARD_CYCLE.len()) {
        assert_eq!(cycle, GUARD_CYCLE, "guard cycles interleaved: {log:?}");
    }
    assert_eq!(store.inner().route_count(SERVER_ID).await, 8);
    assert_eq!(store.status(SERVER_ID).await, Some(ServerStatus::Online));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_servers_proceed_in_parallel() {
    let store = RecordingRouteStore::with_server(SERVER_ID, ServerStatus::Online).await;
    store.add_server(OTHER_SERVER_ID, ServerStatus::Online).await;
    store.set_stop_delay(Duration::from_millis(200));
    let (reconciler, _rx) = reconciler(&store);
    assert_eq!(reconciler.gate_scope(), GateScope::PerServer);

    let spec_a = RouteSpec::new(SERVER_ID, "10.1.0.0/16");
    let spec_b = RouteSpec::new(OTHER_SERVER_ID, "10.2.0.0/16");
    let a = reconciler.create(&spec_a);
    let b = reconciler.create(&spec_b);
    let (a, b) = timeout(Duration::from_secs(5), async { tokio::join!(a, b) })
        .await
        .expect("no deadlock");
    a.unwrap();
    b.unwrap();

    // both servers were read before either slow stop completed
    let log = store.log();
    let first_stop = log.iter().position(|e| e.starts_with("stop:")).unwrap();
    let reads_before_stop = log[..first_stop]
        .iter()
        .filter(|e| e.starts_with("get_server:"))
        .count();
    assert_eq!(reads_before_stop, 2, "servers were serialized: {log:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn global_scope_serializes_all_servers() {
    let store = RecordingRouteStore::with_server(SERVER_ID, ServerStatus::Online).await;
    store.add_server(OTHER_SERVER_ID, ServerStatus::Online).await;
    store.set_stop_delay(Duration::from_millis(50));
    let (reconciler, _rx) = reconciler_with(
        &store,
        ReconcilerConfig::default().with_gate_scope(GateScope::Global),
    );

    let spec_a = RouteSpec::new(SERVER_ID, "10.1.0.0/16");
    let spec_b = RouteSpec::new(OTHER_SERVER_ID, "10.2.0.0/16");
    let a = reconciler.create(&spec_a);
    let b = reconciler.create(&spec_b);
    let (a, b) = timeout(Duration::from_secs(5), async { tokio::join!(a, b) })
        .await
        .expect("no deadlock");
    a.unwrap();
    b.unwrap();

    let log: Vec<String> = store
        .log()
        .into_iter()
        .map(|e| e.split(':').next().unwrap_or_default().to_string())
        .collect();
    let mut expected = GUARD_CYCLE.to_vec();
    expected.extend(GUARD_CYCLE);
    assert_eq!(log, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn read_waits_for_in_flight_mutation() {
    let store = RecordingRouteStore::with_server(SERVER_ID, ServerStatus::Online).await;
    store.set_stop_delay(Duration::from_millis(200));
    let (reconciler, _rx) = reconciler(&store);

    let writer = reconciler.clone();
    let create = tokio::spawn(async move {
        writer
            .create(&RouteSpec::new(SERVER_ID, "10.1.0.0/16"))
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let routes = timeout(Duration::from_secs(5), reconciler.list(SERVER_ID))
        .await
        .expect("no deadlock")
        .unwrap();

    // the list fetch happened after the guard cycle completed
    assert_eq!(routes.len(), 1);
    create.await.unwrap().unwrap();
    assert_eq!(
        store.log_for(SERVER_ID),
        vec!["get_server", "stop", "add", "start", "list"]
    );
}
