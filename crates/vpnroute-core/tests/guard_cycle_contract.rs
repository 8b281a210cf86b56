//! Contract Test: Server State Guard
//!
//! Every route mutation runs inside a stop → mutate → start cycle.
//!
//! Constraints verified:
//! - A server that was online is online again after a successful change
//! - A server that was offline is never started
//! - A failed stop prevents the mutation (create, update and delete)
//! - A failed mutation leaves the server stopped and reports `MutationFailed`
//! - A failed start is reported, but the change stays in place and is readable

mod common;

use common::*;
use tokio::sync::mpsc::Receiver;
use vpnroute_core::traits::{Route, ServerStatus};
use vpnroute_core::{Error, ReconcileEvent, RouteChanges, RouteReconciler, RouteSpec};

#[tokio::test]
async fn online_server_is_restarted_after_create() {
    let store = RecordingRouteStore::with_server(SERVER_ID, ServerStatus::Online).await;
    let (reconciler, _rx) = reconciler(&store);

    let route = reconciler
        .create(&RouteSpec::new(SERVER_ID, "10.10.0.0/16"))
        .await
        .expect("create succeeds");

    assert_eq!(store.status(SERVER_ID).await, Some(ServerStatus::Online));
    assert_eq!(
        store.log_for(SERVER_ID),
        vec!["get_server", "stop", "add", "start"]
    );
    assert_eq!(route.server_id, SERVER_ID);
    assert!(!route.id.is_empty());
}

#[tokio::test]
async fn offline_server_is_left_offline() {
    let store = RecordingRouteStore::with_server(SERVER_ID, ServerStatus::Offline).await;
    let (reconciler, _rx) = reconciler(&store);

    let route = reconciler
        .create(&RouteSpec::new(SERVER_ID, "10.10.0.0/16"))
        .await
        .unwrap();
    reconciler
        .update(
            SERVER_ID,
            &route.id,
            &RouteChanges::new().with_comment(Some("office".to_string())),
        )
        .await
        .unwrap();
    reconciler.delete(SERVER_ID, &route.id).await.unwrap();

    assert_eq!(store.start_calls(), 0);
    assert_eq!(store.status(SERVER_ID).await, Some(ServerStatus::Offline));
}

const NETWORK: &str = "10.10.0.0/16";

/// The three guarded mutations
#[derive(Debug, Clone, Copy)]
enum Op {
    Create,
    Update,
    Delete,
}

const OPS: [Op; 3] = [Op::Create, Op::Update, Op::Delete];

/// Online server, plus the route an update or delete targets
async fn setup(
    op: Op,
) -> (
    RecordingRouteStore,
    RouteReconciler,
    Receiver<ReconcileEvent>,
    Option<Route>,
) {
    let store = RecordingRouteStore::with_server(SERVER_ID, ServerStatus::Online).await;
    let (reconciler, mut rx) = reconciler(&store);

    let seeded = match op {
        Op::Create => None,
        Op::Update | Op::Delete => Some(
            reconciler
                .create(&RouteSpec::new(SERVER_ID, NETWORK))
                .await
                .expect("seed route"),
        ),
    };
    drain(&mut rx);

    (store, reconciler, rx, seeded)
}

async fn run(reconciler: &RouteReconciler, op: Op, seeded: Option<&Route>) -> Result<(), Error> {
    match (op, seeded) {
        (Op::Create, _) => reconciler
            .create(&RouteSpec::new(SERVER_ID, NETWORK))
            .await
            .map(|_| ()),
        (Op::Update, Some(route)) => reconciler
            .update(SERVER_ID, &route.id, &RouteChanges::new().with_nat(false))
            .await
            .map(|_| ()),
        (Op::Delete, Some(route)) => reconciler.delete(SERVER_ID, &route.id).await,
        (op, None) => panic!("{op:?} needs a seeded route"),
    }
}

/// Remote state is exactly what it was before `op` was attempted
async fn assert_untouched(reconciler: &RouteReconciler, op: Op, seeded: Option<&Route>) {
    match seeded {
        None => {
            let routes = reconciler.list(SERVER_ID).await.unwrap();
            assert!(routes.is_empty(), "{op:?}: unexpected routes {routes:?}");
        }
        Some(route) => {
            let current = reconciler.read(SERVER_ID, &route.id).await.unwrap();
            assert_eq!(&current, route, "{op:?} changed the route");
        }
    }
}

/// Remote state reflects `op`
async fn assert_applied(reconciler: &RouteReconciler, op: Op, seeded: Option<&Route>) {
    match (op, seeded) {
        (Op::Create, _) => {
            let routes = reconciler.list(SERVER_ID).await.unwrap();
            assert!(routes.iter().any(|r| r.network == NETWORK), "{routes:?}");
        }
        (Op::Update, Some(route)) => {
            let current = reconciler.read(SERVER_ID, &route.id).await.unwrap();
            assert!(!current.nat);
        }
        (Op::Delete, Some(route)) => {
            let err = reconciler.read(SERVER_ID, &route.id).await.unwrap_err();
            assert!(matches!(err, Error::RouteNotFound { .. }), "got {err:?}");
        }
        (op, None) => panic!("{op:?} needs a seeded route"),
    }
}

fn is_route_change(event: &ReconcileEvent) -> bool {
    matches!(
        event,
        ReconcileEvent::RouteCreated { .. }
            | ReconcileEvent::RouteUpdated { .. }
            | ReconcileEvent::RouteDeleted { .. }
    )
}

#[tokio::test]
async fn stop_failure_prevents_mutation() {
    for op in OPS {
        let (store, reconciler, mut rx, seeded) = setup(op).await;
        let logged = store.log_for(SERVER_ID).len();
        let (mutations, starts) = (store.mutation_calls(), store.start_calls());
        store.fail_stop(true);

        let err = run(&reconciler, op, seeded.as_ref()).await.unwrap_err();
        store.fail_stop(false);

        assert!(matches!(err, Error::StopServer { .. }), "{op:?}: got {err:?}");
        assert!(err.to_string().starts_with("Error on stopping server"));
        assert_eq!(store.mutation_calls(), mutations, "{op:?} reached the store");
        assert_eq!(store.start_calls(), starts, "{op:?} started the server");
        let expected: &[&str] = match op {
            Op::Create => &["get_server", "stop"],
            Op::Update | Op::Delete => &["list", "get_server", "stop"],
        };
        assert_eq!(&store.log_for(SERVER_ID)[logged..], expected, "{op:?}");
        assert!(!drain(&mut rx).iter().any(is_route_change));
        assert_untouched(&reconciler, op, seeded.as_ref()).await;
    }
}

#[tokio::test]
async fn mutation_failure_leaves_server_stopped() {
    for op in OPS {
        let (store, reconciler, mut rx, seeded) = setup(op).await;
        let starts = store.start_calls();
        store.fail_mutation(true);

        let err = run(&reconciler, op, seeded.as_ref()).await.unwrap_err();
        store.fail_mutation(false);

        match &err {
            Error::MutationFailed {
                server_id,
                was_online,
                ..
            } => {
                assert_eq!(server_id, SERVER_ID);
                assert!(*was_online);
            }
            other => panic!("{op:?}: expected MutationFailed, got {other:?}"),
        }
        assert!(err.needs_restart());
        assert!(!err.mutation_applied());
        assert_eq!(store.start_calls(), starts, "{op:?} started the server");
        assert_eq!(store.status(SERVER_ID).await, Some(ServerStatus::Offline));

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            ReconcileEvent::ServerLeftStopped { was_online: true, .. }
        )));
        assert!(!events.iter().any(is_route_change));
        assert_untouched(&reconciler, op, seeded.as_ref()).await;
    }
}

#[tokio::test]
async fn start_failure_keeps_the_change() {
    for op in OPS {
        let (store, reconciler, _rx, seeded) = setup(op).await;
        store.fail_start(true);

        let err = run(&reconciler, op, seeded.as_ref()).await.unwrap_err();
        store.fail_start(false);

        assert!(matches!(err, Error::StartServer { .. }), "{op:?}: got {err:?}");
        assert!(err.to_string().starts_with("Error on starting server"));
        assert!(err.mutation_applied());
        assert_eq!(store.status(SERVER_ID).await, Some(ServerStatus::Offline));
        assert_applied(&reconciler, op, seeded.as_ref()).await;
    }
}

#[tokio::test]
async fn update_and_delete_of_missing_route_never_stop_the_server() {
    let store = RecordingRouteStore::with_server(SERVER_ID, ServerStatus::Online).await;
    let (reconciler, _rx) = reconciler(&store);

    let err = reconciler
        .update(SERVER_ID, "ghost", &RouteChanges::new().with_nat(false))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RouteNotFound { .. }));

    let err = reconciler.delete(SERVER_ID, "ghost").await.unwrap_err();
    assert!(matches!(err, Error::RouteNotFound { .. }));

    assert_eq!(store.stop_calls(), 0);
    assert_eq!(store.status(SERVER_ID).await, Some(ServerStatus::Online));
}

#[tokio::test]
async fn unknown_server_fails_before_stop() {
    let store = RecordingRouteStore::new();
    let (reconciler, _rx) = reconciler(&store);

    let err = reconciler
        .create(&RouteSpec::new(SERVER_ID, "10.10.0.0/16"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ServerNotFound(_)), "got {err:?}");
    assert_eq!(store.stop_calls(), 0);
}
