//! Minimal embedding example for vpnroute-core
//!
//! Drives the route engine against the in-memory route store: apply a
//! desired configuration, change it, import an unmanaged route, then detect
//! a route that was removed behind the engine's back.
//!
//! Set `VPNROUTE_LOG_LEVEL` (trace, debug, info, warn, error) to see the
//! guard cycle in the logs.

use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use vpnroute_core::store::MemoryRouteStore;
use vpnroute_core::{
    ImportId, MemoryStateStore, ReconcilerConfig, RouteEngine, RouteReconciler, RouteSpec,
    RouteStore, ServerStatus,
};

const SERVER_ID: &str = "60cd0be07723cf3c9114686c";

fn init_tracing() -> anyhow::Result<()> {
    let level = match std::env::var("VPNROUTE_LOG_LEVEL")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let store = MemoryRouteStore::new();
    store.add_server(SERVER_ID, ServerStatus::Online).await;

    let (reconciler, mut events) =
        RouteReconciler::new(Arc::new(store.clone()), &ReconcilerConfig::default())?;
    let engine = RouteEngine::new(reconciler, Box::new(MemoryStateStore::new()));

    let listener = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("[event] {:?}", event);
        }
    });

    // 1. apply desired routes
    let dns = RouteSpec::new(SERVER_ID, "1.1.1.1/32").with_comment("resolver");
    let office = RouteSpec::new(SERVER_ID, "10.10.0.0/16").with_comment("office LAN");
    for (name, spec) in [("dns", &dns), ("office", &office)] {
        let outcome = engine.apply(name, spec).await?;
        info!("{}: {:?}", name, outcome);
    }

    // 2. disable NAT on the office route; updated in place
    let outcome = engine.apply("office", &office.clone().with_nat(false)).await?;
    info!("office: {:?}", outcome);

    // 3. a route created outside the engine gets imported
    let unmanaged = engine
        .reconciler()
        .create(&RouteSpec::new(SERVER_ID, "192.168.50.0/24"))
        .await?;
    let import_id = ImportId::new(SERVER_ID, unmanaged.id.clone()).to_string();
    let state = engine.import("lab", &import_id).await?;
    info!("imported {} as 'lab' ({})", import_id, state.network);

    // 4. someone deletes the dns route on the server directly
    if let Some(tracked) = engine.tracked("dns").await? {
        store.remove_route_out_of_band(SERVER_ID, &tracked.id).await;
    }
    match engine.refresh("dns").await? {
        Some(state) => info!("dns still present: {:?}", state),
        None => info!("dns drifted and is no longer tracked"),
    }

    let server = store.get_server(SERVER_ID).await?;
    info!(
        "server {} is {:?} with {} routes",
        server.id,
        server.status,
        store.route_count(SERVER_ID).await
    );

    drop(engine);
    listener.await?;
    Ok(())
}
