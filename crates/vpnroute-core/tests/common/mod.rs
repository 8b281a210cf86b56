//! Test doubles and common utilities for contract tests
//!
//! `RecordingRouteStore` wraps the in-memory route store, counts every call,
//! records the order of calls in a shared log and can be told to fail a
//! specific phase of the stop/mutate/start cycle.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vpnroute_core::error::{Error, Result};
use vpnroute_core::store::MemoryRouteStore;
use vpnroute_core::traits::{Route, RoutePayload, RouteStore, Server, ServerStatus};
use vpnroute_core::{ReconcileEvent, ReconcilerConfig, RouteReconciler};

pub const SERVER_ID: &str = "60cd0be07723cf3c9114686c";
pub const OTHER_SERVER_ID: &str = "60cd0be07723cf3c9114686d";

#[derive(Default)]
struct Counters {
    get_server: AtomicUsize,
    stop: AtomicUsize,
    start: AtomicUsize,
    list: AtomicUsize,
    add: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    stop: AtomicBool,
    start: AtomicBool,
    mutation: AtomicBool,
}

/// Route store that records calls and injects failures
#[derive(Clone)]
pub struct RecordingRouteStore {
    inner: MemoryRouteStore,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
    log: Arc<Mutex<Vec<String>>>,
    stop_delay_ms: Arc<AtomicU64>,
}

impl RecordingRouteStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRouteStore::new(),
            counters: Arc::new(Counters::default()),
            faults: Arc::new(Faults::default()),
            log: Arc::new(Mutex::new(Vec::new())),
            stop_delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Store with one server in the given status
    pub async fn with_server(server_id: &str, status: ServerStatus) -> Self {
        let store = Self::new();
        store.inner.add_server(server_id, status).await;
        store
    }

    pub fn inner(&self) -> &MemoryRouteStore {
        &self.inner
    }

    pub async fn add_server(&self, server_id: &str, status: ServerStatus) {
        self.inner.add_server(server_id, status).await;
    }

    pub async fn status(&self, server_id: &str) -> Option<ServerStatus> {
        self.inner.server_status(server_id).await
    }

    pub fn fail_stop(&self, fail: bool) {
        self.faults.stop.store(fail, Ordering::SeqCst);
    }

    pub fn fail_start(&self, fail: bool) {
        self.faults.start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mutation(&self, fail: bool) {
        self.faults.mutation.store(fail, Ordering::SeqCst);
    }

    /// Make every stop call sleep before completing
    pub fn set_stop_delay(&self, delay: Duration) {
        self.stop_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn stop_calls(&self) -> usize {
        self.counters.stop.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.counters.start.load(Ordering::SeqCst)
    }

    /// add + update + delete calls
    pub fn mutation_calls(&self) -> usize {
        self.counters.add.load(Ordering::SeqCst)
            + self.counters.update.load(Ordering::SeqCst)
            + self.counters.delete.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.counters.list.load(Ordering::SeqCst)
    }

    /// Calls in the order they completed, as `<op>:<server_id>`
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Calls against one server, as `<op>`
    pub fn log_for(&self, server_id: &str) -> Vec<String> {
        let suffix = format!(":{}", server_id);
        self.log()
            .into_iter()
            .filter_map(|entry| entry.strip_suffix(&suffix).map(str::to_string))
            .collect()
    }

    fn record(&self, op: &str, server_id: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", op, server_id));
    }

    fn injected(&self, flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::route_store(format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RouteStore for RecordingRouteStore {
    async fn get_server(&self, server_id: &str) -> Result<Server> {
        self.counters.get_server.fetch_add(1, Ordering::SeqCst);
        self.record("get_server", server_id);
        self.inner.get_server(server_id).await
    }

    async fn stop_server(&self, server_id: &str) -> Result<()> {
        self.counters.stop.fetch_add(1, Ordering::SeqCst);
        let delay = self.stop_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.record("stop", server_id);
        self.injected(&self.faults.stop, "stop")?;
        self.inner.stop_server(server_id).await
    }

    async fn start_server(&self, server_id: &str) -> Result<()> {
        self.counters.start.fetch_add(1, Ordering::SeqCst);
        self.record("start", server_id);
        self.injected(&self.faults.start, "start")?;
        self.inner.start_server(server_id).await
    }

    async fn get_routes_by_server(&self, server_id: &str) -> Result<Vec<Route>> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        self.record("list", server_id);
        self.inner.get_routes_by_server(server_id).await
    }

    async fn add_route_to_server(&self, server_id: &str, payload: &RoutePayload) -> Result<Route> {
        self.counters.add.fetch_add(1, Ordering::SeqCst);
        self.record("add", server_id);
        self.injected(&self.faults.mutation, "add")?;
        self.inner.add_route_to_server(server_id, payload).await
    }

    async fn update_route_on_server(&self, server_id: &str, route: &Route) -> Result<()> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        self.record("update", server_id);
        self.injected(&self.faults.mutation, "update")?;
        self.inner.update_route_on_server(server_id, route).await
    }

    async fn delete_route_from_server(&self, server_id: &str, route: &Route) -> Result<()> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        self.record("delete", server_id);
        self.injected(&self.faults.mutation, "delete")?;
        self.inner.delete_route_from_server(server_id, route).await
    }

    fn store_name(&self) -> &'static str {
        "recording"
    }
}

/// Reconciler over a recording store with default configuration
pub fn reconciler(
    store: &RecordingRouteStore,
) -> (RouteReconciler, tokio::sync::mpsc::Receiver<ReconcileEvent>) {
    reconciler_with(store, ReconcilerConfig::default())
}

pub fn reconciler_with(
    store: &RecordingRouteStore,
    config: ReconcilerConfig,
) -> (RouteReconciler, tokio::sync::mpsc::Receiver<ReconcileEvent>) {
    RouteReconciler::new(Arc::new(store.clone()), &config).expect("valid reconciler config")
}

/// Drain every event currently buffered on the channel
pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
