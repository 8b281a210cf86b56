//! Route reconciler
//!
//! The RouteReconciler is responsible for:
//! - Serializing operations per server through the [`ConcurrencyGate`]
//! - Fetching the current route list and locating the target route
//! - Wrapping every mutation in a [`ServerStateGuard`] cycle
//!
//! ## Operation Flow
//!
//! ```text
//!            ┌────────────────┐
//! request ──►│ ConcurrencyGate│  exclusive: create/update/delete/import
//!            └───────┬────────┘  shared:    read
//!                    ▼
//!            ┌────────────────┐
//!            │ RouteStore     │  get_routes_by_server + find_route
//!            └───────┬────────┘
//!                    ▼
//!            ┌────────────────┐
//!            │ServerStateGuard│  stop → add/update/delete → start?
//!            └───────┬────────┘
//!                    ▼
//!              gate released
//! ```
//!
//! No caching: every operation fetches a fresh route list for its server
//! while holding the gate, so the list cannot go stale before the mutation.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::events::{EventEmitter, ReconcileEvent};
use crate::gate::{ConcurrencyGate, GateScope};
use crate::guard::ServerStateGuard;
use crate::import_id::ImportId;
use crate::lookup::require_route;
use crate::resource::{RouteChanges, RouteSpec};
use crate::traits::{Route, RouteStore};

/// Create/read/update/delete/import of routes against a [`RouteStore`]
///
/// Cloning is cheap; clones share the gate, so a reconciler can be handed to
/// any number of tasks.
#[derive(Clone)]
pub struct RouteReconciler {
    /// Remote route store
    store: Arc<dyn RouteStore>,

    /// Per-server (or global) reader/writer gate
    gate: Arc<ConcurrencyGate>,

    /// Stop/start envelope for mutations
    guard: ServerStateGuard,

    /// Event publisher for external monitoring
    events: EventEmitter,
}

impl RouteReconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `store`: Route store implementation
    /// - `config`: Reconciler configuration
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// reconciliation events
    pub fn new(
        store: Arc<dyn RouteStore>,
        config: &ReconcilerConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (events, rx) = EventEmitter::channel(config.event_channel_capacity);
        let guard = ServerStateGuard::new(Arc::clone(&store), events.clone());

        let reconciler = Self {
            store,
            gate: Arc::new(ConcurrencyGate::new(config.gate_scope)),
            guard,
            events,
        };

        Ok((reconciler, rx))
    }

    /// Lock granularity in use
    pub fn gate_scope(&self) -> GateScope {
        self.gate.scope()
    }

    /// Add a route to its server
    ///
    /// `spec` is validated before any remote call. The returned route
    /// carries the store-assigned identifier and the store's `net_gateway`.
    pub async fn create(&self, spec: &RouteSpec) -> Result<Route> {
        spec.validate()?;

        let server_id = spec.server_id.as_str();
        let _gate = self.gate.exclusive(server_id).await;

        info!(
            "Creating route {} on server {} [store: {}]",
            spec.network,
            server_id,
            self.store.store_name()
        );

        let store = &self.store;
        let payload = &spec.payload();
        let mut route = self
            .guard
            .run(server_id, move || async move {
                store.add_route_to_server(server_id, payload).await
            })
            .await?;

        if route.server_id.is_empty() {
            route.server_id = server_id.to_string();
        }

        info!("Created route {} ({}) on server {}", route.id, route.network, server_id);
        self.events.emit(ReconcileEvent::RouteCreated {
            server_id: server_id.to_string(),
            route_id: route.id.clone(),
        });

        Ok(route)
    }

    /// Read a route's current remote state
    ///
    /// Fails with [`crate::Error::RouteNotFound`] when the route no longer
    /// exists on the server, which callers should treat as remote drift.
    pub async fn read(&self, server_id: &str, route_id: &str) -> Result<Route> {
        let _gate = self.gate.shared(server_id).await;

        let routes = self.store.get_routes_by_server(server_id).await?;
        let mut route = require_route(server_id, route_id, &routes)?.clone();
        if route.server_id.is_empty() {
            route.server_id = server_id.to_string();
        }

        debug!("Read route {} ({}) on server {}", route.id, route.network, server_id);
        Ok(route)
    }

    /// Fetch every route on a server
    pub async fn list(&self, server_id: &str) -> Result<Vec<Route>> {
        let _gate = self.gate.shared(server_id).await;

        let mut routes = self.store.get_routes_by_server(server_id).await?;
        for route in routes.iter_mut().filter(|r| r.server_id.is_empty()) {
            route.server_id = server_id.to_string();
        }
        Ok(routes)
    }

    /// Apply `changes` to an existing route
    ///
    /// Only the fields marked in `changes` are touched; `network` and the
    /// owning server cannot change in place. An empty change set returns the
    /// current route without stopping the server.
    pub async fn update(
        &self,
        server_id: &str,
        route_id: &str,
        changes: &RouteChanges,
    ) -> Result<Route> {
        let _gate = self.gate.exclusive(server_id).await;

        let routes = self.store.get_routes_by_server(server_id).await?;
        let mut route = require_route(server_id, route_id, &routes)?.clone();
        if route.server_id.is_empty() {
            route.server_id = server_id.to_string();
        }

        if changes.is_empty() {
            debug!("No changes for route {} on server {}, skipping", route_id, server_id);
            return Ok(route);
        }

        changes.apply_to(&mut route);
        info!("Updating route {} ({}) on server {}", route.id, route.network, server_id);

        let store = &self.store;
        let target = &route;
        self.guard
            .run(server_id, move || async move {
                store.update_route_on_server(server_id, target).await
            })
            .await?;

        self.events.emit(ReconcileEvent::RouteUpdated {
            server_id: server_id.to_string(),
            route_id: route.id.clone(),
        });

        Ok(route)
    }

    /// Remove a route from its server
    pub async fn delete(&self, server_id: &str, route_id: &str) -> Result<()> {
        let _gate = self.gate.exclusive(server_id).await;

        let routes = self.store.get_routes_by_server(server_id).await?;
        let route = require_route(server_id, route_id, &routes)?;

        info!("Deleting route {} ({}) from server {}", route.id, route.network, server_id);

        let store = &self.store;
        self.guard
            .run(server_id, move || async move {
                store.delete_route_from_server(server_id, route).await
            })
            .await?;

        self.events.emit(ReconcileEvent::RouteDeleted {
            server_id: server_id.to_string(),
            route_id: route_id.to_string(),
        });

        Ok(())
    }

    /// Bring an existing route under management
    ///
    /// `composite_id` has the form `<serverId>-<routeId>`. The route must
    /// exist on the server.
    pub async fn import(&self, composite_id: &str) -> Result<Route> {
        let id: ImportId = composite_id.parse()?;
        let _gate = self.gate.exclusive(&id.server_id).await;

        let routes = self.store.get_routes_by_server(&id.server_id).await?;
        let mut route = require_route(&id.server_id, &id.route_id, &routes)?.clone();
        route.server_id = id.server_id.clone();

        info!("Imported route {} ({}) from server {}", route.id, route.network, id.server_id);
        self.events.emit(ReconcileEvent::RouteImported {
            server_id: id.server_id,
            route_id: id.route_id,
        });

        Ok(route)
    }

    /// Drop per-server locks that no operation holds or waits on
    pub fn prune_idle_locks(&self) -> usize {
        self.gate.prune_idle()
    }

    pub(crate) fn events(&self) -> &EventEmitter {
        &self.events
    }
}
