// # Memory Route Store
//
// In-process implementation of RouteStore.
//
// ## Purpose
//
// Behaves like the remote VPN server API without a network:
// - unknown servers are reported as `ServerNotFound`
// - route changes are rejected with `ServerOnline` while a server is running
// - a network can only be routed once per server
// - route identifiers are 24 hex digits, assigned on creation
// - `network` is immutable once the route exists
//
// ## When to Use
//
// - Tests and demos
// - Dry runs of a route configuration before pointing it at a real server

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::RouteStoreConfig;
use crate::traits::{Route, RoutePayload, RouteStore, RouteStoreFactory, Server, ServerStatus};

#[derive(Debug, Clone)]
struct ServerEntry {
    server: Server,
    routes: Vec<Route>,
}

/// In-memory route store
///
/// # Example
///
/// ```rust,no_run
/// use vpnroute_core::store::MemoryRouteStore;
/// use vpnroute_core::traits::{RouteStore, ServerStatus};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRouteStore::new();
///     store.add_server("60cd0be07723cf3c9114686c", ServerStatus::Online).await;
///
///     let server = store.get_server("60cd0be07723cf3c9114686c").await?;
///     assert!(server.is_online());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRouteStore {
    servers: Arc<RwLock<HashMap<String, ServerEntry>>>,
    next_id: Arc<AtomicU64>,
    id_prefix: u32,
}

impl MemoryRouteStore {
    /// Create an empty store with no servers
    pub fn new() -> Self {
        Self {
            servers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            id_prefix: chrono::Utc::now().timestamp() as u32,
        }
    }

    /// Register a server with the given status
    ///
    /// Re-adding an existing server resets its status and keeps its routes.
    pub async fn add_server(&self, server_id: &str, status: ServerStatus) {
        let mut servers = self.servers.write().await;
        servers
            .entry(server_id.to_string())
            .and_modify(|entry| entry.server.status = status)
            .or_insert_with(|| ServerEntry {
                server: Server::new(server_id, status),
                routes: Vec::new(),
            });
    }

    /// Current status of a server, if it exists
    pub async fn server_status(&self, server_id: &str) -> Option<ServerStatus> {
        let servers = self.servers.read().await;
        servers.get(server_id).map(|entry| entry.server.status)
    }

    /// Number of routes on a server (0 for unknown servers)
    pub async fn route_count(&self, server_id: &str) -> usize {
        let servers = self.servers.read().await;
        servers.get(server_id).map_or(0, |entry| entry.routes.len())
    }

    /// Remove a route behind the reconciler's back (simulates remote drift)
    pub async fn remove_route_out_of_band(&self, server_id: &str, route_id: &str) -> bool {
        let mut servers = self.servers.write().await;
        match servers.get_mut(server_id) {
            Some(entry) => {
                let before = entry.routes.len();
                entry.routes.retain(|route| route.id != route_id);
                entry.routes.len() != before
            }
            None => false,
        }
    }

    fn generate_id(&self) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{:08x}{:016x}", self.id_prefix, seq)
    }
}

impl Default for MemoryRouteStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Find a server that may be mutated
fn stopped_entry<'a>(
    servers: &'a mut HashMap<String, ServerEntry>,
    server_id: &str,
) -> Result<&'a mut ServerEntry, Error> {
    let entry = servers
        .get_mut(server_id)
        .ok_or_else(|| Error::ServerNotFound(server_id.to_string()))?;

    if entry.server.is_online() {
        return Err(Error::ServerOnline(server_id.to_string()));
    }
    Ok(entry)
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn get_server(&self, server_id: &str) -> Result<Server, Error> {
        let servers = self.servers.read().await;
        servers
            .get(server_id)
            .map(|entry| entry.server.clone())
            .ok_or_else(|| Error::ServerNotFound(server_id.to_string()))
    }

    async fn stop_server(&self, server_id: &str) -> Result<(), Error> {
        let mut servers = self.servers.write().await;
        let entry = servers
            .get_mut(server_id)
            .ok_or_else(|| Error::ServerNotFound(server_id.to_string()))?;
        entry.server.status = ServerStatus::Offline;
        Ok(())
    }

    async fn start_server(&self, server_id: &str) -> Result<(), Error> {
        let mut servers = self.servers.write().await;
        let entry = servers
            .get_mut(server_id)
            .ok_or_else(|| Error::ServerNotFound(server_id.to_string()))?;
        entry.server.status = ServerStatus::Online;
        Ok(())
    }

    async fn get_routes_by_server(&self, server_id: &str) -> Result<Vec<Route>, Error> {
        let servers = self.servers.read().await;
        servers
            .get(server_id)
            .map(|entry| entry.routes.clone())
            .ok_or_else(|| Error::ServerNotFound(server_id.to_string()))
    }

    async fn add_route_to_server(
        &self,
        server_id: &str,
        payload: &RoutePayload,
    ) -> Result<Route, Error> {
        let mut servers = self.servers.write().await;
        let entry = stopped_entry(&mut servers, server_id)?;

        if entry.routes.iter().any(|r| r.network == payload.network) {
            return Err(Error::route_store(format!(
                "Route for {} already exists on server {}",
                payload.network, server_id
            )));
        }

        let route = Route {
            id: self.generate_id(),
            server_id: server_id.to_string(),
            network: payload.network.clone(),
            comment: payload.comment.clone(),
            nat: payload.nat,
            net_gateway: payload.net_gateway,
        };
        entry.routes.push(route.clone());

        tracing::debug!("Added route {} ({}) to server {}", route.id, route.network, server_id);
        Ok(route)
    }

    async fn update_route_on_server(&self, server_id: &str, route: &Route) -> Result<(), Error> {
        let mut servers = self.servers.write().await;
        let entry = stopped_entry(&mut servers, server_id)?;

        let existing = entry
            .routes
            .iter_mut()
            .find(|r| r.id == route.id)
            .ok_or_else(|| Error::route_not_found(server_id, &route.id))?;

        if existing.network != route.network {
            return Err(Error::route_store(format!(
                "Route {} network cannot be changed from {} to {}",
                route.id, existing.network, route.network
            )));
        }

        existing.comment = route.comment.clone();
        existing.nat = route.nat;
        existing.net_gateway = route.net_gateway;
        Ok(())
    }

    async fn delete_route_from_server(&self, server_id: &str, route: &Route) -> Result<(), Error> {
        let mut servers = self.servers.write().await;
        let entry = stopped_entry(&mut servers, server_id)?;

        let before = entry.routes.len();
        entry.routes.retain(|r| r.id != route.id);
        if entry.routes.len() == before {
            return Err(Error::route_not_found(server_id, &route.id));
        }
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for the `memory` route store type
pub struct MemoryRouteStoreFactory;

impl RouteStoreFactory for MemoryRouteStoreFactory {
    fn create(&self, config: &RouteStoreConfig) -> Result<Arc<dyn RouteStore>, Error> {
        match config {
            RouteStoreConfig::Memory { servers } => {
                let store = MemoryRouteStore::new();
                {
                    // nothing else can hold the lock yet
                    let mut map = store
                        .servers
                        .try_write()
                        .map_err(|e| Error::route_store(e.to_string()))?;
                    for seed in servers {
                        map.insert(
                            seed.id.clone(),
                            ServerEntry {
                                server: Server::new(&seed.id, seed.status),
                                routes: Vec::new(),
                            },
                        );
                    }
                }
                Ok(Arc::new(store))
            }
            _ => Err(Error::config("Invalid config for memory route store")),
        }
    }
}
