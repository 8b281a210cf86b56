// # Route Store Trait
//
// Defines the interface to the remote VPN server API that owns routes.
//
// The remote API is imperative and stateful:
// - routes are only exposed as a full list per server, never by ID
// - routes can only be changed while the owning server is stopped
//
// ## Usage
//
// ```rust,ignore
// use vpnroute_core::RouteStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* RouteStore implementation */;
//
//     let server = store.get_server("60cd0be07723cf3c9114686c").await?;
//     let routes = store.get_routes_by_server(&server.id).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Running state of a VPN server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Server is running
    Online,
    /// Server is stopped
    #[default]
    Offline,
    /// Any status the core does not know about
    #[serde(other)]
    Unknown,
}

/// A VPN server as seen by the route core
///
/// Read-only: the core never changes server configuration, it only issues
/// stop/start commands around route mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Server identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Current running state
    #[serde(default)]
    pub status: ServerStatus,
}

impl Server {
    /// Create a server record
    pub fn new(id: impl Into<String>, status: ServerStatus) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            status,
        }
    }

    /// Whether the server is currently running
    pub fn is_online(&self) -> bool {
        self.status == ServerStatus::Online
    }
}

/// A routed network attached to one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Store-assigned identifier
    pub id: String,
    /// Owning server
    #[serde(rename = "server", default)]
    pub server_id: String,
    /// Network in CIDR notation
    pub network: String,
    /// Free-text comment
    #[serde(default)]
    pub comment: Option<String>,
    /// Source-NAT VPN traffic destined to this network
    #[serde(default = "default_nat")]
    pub nat: bool,
    /// Treat this network as the default gateway for VPN traffic
    #[serde(default)]
    pub net_gateway: bool,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            id: String::new(),
            server_id: String::new(),
            network: String::new(),
            comment: None,
            nat: default_nat(),
            net_gateway: false,
        }
    }
}

/// Body of an "add route" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePayload {
    /// Network in CIDR notation
    pub network: String,
    /// Free-text comment
    pub comment: Option<String>,
    /// Source-NAT VPN traffic destined to this network
    pub nat: bool,
    /// Requested gateway flag; the store has the final say
    pub net_gateway: bool,
}

fn default_nat() -> bool {
    true
}

/// Trait for route store implementations
///
/// A route store is the remote API surface. Implementations perform exactly
/// one remote call per method and return its outcome; ordering, locking and
/// the stop/start envelope are owned by the reconciler.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Errors
///
/// - `get_server` on an unknown server should return [`crate::Error::ServerNotFound`]
/// - mutations against a running server should return [`crate::Error::ServerOnline`]
/// - anything else is reported as [`crate::Error::RouteStore`]
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Fetch a server, including its current status
    async fn get_server(&self, server_id: &str) -> Result<Server, crate::Error>;

    /// Stop a server
    ///
    /// Stopping a server that is already stopped must succeed.
    async fn stop_server(&self, server_id: &str) -> Result<(), crate::Error>;

    /// Start a server
    async fn start_server(&self, server_id: &str) -> Result<(), crate::Error>;

    /// Fetch the full route list of a server
    ///
    /// No ordering is guaranteed.
    async fn get_routes_by_server(&self, server_id: &str) -> Result<Vec<Route>, crate::Error>;

    /// Add a route to a stopped server
    ///
    /// # Returns
    ///
    /// The created route, carrying the store-assigned `id` and the
    /// authoritative `net_gateway` value
    async fn add_route_to_server(
        &self,
        server_id: &str,
        payload: &RoutePayload,
    ) -> Result<Route, crate::Error>;

    /// Replace the mutable fields of an existing route on a stopped server
    async fn update_route_on_server(
        &self,
        server_id: &str,
        route: &Route,
    ) -> Result<(), crate::Error>;

    /// Remove a route from a stopped server
    async fn delete_route_from_server(
        &self,
        server_id: &str,
        route: &Route,
    ) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing route stores from configuration
pub trait RouteStoreFactory: Send + Sync {
    /// Create a RouteStore instance from configuration
    fn create(
        &self,
        config: &crate::config::RouteStoreConfig,
    ) -> Result<std::sync::Arc<dyn RouteStore>, crate::Error>;
}
