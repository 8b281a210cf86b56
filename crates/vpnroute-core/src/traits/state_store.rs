// # State Store Trait
//
// Defines the interface for local tracking of managed routes.
//
// ## Purpose
//
// The state store remembers, per resource name, the last known shape of a
// route: `{id, network, comment, nat, net_gateway, server_id}`. The engine
// diffs desired configuration against it and re-reads every field from the
// route store on refresh to detect drift.
//
// ## Usage
//
// ```rust,ignore
// use vpnroute_core::StateStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* StateStore implementation */;
//
//     if let Some(state) = store.get_route("office").await? {
//         println!("tracking {} on {}", state.id, state.server_id);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::resource::RouteState;

/// Trait for state store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// ## Implementation Guidelines
///
/// - **Async I/O only**: Use async file/database operations, never blocking I/O
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **No business logic**: deciding what to create, update or delete is owned
///   by `RouteEngine`
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the tracked state for a resource
    ///
    /// # Returns
    ///
    /// - `Ok(Some(RouteState))`: The tracked route
    /// - `Ok(None)`: Nothing tracked under this name
    /// - `Err(Error)`: Storage error
    async fn get_route(&self, name: &str) -> Result<Option<RouteState>, crate::Error>;

    /// Create or replace the tracked state for a resource
    async fn set_route(&self, name: &str, state: &RouteState) -> Result<(), crate::Error>;

    /// Stop tracking a resource
    ///
    /// Deleting a name that is not tracked succeeds.
    async fn delete_route(&self, name: &str) -> Result<(), crate::Error>;

    /// List all tracked resource names
    async fn list_routes(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StateStoreConfig,
    ) -> Result<Box<dyn StateStore>, crate::Error>;
}
