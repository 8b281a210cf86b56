// # vpnroute-core
//
// Core library for reconciling routes on VPN servers.
//
// ## Architecture Overview
//
// The remote API only accepts route changes while the owning server is
// stopped. This library makes those changes safe:
// - **RouteStore**: Trait for the remote API (servers, routes, stop/start)
// - **ServerStateGuard**: Brackets each mutation with stop → mutate → start
// - **ConcurrencyGate**: Per-server reader/writer locks around every operation
// - **RouteReconciler**: Create, read, update, delete and import of routes
// - **RouteEngine**: Diffs desired routes against tracked state and applies them
// - **StoreRegistry**: Plugin-based registry for route and state stores
//
// ## Design Principles
//
// 1. **Restore what you stopped**: a server is restarted only if it was running
// 2. **Fail fast**: each guard phase reports its own error variant
// 3. **No shared cache**: every operation reads a fresh route list under its lock
// 4. **Library-First**: stores plug in through traits and factories

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod guard;
pub mod import_id;
pub mod lookup;
pub mod reconciler;
pub mod registry;
pub mod resource;
pub mod state;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{ReconcilerConfig, RouteStoreConfig, StateStoreConfig, VpnRouteConfig};
pub use engine::{ApplyOutcome, RouteEngine, SyncReport};
pub use error::{Error, Result};
pub use events::ReconcileEvent;
pub use gate::{ConcurrencyGate, GateScope};
pub use guard::ServerStateGuard;
pub use import_id::ImportId;
pub use lookup::{find_route, require_route};
pub use reconciler::RouteReconciler;
pub use registry::StoreRegistry;
pub use resource::{RouteChanges, RouteSpec, RouteState};
pub use state::{FileStateStore, MemoryStateStore};
pub use store::MemoryRouteStore;
pub use traits::{Route, RouteStore, Server, ServerStatus, StateStore};
