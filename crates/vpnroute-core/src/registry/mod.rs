//! Plugin-based store registry
//!
//! Route stores and state stores are looked up by the `type` tag of their
//! configuration, so a store backed by a real VPN server API can be added
//! without touching the engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vpnroute_core::registry::StoreRegistry;
//! use vpnroute_core::config::RouteStoreConfig;
//!
//! let registry = StoreRegistry::with_builtins();
//!
//! // A crate talking to a real server API registers itself:
//! registry.register_route_store("pritunl", Box::new(PritunlFactory));
//!
//! let config = RouteStoreConfig::Custom {
//!     factory: "pritunl".to_string(),
//!     config: serde_json::json!({"url": "https://vpn.example.com"}),
//! };
//! let store = registry.create_route_store(&config)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{RouteStoreConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::store::MemoryRouteStoreFactory;
use crate::traits::{RouteStore, RouteStoreFactory, StateStore, StateStoreFactory};

/// Registry of store factories keyed by type name
///
/// ## Thread Safety
///
/// Interior mutability through `RwLock`: registration takes `&self`, and
/// lookups can run concurrently.
#[derive(Default)]
pub struct StoreRegistry {
    /// Registered route store factories
    route_stores: RwLock<HashMap<String, Box<dyn RouteStoreFactory>>>,

    /// Registered state store factories
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

impl StoreRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the stores that ship with this crate
    ///
    /// - route stores: `memory`
    /// - state stores: `memory`, `file`
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_route_store("memory", Box::new(MemoryRouteStoreFactory));
        registry.register_state_store("memory", Box::new(MemoryStateStoreFactory));
        registry.register_state_store("file", Box::new(FileStateStoreFactory));
        registry
    }

    /// Register a route store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name, matched against [`RouteStoreConfig::type_name`]
    /// - `factory`: Factory object for creating store instances
    pub fn register_route_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RouteStoreFactory>,
    ) {
        let mut stores = self
            .route_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Register a state store factory
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        let mut stores = self
            .state_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create a route store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn RouteStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub fn create_route_store(&self, config: &RouteStoreConfig) -> Result<Arc<dyn RouteStore>> {
        let store_type = config.type_name();
        let stores = self
            .route_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown route store type: {}", store_type)))?;

        factory.create(config)
    }

    /// Create a state store from configuration
    pub async fn create_state_store(
        &self,
        config: &StateStoreConfig,
    ) -> Result<Box<dyn StateStore>> {
        let store_type = config.type_name();

        // the lock guard must not be held across the await below
        let factory = {
            let stores = self
                .state_stores
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?
        };

        factory.create(config).await
    }

    /// List all registered route store types
    pub fn list_route_stores(&self) -> Vec<String> {
        let stores = self
            .route_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        let stores = self
            .state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a route store type is registered
    pub fn has_route_store(&self, name: &str) -> bool {
        self.route_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        self.state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
