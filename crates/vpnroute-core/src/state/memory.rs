// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Crash Behavior
//
// - All tracked routes are forgotten on restart
// - The next apply treats every desired route as new and creates it again;
//   the route store then rejects duplicate networks on the same server
//
// ## When to Use
//
// - Tests
// - One-shot runs that import routes before applying

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::resource::RouteState;
use crate::traits::{StateStore, StateStoreFactory};

/// In-memory state store
///
/// # Example
///
/// ```rust,no_run
/// use vpnroute_core::state::MemoryStateStore;
/// use vpnroute_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     assert!(store.get_route("office").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, RouteState>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked routes
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if nothing is tracked
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_route(&self, name: &str) -> Result<Option<RouteState>, Error> {
        Ok(self.inner.read().await.get(name).cloned())
    }

    async fn set_route(&self, name: &str, state: &RouteState) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(name.to_string(), state.clone());
        Ok(())
    }

    async fn delete_route(&self, name: &str) -> Result<(), Error> {
        self.inner.write().await.remove(name);
        Ok(())
    }

    async fn list_routes(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for the `memory` state store type
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::Memory => Ok(Box::new(MemoryStateStore::new())),
            _ => Err(Error::config("Invalid config for memory state store")),
        }
    }
}
