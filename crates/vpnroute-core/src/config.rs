//! Configuration types for route reconciliation
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::gate::GateScope;
use crate::resource::RouteSpec;
use crate::traits::ServerStatus;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpnRouteConfig {
    /// Remote route store configuration
    pub route_store: RouteStoreConfig,

    /// Local state tracking configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Desired routes, keyed by resource name
    #[serde(default)]
    pub routes: BTreeMap<String, RouteSpec>,
}

impl VpnRouteConfig {
    /// Create a configuration for the given route store with defaults elsewhere
    pub fn new(route_store: RouteStoreConfig) -> Self {
        Self {
            route_store,
            state_store: StateStoreConfig::default(),
            reconciler: ReconcilerConfig::default(),
            routes: BTreeMap::new(),
        }
    }

    /// Add a desired route
    pub fn with_route(mut self, name: impl Into<String>, spec: RouteSpec) -> Self {
        self.routes.insert(name.into(), spec);
        self
    }

    /// Load a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.route_store.validate()?;
        self.state_store.validate()?;
        self.reconciler.validate()?;

        for (name, spec) in &self.routes {
            if name.trim().is_empty() {
                return Err(crate::Error::config("Route names cannot be empty"));
            }
            spec.validate().map_err(|e| {
                crate::Error::config(format!("Route '{}' is invalid: {}", name, e))
            })?;
        }

        Ok(())
    }
}

/// Route store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteStoreConfig {
    /// In-process route store
    Memory {
        /// Servers that exist at startup
        #[serde(default)]
        servers: Vec<ServerSeed>,
    },

    /// Route store provided by an externally registered factory
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RouteStoreConfig {
    /// Validate the route store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RouteStoreConfig::Memory { servers } => {
                if servers.iter().any(|s| s.id.is_empty()) {
                    return Err(crate::Error::config("Memory route store server IDs cannot be empty"));
                }
                Ok(())
            }
            RouteStoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom route store factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom route store config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the route store type name
    pub fn type_name(&self) -> &str {
        match self {
            RouteStoreConfig::Memory { .. } => "memory",
            RouteStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// A server known to the in-memory route store at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSeed {
    /// Server identifier
    pub id: String,
    /// Initial status
    #[serde(default)]
    pub status: ServerStatus,
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            StateStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom state store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the state store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Lock granularity for reconciliation operations
    #[serde(default)]
    pub gate_scope: GateScope,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    /// Set the lock granularity
    pub fn with_gate_scope(mut self, gate_scope: GateScope) -> Self {
        self.gate_scope = gate_scope;
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            gate_scope: GateScope::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}
