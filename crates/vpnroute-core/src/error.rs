//! Error types for route reconciliation
//!
//! Errors fall into five classes:
//! - validation (malformed CIDR, malformed import identifier), raised before
//!   any remote call
//! - lookup (`ServerNotFound`, `RouteNotFound`)
//! - stop phase (`StopServer`), nothing was mutated
//! - mutation phase (`MutationFailed`), the server is left stopped
//! - start phase (`StartServer`), the mutation already took effect

use thiserror::Error;

/// Result type alias for route operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for route reconciliation
#[derive(Error, Debug)]
pub enum Error {
    /// Network is not in CIDR notation
    #[error("Invalid network '{network}': {reason}")]
    InvalidNetwork {
        /// The rejected value
        network: String,
        /// Why it was rejected
        reason: String,
    },

    /// Composite import identifier could not be parsed
    #[error(
        "Invalid import ID '{id}': expected <serverId>-<routeId>, \
         e.g. 60cd0be07723cf3c9114686c-60cd0be17723cf3c91146873"
    )]
    InvalidImportId {
        /// The rejected identifier
        id: String,
    },

    /// Server does not exist in the route store
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// Route is absent from the server's route list
    #[error("Route {route_id} not found on server {server_id}")]
    RouteNotFound {
        /// Owning server
        server_id: String,
        /// Missing route
        route_id: String,
    },

    /// Route store rejected a mutation because the server is running
    #[error("Server {0} is online, routes can only be changed while it is stopped")]
    ServerOnline(String),

    /// Stopping the server failed; no mutation was attempted
    #[error("Error on stopping server {server_id}: {source}")]
    StopServer {
        /// Server that could not be stopped
        server_id: String,
        /// Underlying store error
        #[source]
        source: Box<Error>,
    },

    /// The route mutation failed after the server was stopped
    ///
    /// The server is deliberately left stopped. `was_online` tells the caller
    /// whether it was running before the guard cycle began.
    #[error("Route change on server {server_id} failed, server left stopped: {source}")]
    MutationFailed {
        /// Server the mutation targeted
        server_id: String,
        /// Whether the server was online before it was stopped
        was_online: bool,
        /// Underlying store error
        #[source]
        source: Box<Error>,
    },

    /// Restarting the server failed; the mutation already succeeded
    #[error("Error on starting server {server_id}: {source}")]
    StartServer {
        /// Server that could not be restarted
        server_id: String,
        /// Underlying store error
        #[source]
        source: Box<Error>,
    },

    /// Route store (remote API) errors
    #[error("Route store error: {0}")]
    RouteStore(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a route store error
    pub fn route_store(msg: impl Into<String>) -> Self {
        Self::RouteStore(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid network error
    pub fn invalid_network(network: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNetwork {
            network: network.into(),
            reason: reason.into(),
        }
    }

    /// Create a "route not found" error
    pub fn route_not_found(server_id: impl Into<String>, route_id: impl Into<String>) -> Self {
        Self::RouteNotFound {
            server_id: server_id.into(),
            route_id: route_id.into(),
        }
    }

    /// True when the server or the route is missing remotely
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ServerNotFound(_) | Self::RouteNotFound { .. })
    }

    /// True when the route change took effect even though an error is reported
    pub fn mutation_applied(&self) -> bool {
        matches!(self, Self::StartServer { .. })
    }

    /// True when a server that was running before the guard cycle is now stopped
    ///
    /// Callers that want to compensate can issue a start for these.
    pub fn needs_restart(&self) -> bool {
        matches!(
            self,
            Self::StartServer { .. } | Self::MutationFailed { was_online: true, .. }
        )
    }

    /// Server the guard cycle was operating on, if this is a guard phase error
    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::StopServer { server_id, .. }
            | Self::MutationFailed { server_id, .. }
            | Self::StartServer { server_id, .. } => Some(server_id),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
