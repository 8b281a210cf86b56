//! Server state guard
//!
//! The route store only accepts route changes while the owning server is
//! stopped. The guard brackets one mutation with a stop/start cycle that
//! leaves the server in the running state it had before:
//!
//! ```text
//! get_server ──► stop_server ──► mutation ──► start_server (only if it was online)
//!      │               │              │               │
//!      ▼               ▼              ▼               ▼
//!  store error     StopServer    MutationFailed   StartServer
//!                 (no change)   (left stopped)  (change kept)
//! ```
//!
//! Each phase fails fast. A failed mutation is not followed by a compensating
//! restart, so the original error is never masked by a second failure; the
//! [`Error::MutationFailed`] variant carries `was_online` so callers can
//! restart the server themselves. A failed restart does not roll back the
//! mutation.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventEmitter, ReconcileEvent};
use crate::traits::RouteStore;

/// Wraps route mutations in a stop → mutate → (conditional) start cycle
#[derive(Clone)]
pub struct ServerStateGuard {
    store: Arc<dyn RouteStore>,
    events: EventEmitter,
}

impl ServerStateGuard {
    /// Create a guard over the given route store
    pub fn new(store: Arc<dyn RouteStore>, events: EventEmitter) -> Self {
        Self { store, events }
    }

    /// Run `mutation` against `server_id` inside a guard cycle
    ///
    /// # Parameters
    ///
    /// - `server_id`: The server owning the route
    /// - `mutation`: The route store call to make while the server is stopped
    ///
    /// # Returns
    ///
    /// - `Ok(T)`: The mutation's result; the server is back in its prior state
    /// - `Err(Error::StopServer)`: The server could not be stopped, nothing changed
    /// - `Err(Error::MutationFailed)`: The mutation failed, the server is stopped
    /// - `Err(Error::StartServer)`: The mutation succeeded, the restart failed
    /// - any other error: reading the server status failed, nothing changed
    pub async fn run<T, F, Fut>(&self, server_id: &str, mutation: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let server = self.store.get_server(server_id).await?;
        let was_online = server.is_online();
        debug!(
            "Server {} status before route change: {:?}",
            server_id, server.status
        );

        self.store
            .stop_server(server_id)
            .await
            .map_err(|e| Error::StopServer {
                server_id: server_id.to_string(),
                source: Box::new(e),
            })?;
        self.events.emit(ReconcileEvent::ServerStopped {
            server_id: server_id.to_string(),
            was_online,
        });

        let output = match mutation().await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Route change on server {} failed, leaving server stopped (was online: {}): {}",
                    server_id, was_online, e
                );
                self.events.emit(ReconcileEvent::ServerLeftStopped {
                    server_id: server_id.to_string(),
                    was_online,
                    error: e.to_string(),
                });
                return Err(Error::MutationFailed {
                    server_id: server_id.to_string(),
                    was_online,
                    source: Box::new(e),
                });
            }
        };

        if was_online {
            if let Err(e) = self.store.start_server(server_id).await {
                error!(
                    "Route change on server {} applied but the server could not be restarted: {}",
                    server_id, e
                );
                return Err(Error::StartServer {
                    server_id: server_id.to_string(),
                    source: Box::new(e),
                });
            }
            info!("Server {} restarted after route change", server_id);
            self.events.emit(ReconcileEvent::ServerRestarted {
                server_id: server_id.to_string(),
            });
        } else {
            debug!("Server {} was offline, leaving it stopped", server_id);
        }

        Ok(output)
    }
}
