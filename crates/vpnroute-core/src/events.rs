//! Reconciliation events
//!
//! Every guard phase and every completed operation is published on a bounded
//! channel for monitoring. Publishing never blocks: when the channel is full
//! the event is dropped with a warning.

use tokio::sync::mpsc;
use tracing::warn;

/// Events emitted while reconciling routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Server was stopped ahead of a route change
    ServerStopped {
        server_id: String,
        was_online: bool,
    },

    /// Server was started again after a successful route change
    ServerRestarted {
        server_id: String,
    },

    /// Route change failed; the server stays stopped
    ServerLeftStopped {
        server_id: String,
        was_online: bool,
        error: String,
    },

    /// Route was added
    RouteCreated {
        server_id: String,
        route_id: String,
    },

    /// Route was updated in place
    RouteUpdated {
        server_id: String,
        route_id: String,
    },

    /// Route was removed
    RouteDeleted {
        server_id: String,
        route_id: String,
    },

    /// Existing route was brought under management
    RouteImported {
        server_id: String,
        route_id: String,
    },

    /// Tracked route no longer exists remotely
    RouteDrifted {
        server_id: String,
        route_id: String,
    },
}

/// Non-blocking publisher for [`ReconcileEvent`]s
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<ReconcileEvent>,
}

impl EventEmitter {
    /// Create an emitter and its receiving end
    ///
    /// `capacity` must be greater than zero.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Publish an event, dropping it if the channel is full or closed
    pub fn emit(&self, event: ReconcileEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping event {:?}. Consider increasing event_channel_capacity.",
                    event
                );
            }
            // nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
