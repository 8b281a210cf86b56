//! Route engine
//!
//! The RouteEngine is responsible for:
//! - Comparing desired route configuration with locally tracked state
//! - Driving the [`RouteReconciler`] to create, update, replace or delete routes
//! - Persisting the fields the route store returns
//! - Detecting routes that were deleted remotely
//!
//! ## Architecture
//!
//! ```text
//!  desired RouteSpec            tracked RouteState
//!         │                            │
//!         └──────────► plan() ◄────────┘
//!                        │
//!                        ▼
//!               ┌─────────────────┐        ┌─────────────┐
//!               │ RouteReconciler │───────►│ RouteStore  │
//!               └─────────────────┘        └─────────────┘
//!                        │
//!                        ▼
//!               ┌─────────────────┐
//!               │   StateStore    │  persist returned fields
//!               └─────────────────┘
//! ```
//!
//! ## Drift
//!
//! `apply` re-reads the tracked route before planning. A route deleted
//! remotely is dropped from tracking and created again; fields edited
//! remotely are planned against their current remote values.
//!
//! ## Resource Names
//!
//! Operations on one resource name are serialized. Different names proceed
//! independently, subject to the per-server gate of the reconciler.
//!
//! ## Partial Success
//!
//! When a route change is applied but the server cannot be restarted
//! ([`Error::StartServer`]), the engine still records the change before
//! returning the error, so tracked state never lags behind the route store.

use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::VpnRouteConfig;
use crate::error::{Error, Result};
use crate::events::ReconcileEvent;
use crate::gate::{ConcurrencyGate, GateScope};
use crate::reconciler::RouteReconciler;
use crate::registry::StoreRegistry;
use crate::resource::{Plan, RouteSpec, RouteState, plan};
use crate::traits::{Route, StateStore};

/// Result of applying one desired route
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Route did not exist and was created
    Created(RouteState),
    /// Mutable fields were updated in place
    Updated(RouteState),
    /// A force-new field changed; the old route was deleted and a new one created
    Replaced(RouteState),
    /// Tracked state already matched
    Unchanged(RouteState),
}

impl ApplyOutcome {
    /// Tracked state after the apply
    pub fn state(&self) -> &RouteState {
        match self {
            ApplyOutcome::Created(state)
            | ApplyOutcome::Updated(state)
            | ApplyOutcome::Replaced(state)
            | ApplyOutcome::Unchanged(state) => state,
        }
    }
}

/// Summary of a [`RouteEngine::sync`] run
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Outcome per desired route name
    pub applied: BTreeMap<String, ApplyOutcome>,
    /// Tracked names that were no longer desired and got destroyed
    pub destroyed: Vec<String>,
}

/// Keeps tracked route state in line with the route store
pub struct RouteEngine {
    /// Reconciler for remote operations
    reconciler: RouteReconciler,

    /// Local tracking of managed routes
    state_store: Box<dyn StateStore>,

    /// Exclusive locks keyed by resource name
    names: ConcurrencyGate,
}

impl RouteEngine {
    /// Create an engine from its parts
    pub fn new(reconciler: RouteReconciler, state_store: Box<dyn StateStore>) -> Self {
        Self {
            reconciler,
            state_store,
            names: ConcurrencyGate::new(GateScope::PerServer),
        }
    }

    /// Build an engine with stores created through `registry`
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver)
    pub async fn from_config(
        registry: &StoreRegistry,
        config: &VpnRouteConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let route_store = registry.create_route_store(&config.route_store)?;
        let state_store = registry.create_state_store(&config.state_store).await?;
        let (reconciler, rx) = RouteReconciler::new(route_store, &config.reconciler)?;

        info!(
            "Route engine ready [route store: {}, state store: {}, gate: {:?}]",
            config.route_store.type_name(),
            config.state_store.type_name(),
            config.reconciler.gate_scope
        );

        Ok((Self::new(reconciler, state_store), rx))
    }

    /// The underlying reconciler
    pub fn reconciler(&self) -> &RouteReconciler {
        &self.reconciler
    }

    /// Tracked state for `name`, without contacting the route store
    pub async fn tracked(&self, name: &str) -> Result<Option<RouteState>> {
        self.state_store.get_route(name).await
    }

    /// Bring the route tracked as `name` to the desired configuration
    pub async fn apply(&self, name: &str, spec: &RouteSpec) -> Result<ApplyOutcome> {
        spec.validate()?;

        let _name = self.names.exclusive(name).await;
        self.apply_locked(name, spec).await
    }

    async fn apply_locked(&self, name: &str, spec: &RouteSpec) -> Result<ApplyOutcome> {
        let Some(prior) = self.refresh_locked(name).await? else {
            return self.create_tracked(name, spec).await.map(ApplyOutcome::Created);
        };

        match plan(Some(&prior), spec) {
            Plan::Unchanged => {
                debug!("Route {} is up to date", name);
                Ok(ApplyOutcome::Unchanged(prior))
            }
            Plan::Update(changes) => {
                match self
                    .reconciler
                    .update(&prior.server_id, &prior.id, &changes)
                    .await
                {
                    Ok(route) => self.track(name, &route).await.map(ApplyOutcome::Updated),
                    Err(e) if e.is_not_found() => {
                        // deleted remotely after the re-read
                        self.untrack_drifted(name, prior).await?;
                        self.create_tracked(name, spec).await.map(ApplyOutcome::Created)
                    }
                    Err(e) if e.mutation_applied() => {
                        self.resync_after_partial_success(name).await;
                        Err(e)
                    }
                    Err(e) => Err(e),
                }
            }
            Plan::Replace => {
                info!(
                    "Replacing route {} ({} on {} -> {} on {})",
                    name, prior.network, prior.server_id, spec.network, spec.server_id
                );
                self.delete_tracked(name, &prior).await?;
                self.create_tracked(name, spec).await.map(ApplyOutcome::Replaced)
            }
            Plan::Create => self.create_tracked(name, spec).await.map(ApplyOutcome::Created),
        }
    }

    /// Re-read the route tracked as `name` from the route store
    ///
    /// # Returns
    ///
    /// - `Ok(Some(RouteState))`: The refreshed state
    /// - `Ok(None)`: Nothing tracked, or the route was deleted remotely (tracking dropped)
    /// - `Err(Error)`: The route store could not be read
    pub async fn refresh(&self, name: &str) -> Result<Option<RouteState>> {
        let _name = self.names.exclusive(name).await;
        self.refresh_locked(name).await
    }

    async fn refresh_locked(&self, name: &str) -> Result<Option<RouteState>> {
        let Some(prior) = self.state_store.get_route(name).await? else {
            return Ok(None);
        };

        match self.reconciler.read(&prior.server_id, &prior.id).await {
            Ok(route) => self.track(name, &route).await.map(Some),
            Err(e) if e.is_not_found() => {
                self.untrack_drifted(name, prior).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn untrack_drifted(&self, name: &str, prior: RouteState) -> Result<()> {
        warn!(
            "Route {} ({} on server {}) no longer exists remotely, dropping it from tracking",
            name, prior.id, prior.server_id
        );
        self.state_store.delete_route(name).await?;
        self.reconciler.events().emit(ReconcileEvent::RouteDrifted {
            server_id: prior.server_id,
            route_id: prior.id,
        });
        Ok(())
    }

    /// Delete the route tracked as `name` and stop tracking it
    ///
    /// Returns `false` when nothing was tracked under `name`.
    pub async fn destroy(&self, name: &str) -> Result<bool> {
        let _name = self.names.exclusive(name).await;

        let Some(prior) = self.state_store.get_route(name).await? else {
            return Ok(false);
        };

        self.delete_tracked(name, &prior).await?;
        Ok(true)
    }

    /// Track an existing route, identified as `<serverId>-<routeId>`, under `name`
    pub async fn import(&self, name: &str, composite_id: &str) -> Result<RouteState> {
        let _name = self.names.exclusive(name).await;

        if self.state_store.get_route(name).await?.is_some() {
            return Err(Error::state_store(format!(
                "Route '{}' is already tracked, destroy or rename it before importing",
                name
            )));
        }

        let route = self.reconciler.import(composite_id).await?;
        self.track(name, &route).await
    }

    /// Apply every desired route, then destroy tracked routes that are no longer desired
    ///
    /// Stops at the first error; routes handled before it keep their new state.
    pub async fn sync(&self, desired: &BTreeMap<String, RouteSpec>) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for (name, spec) in desired {
            let outcome = self.apply(name, spec).await?;
            report.applied.insert(name.clone(), outcome);
        }

        for name in self.state_store.list_routes().await? {
            if !desired.contains_key(&name) && self.destroy(&name).await? {
                report.destroyed.push(name);
            }
        }

        self.state_store.flush().await?;
        self.names.prune_idle();
        self.reconciler.prune_idle_locks();
        info!(
            "Sync complete: {} applied, {} destroyed",
            report.applied.len(),
            report.destroyed.len()
        );
        Ok(report)
    }

    /// Persist pending state changes
    pub async fn flush(&self) -> Result<()> {
        self.state_store.flush().await
    }

    async fn create_tracked(&self, name: &str, spec: &RouteSpec) -> Result<RouteState> {
        match self.reconciler.create(spec).await {
            Ok(route) => self.track(name, &route).await,
            Err(e) if e.mutation_applied() => {
                // the created route is not returned on a failed restart; find it by network
                match self.reconciler.list(&spec.server_id).await {
                    Ok(routes) => {
                        if let Some(route) = routes.iter().find(|r| r.network == spec.network) {
                            self.track(name, route).await?;
                        }
                    }
                    Err(list_err) => warn!(
                        "Could not look up route {} after partial create: {}",
                        name, list_err
                    ),
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_tracked(&self, name: &str, prior: &RouteState) -> Result<()> {
        match self.reconciler.delete(&prior.server_id, &prior.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("Route {} was already gone remotely", name);
            }
            Err(e) if e.mutation_applied() => {
                self.state_store.delete_route(name).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        }

        self.state_store.delete_route(name).await
    }

    async fn resync_after_partial_success(&self, name: &str) {
        if let Err(e) = self.refresh_locked(name).await {
            warn!("Could not refresh route {} after partial success: {}", name, e);
        }
    }

    async fn track(&self, name: &str, route: &Route) -> Result<RouteState> {
        let state = RouteState::from_route(route);
        self.state_store.set_route(name, &state).await?;
        Ok(state)
    }
}
