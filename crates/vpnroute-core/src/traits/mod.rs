//! Core traits for route reconciliation
//!
//! - [`RouteStore`]: The remote VPN server API (servers and their routes)
//! - [`StateStore`]: Local tracking of managed routes

pub mod route_store;
pub mod state_store;

pub use route_store::{Route, RoutePayload, RouteStore, RouteStoreFactory, Server, ServerStatus};
pub use state_store::{StateStore, StateStoreFactory};
