// # Route Store Implementations
//
// Implementations of the RouteStore trait that ship with the core. Stores
// backed by a real VPN server API live outside this crate and plug in via
// `StoreRegistry`.

pub mod memory;

pub use memory::{MemoryRouteStore, MemoryRouteStoreFactory};
