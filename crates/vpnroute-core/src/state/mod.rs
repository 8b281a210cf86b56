// # State Store Implementations
//
// Local tracking of managed routes, keyed by resource name.

pub mod file;
pub mod memory;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};
