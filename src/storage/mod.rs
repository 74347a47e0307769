//! Storage backends a project is loaded from and flushed to.

mod backend;
mod disk;
mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendError, StorageBackend};
pub use disk::DiskStore;
pub use memory::MemoryStore;
