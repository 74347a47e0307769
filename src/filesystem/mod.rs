//! In-memory project tree with change tracking.
//!
//! The tree holds files and folders keyed by their project-rooted path.
//! Every node carries a dirty flag that stays set until the change that
//! produced it has reached storage.

mod node;
mod snapshot;
mod tree;

pub use node::Node;
pub use snapshot::{ProjectSnapshot, SnapshotConflict, SnapshotEntry};
pub use tree::{ProjectTree, TreeError};
