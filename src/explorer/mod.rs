//! The project explorer: a project tree, the user's selection and the
//! debounced reconciliation of both with a storage backend.

mod error;
mod events;
mod explorer;
mod input;

pub use error::ExplorerError;
pub use events::{FlushStatus, SyncEvent};
pub use explorer::Explorer;
pub use input::{InputPurpose, InputSession, Keybind, KeybindOutcome};
