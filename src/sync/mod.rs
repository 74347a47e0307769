//! Reconciliation of tree mutations with storage.

mod change;
mod clock;
mod engine;

pub use change::{ChangeOp, ChangeRecord, ChangeSet};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{FlushOutcome, SyncEngine, SyncSettings, SyncState};
