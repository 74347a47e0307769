use std::io::ErrorKind;
use std::path::PathBuf;

use snafu::Snafu;

use crate::ext::BestEffortPathExt;
use crate::filesystem::{ProjectSnapshot, SnapshotConflict};
use crate::project::{InvalidProjectName, ProjectId};
use crate::sync::ChangeRecord;

/// Where project state is loaded from and flushed to.
///
/// A durable store and the ephemeral store of temporary projects implement
/// the same contract; the explorer never knows which one it talks to.
pub trait StorageBackend {
    /// Returns the last flushed state of `project`, or an empty snapshot for a
    /// project the store has never seen.
    async fn load(&self, project: &ProjectId) -> Result<ProjectSnapshot, BackendError>;

    /// Applies `changes` in order. Must not report success for a partially
    /// applied change set.
    async fn flush(&self, project: &ProjectId, changes: &[ChangeRecord])
    -> Result<(), BackendError>;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("Storage I/O failed for {}", path.best_effort_path_display()))]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to (de)compress snapshot {}", path.best_effort_path_display()))]
    CompressionError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to encode project snapshot"))]
    EncodeError { source: bincode::error::EncodeError },
    #[snafu(display("Failed to decode snapshot {}", path.best_effort_path_display()))]
    DecodeError {
        path: PathBuf,
        source: bincode::error::DecodeError,
    },
    #[snafu(display("Snapshot {} is corrupt: {}", path.best_effort_path_display(), reason))]
    CorruptSnapshot { path: PathBuf, reason: &'static str },
    #[snafu(display("Change set does not match the stored project '{}'", project))]
    InconsistentChange {
        project: ProjectId,
        source: SnapshotConflict,
    },
    #[snafu(display("Project cannot be stored under this name"))]
    ProjectNameError { source: InvalidProjectName },
    #[snafu(display("Storage is temporarily unavailable: {}", message))]
    Unavailable { message: String },
    #[snafu(display("Storage rejected the request: {}", message))]
    Rejected { message: String },
}

impl BackendError {
    /// Transient failures are retried automatically; everything else needs
    /// the user's attention.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::IoError { source, .. } => matches!(
                source.kind(),
                ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
            ),
            BackendError::Unavailable { .. } => true,
            _ => false,
        }
    }
}
