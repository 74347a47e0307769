use snafu::Snafu;

use crate::filesystem::TreeError;
use crate::path::PathError;
use crate::project::ProjectId;
use crate::storage::BackendError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExplorerError {
    #[snafu(display("{source}"), context(false))]
    StructureError { source: TreeError },
    #[snafu(display("Failed to load project '{}'", project))]
    LoadError {
        project: ProjectId,
        source: BackendError,
    },
    #[snafu(display("Stored state of project '{}' is not a valid tree", project))]
    HydrateError {
        project: ProjectId,
        source: TreeError,
    },
    #[snafu(display("Failed to flush project '{}'", project))]
    FlushError {
        project: ProjectId,
        source: BackendError,
    },
    #[snafu(display("Failed to persist project as '{}'", project))]
    PersistError {
        project: ProjectId,
        source: BackendError,
    },
    #[snafu(display(
        "Project '{}' still has {} unflushed change(s); flush or discard them first",
        project,
        pending
    ))]
    PendingChanges { project: ProjectId, pending: usize },
    #[snafu(display("Project '{}' is already persisted", project))]
    AlreadyPersisted { project: ProjectId },
    #[snafu(display("Project '{}' is closed", project))]
    ProjectClosed { project: ProjectId },
    #[snafu(display("No input is open"))]
    NoInputSession,
}

impl From<PathError> for ExplorerError {
    fn from(source: PathError) -> Self {
        ExplorerError::StructureError {
            source: source.into(),
        }
    }
}

impl ExplorerError {
    /// The structural error behind this one, if the failure was a rejected
    /// tree operation rather than a storage problem.
    pub fn structure(&self) -> Option<&TreeError> {
        match self {
            ExplorerError::StructureError { source } => Some(source),
            _ => None,
        }
    }
}
