use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use snafu::ResultExt;
use tracing::debug;

use crate::filesystem::ProjectSnapshot;
use crate::project::ProjectId;
use crate::storage::backend::InconsistentChangeSnafu;
use crate::storage::{BackendError, StorageBackend};
use crate::sync::ChangeRecord;

/// Ephemeral store for temporary projects. Clones share the same contents,
/// so a project closed through one handle can be reopened through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    projects: Rc<RefCell<HashMap<ProjectId, ProjectSnapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, project: &ProjectId) -> Option<ProjectSnapshot> {
        self.projects.borrow().get(project).cloned()
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, project: ProjectId, snapshot: ProjectSnapshot) {
        self.projects.borrow_mut().insert(project, snapshot);
    }
}

impl StorageBackend for MemoryStore {
    async fn load(&self, project: &ProjectId) -> Result<ProjectSnapshot, BackendError> {
        Ok(self.snapshot(project).unwrap_or_default())
    }

    async fn flush(
        &self,
        project: &ProjectId,
        changes: &[ChangeRecord],
    ) -> Result<(), BackendError> {
        let mut projects = self.projects.borrow_mut();
        let snapshot = projects.entry(project.clone()).or_default();
        snapshot
            .apply(changes)
            .context(InconsistentChangeSnafu {
                project: project.clone(),
            })?;
        debug!(
            "Applied {} changes to in-memory project '{project}'",
            changes.len()
        );
        Ok(())
    }
}
