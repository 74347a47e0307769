use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::filesystem::ProjectSnapshot;
use crate::project::ProjectId;
use crate::storage::{BackendError, MemoryStore, StorageBackend};
use crate::sync::{ChangeRecord, ChangeSet};

/// In-memory backend that records every flush call and can be told to fail.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingStore {
    pub(crate) inner: MemoryStore,
    calls: Rc<RefCell<Vec<ChangeSet>>>,
    failures: Rc<RefCell<VecDeque<BackendError>>>,
}

impl RecordingStore {
    pub(crate) fn fail_next(&self, error: BackendError) {
        self.failures.borrow_mut().push_back(error);
    }

    pub(crate) fn calls(&self) -> Vec<ChangeSet> {
        self.calls.borrow().clone()
    }
}

impl StorageBackend for RecordingStore {
    async fn load(&self, project: &ProjectId) -> Result<ProjectSnapshot, BackendError> {
        self.inner.load(project).await
    }

    async fn flush(
        &self,
        project: &ProjectId,
        changes: &[ChangeRecord],
    ) -> Result<(), BackendError> {
        self.calls.borrow_mut().push(changes.to_vec());
        if let Some(error) = self.failures.borrow_mut().pop_front() {
            return Err(error);
        }
        self.inner.flush(project, changes).await
    }
}
