use std::rc::Rc;
use std::time::Instant;

use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use snafu::{ResultExt, ensure};
use tracing::{debug, error, info, warn};

use crate::config::ExplorerConfig;
use crate::explorer::error::*;
use crate::explorer::{
    FlushStatus, InputPurpose, InputSession, Keybind, KeybindOutcome, SyncEvent,
};
use crate::filesystem::{Node, ProjectTree, TreeError};
use crate::path::{
    self, NodeKind, ROOT_DIR_PATH, SEPARATOR, absolute, classify, invalid_path, is_within,
    normalize, parent_of,
};
use crate::project::{Project, ProjectMode};
use crate::selection::{ElementRef, SelectionTracker};
use crate::storage::{BackendError, StorageBackend};
use crate::sync::{
    ChangeRecord, ChangeSet, Clock, FlushOutcome, SyncEngine, SyncSettings, SyncState,
    SystemClock,
};

/// One open project: its tree, what the user points at, and the queue of
/// changes on their way to the backend.
///
/// Every structural operation updates the tree first and only enqueues a
/// change record once the tree accepted it. Storage is reached through the
/// debounced flush in [`Explorer::flush_if_due`] and [`Explorer::run_until_idle`],
/// or explicitly through [`Explorer::flush`] and [`Explorer::close`].
pub struct Explorer<B: StorageBackend> {
    project: Project,
    tree: ProjectTree,
    selection: SelectionTracker,
    sync: SyncEngine,
    backend: B,
    clock: Rc<dyn Clock>,
    input: Option<InputSession>,
    subscribers: Vec<UnboundedSender<SyncEvent>>,
    closed: bool,
}

impl<B: StorageBackend> Explorer<B> {
    pub async fn open(
        project: Project,
        backend: B,
        config: &ExplorerConfig,
    ) -> Result<Self, ExplorerError> {
        Self::open_with_clock(project, backend, config.sync, Rc::new(SystemClock)).await
    }

    pub async fn open_with_clock(
        project: Project,
        backend: B,
        settings: SyncSettings,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, ExplorerError> {
        let snapshot = backend.load(&project.id).await.context(LoadSnafu {
            project: project.id.clone(),
        })?;
        let mut tree = ProjectTree::from_snapshot(&snapshot).context(HydrateSnafu {
            project: project.id.clone(),
        })?;
        tree.mark_all_clean();
        info!(
            "Opened {} project '{}' ({} nodes)",
            project.mode,
            project.id,
            tree.len()
        );

        Ok(Self {
            project,
            tree,
            selection: SelectionTracker::new(),
            sync: SyncEngine::new(settings),
            backend,
            clock,
            input: None,
            subscribers: Vec::new(),
            closed: false,
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn mode(&self) -> &ProjectMode {
        &self.project.mode
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn pending_changes(&self) -> usize {
        self.sync.pending_len()
    }

    pub fn last_sync_error(&self) -> Option<&str> {
        self.sync.last_error()
    }

    /// Looks a node up by project path. Unparseable paths find nothing.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let path = self.resolve(path).ok()?;
        self.tree.get(&path)
    }

    pub fn children(&self, path: &str) -> Result<Vec<&Node>, ExplorerError> {
        let path = self.resolve(path)?;
        Ok(self.tree.children(&path)?)
    }

    /// Nesting level of `path` below the project root, in the project's mode.
    pub fn depth_of(&self, path: &str) -> Result<usize, ExplorerError> {
        let path = self.resolve(path)?;
        let mode = &self.project.mode;
        Ok(path::depth_of(&absolute(&path, mode), mode))
    }

    // Selection

    pub fn select(&mut self, path: Option<&str>) -> Result<(), ExplorerError> {
        let path = path.map(|path| self.existing(path)).transpose()?;
        self.selection.select(path);
        Ok(())
    }

    /// Marks the target of an open context menu. It takes priority over the
    /// selection as the anchor for new items.
    pub fn select_context(&mut self, path: Option<&str>) -> Result<(), ExplorerError> {
        let path = path.map(|path| self.existing(path)).transpose()?;
        self.selection.select_context(path);
        Ok(())
    }

    pub fn clear_context(&mut self) {
        self.selection.clear_context();
    }

    pub fn selected(&self) -> Option<&str> {
        self.selection.selected()
    }

    pub fn context_selected(&self) -> Option<&str> {
        self.selection.context_selected()
    }

    pub fn open_file(&mut self, path: &str) -> Result<(), ExplorerError> {
        let path = self.existing(path)?;
        if classify(&path) != NodeKind::File {
            return Err(invalid_path(path, "only files can be opened").into());
        }
        self.selection.open(path);
        Ok(())
    }

    pub fn close_file(&mut self, path: &str) -> bool {
        self.resolve(path)
            .is_ok_and(|path| self.selection.close(&path))
    }

    pub fn open_files(&self) -> impl Iterator<Item = &str> {
        self.selection.open_files()
    }

    /// Associates a rendered row with the node at `path`.
    pub fn bind_element(&mut self, element: ElementRef, path: &str) -> Result<(), ExplorerError> {
        let path = self.existing(path)?;
        self.selection.bind_element(element, path);
        Ok(())
    }

    pub fn unbind_element(&mut self, element: ElementRef) -> Option<String> {
        self.selection.unbind_element(element)
    }

    pub fn element_for_path(&self, path: &str) -> Option<ElementRef> {
        let path = self.resolve(path).ok()?;
        self.selection.element_for_path(&path)
    }

    pub fn path_for_element(&self, element: ElementRef) -> Option<&str> {
        self.selection.path_for_element(element)
    }

    // Structure

    /// Creates `name` next to the current anchor: inside it when the anchor
    /// is a folder, beside it when it is a file, at the root otherwise.
    ///
    /// A trailing separator makes a folder. Without one, `intent` decides and
    /// defaults to a file. The new node becomes the selection and the context
    /// target is cleared.
    pub fn new_item(
        &mut self,
        name: &str,
        intent: Option<NodeKind>,
    ) -> Result<String, ExplorerError> {
        self.ensure_open()?;
        let parent = self.insertion_point();
        self.create_in(&parent, name, intent)
    }

    pub fn new_item_in(
        &mut self,
        parent: &str,
        name: &str,
        intent: Option<NodeKind>,
    ) -> Result<String, ExplorerError> {
        self.ensure_open()?;
        let parent = self.resolve(parent)?;
        self.create_in(&parent, name, intent)
    }

    /// Gives a node a new name within its folder. Returns the new path.
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<String, ExplorerError> {
        self.ensure_open()?;
        let path = self.resolve(path)?;
        if path == ROOT_DIR_PATH {
            return Err(TreeError::RootImmutable.into());
        }

        let new_name = new_name.trim();
        let kind = classify(&path);
        if kind == NodeKind::File && new_name.ends_with(SEPARATOR) {
            return Err(invalid_path(new_name, "a file cannot be renamed into a folder").into());
        }
        let target = path::join(&parent_of(&path)?, new_name, kind)?;
        self.relocate(&path, &target)
    }

    /// Moves a node with its subtree into another folder, keeping its name.
    pub fn move_to(&mut self, path: &str, new_parent: &str) -> Result<String, ExplorerError> {
        self.ensure_open()?;
        let path = self.resolve(path)?;
        if path == ROOT_DIR_PATH {
            return Err(TreeError::RootImmutable.into());
        }
        let new_parent = self.resolve(new_parent)?;
        let target = path::join(&new_parent, path::basename(&path), classify(&path))?;
        self.relocate(&path, &target)
    }

    /// Removes a node and everything below it. Returns the removed paths.
    pub fn remove(&mut self, path: &str) -> Result<Vec<String>, ExplorerError> {
        self.ensure_open()?;
        let path = self.resolve(path)?;
        let removed = self.tree.remove(&path)?;

        self.selection.forget(&path);
        if let Some(InputSession {
            purpose: InputPurpose::Rename { path: target },
            ..
        }) = &self.input
            && is_within(target, &path)
        {
            self.input = None;
        }
        self.record(ChangeRecord::remove(path.as_str()));

        info!("Removed {path} ({} nodes)", removed.len());
        Ok(removed)
    }

    pub fn write(&mut self, path: &str, content: Vec<u8>) -> Result<(), ExplorerError> {
        self.ensure_open()?;
        let path = self.resolve(path)?;
        self.tree.write(&path, content.clone())?;
        self.record(ChangeRecord::write(path, content));
        Ok(())
    }

    // Input

    pub fn input(&self) -> Option<&InputSession> {
        self.input.as_ref()
    }

    pub fn begin_new_item(&mut self, intent: Option<NodeKind>) -> Result<(), ExplorerError> {
        self.ensure_open()?;
        self.input = Some(InputSession::new(InputPurpose::NewItem { intent }));
        Ok(())
    }

    pub fn begin_rename(&mut self, path: &str) -> Result<(), ExplorerError> {
        self.ensure_open()?;
        let path = self.existing(path)?;
        if path == ROOT_DIR_PATH {
            return Err(TreeError::RootImmutable.into());
        }
        self.input = Some(InputSession::new(InputPurpose::Rename { path }));
        Ok(())
    }

    /// Dispatches a key pressed in the open input.
    ///
    /// `Confirm` submits `text`. On success the input closes; on failure it
    /// stays open carrying the error message and the error is returned.
    /// `Cancel` closes the input and clears the context target.
    pub fn on_keybind(
        &mut self,
        key: Keybind,
        text: &str,
    ) -> Result<KeybindOutcome, ExplorerError> {
        self.ensure_open()?;
        let Some(session) = &self.input else {
            return NoInputSessionSnafu.fail();
        };

        match key {
            Keybind::Cancel => {
                self.input = None;
                self.selection.clear_context();
                Ok(KeybindOutcome::Cancelled)
            }
            Keybind::Confirm => {
                let result = match session.purpose.clone() {
                    InputPurpose::NewItem { intent } => {
                        self.new_item(text, intent).map(KeybindOutcome::Created)
                    }
                    InputPurpose::Rename { path } => {
                        self.rename(&path, text).map(KeybindOutcome::Renamed)
                    }
                };
                match result {
                    Ok(outcome) => {
                        self.input = None;
                        Ok(outcome)
                    }
                    Err(e) => {
                        debug!("Input rejected: {e}");
                        if let Some(session) = self.input.as_mut() {
                            session.error = Some(e.to_string());
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    // Sync

    /// Receives an event for every finished flush attempt until the
    /// explorer closes.
    pub fn subscribe(&mut self) -> UnboundedReceiver<SyncEvent> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// When the next debounced or retry flush is due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sync.deadline()
    }

    /// Flushes the queue if its deadline has passed on the explorer's clock.
    pub async fn flush_if_due(&mut self) -> FlushStatus {
        if self.closed || !self.sync.is_due(self.clock.now()) {
            return FlushStatus::Idle;
        }
        self.flush_status().await
    }

    /// Sleeps until each scheduled deadline and flushes, until nothing is
    /// scheduled any more. Returns the status of the last attempt.
    pub async fn run_until_idle(&mut self) -> FlushStatus {
        let mut status = FlushStatus::Idle;
        while !self.closed
            && let Some(deadline) = self.sync.deadline()
        {
            if let Some(wait) = deadline.checked_duration_since(self.clock.now()) {
                compio::time::sleep(wait).await;
            }
            status = self.flush_status().await;
        }
        status
    }

    /// Sends every pending change now, regardless of the debounce window.
    pub async fn flush(&mut self) -> Result<usize, ExplorerError> {
        self.ensure_open()?;
        self.flush_batch().await.context(FlushSnafu {
            project: self.project.id.clone(),
        })
    }

    /// Drops the queued changes and reloads the tree from storage, so the
    /// tree matches what the backend holds again. References to nodes that
    /// only existed in the dropped changes are cleared.
    ///
    /// If the reload fails the queue is kept and nothing changes.
    pub async fn discard_pending(&mut self) -> Result<usize, ExplorerError> {
        let snapshot = self.backend.load(&self.project.id).await.context(LoadSnafu {
            project: self.project.id.clone(),
        })?;
        let mut tree = ProjectTree::from_snapshot(&snapshot).context(HydrateSnafu {
            project: self.project.id.clone(),
        })?;
        tree.mark_all_clean();

        let discarded = self.sync.discard();
        let gone = self
            .tree
            .iter()
            .map(|node| node.path())
            .filter(|path| !tree.contains(path))
            .map(str::to_string)
            .collect::<Vec<_>>();
        for path in &gone {
            self.selection.forget(path);
        }
        if let Some(InputSession {
            purpose: InputPurpose::Rename { path },
            ..
        }) = &self.input
            && !tree.contains(path)
        {
            self.input = None;
        }
        self.tree = tree;

        if discarded > 0 {
            warn!(
                "Discarded {discarded} unflushed change(s) of project '{}', {} node(s) reverted",
                self.project.id,
                gone.len()
            );
        }
        Ok(discarded)
    }

    /// Flushes what is pending and closes the project. Refuses to close while
    /// changes could not be stored.
    pub async fn close(&mut self) -> Result<(), ExplorerError> {
        if self.closed {
            return Ok(());
        }
        if self.sync.has_pending()
            && let Err(e) = self.flush_batch().await
        {
            warn!("Final flush of project '{}' failed: {e}", self.project.id);
        }
        ensure!(
            !self.sync.has_pending(),
            PendingChangesSnafu {
                project: self.project.id.clone(),
                pending: self.sync.pending_len(),
            }
        );

        self.closed = true;
        self.input = None;
        self.subscribers.clear();
        info!("Closed project '{}'", self.project.id);
        Ok(())
    }

    /// Copies the current tree of a temporary project into `backend` under
    /// the project name `name` and continues there.
    ///
    /// On success this explorer is closed, its unflushed changes dropped, and
    /// the returned explorer carries the tree, selection and subscribers over.
    /// On failure nothing changes.
    pub async fn persist<P: StorageBackend>(
        &mut self,
        backend: P,
        name: impl Into<String>,
    ) -> Result<Explorer<P>, ExplorerError> {
        self.ensure_open()?;
        ensure!(
            self.project.mode.is_temporary(),
            AlreadyPersistedSnafu {
                project: self.project.id.clone(),
            }
        );

        let project = Project::persisted(name);
        let changes = self
            .tree
            .snapshot()
            .entries
            .into_iter()
            .map(|entry| ChangeRecord::create(entry.path, entry.content))
            .collect::<ChangeSet>();
        backend
            .flush(&project.id, &changes)
            .await
            .context(PersistSnafu {
                project: project.id.clone(),
            })?;

        let mut tree = self.tree.clone();
        tree.mark_all_clean();
        self.sync.discard();
        self.closed = true;
        self.input = None;
        info!(
            "Persisted project '{}' as '{}' ({} nodes)",
            self.project.id,
            project.id,
            changes.len()
        );

        Ok(Explorer {
            project,
            tree,
            selection: std::mem::take(&mut self.selection),
            sync: SyncEngine::new(*self.sync.settings()),
            backend,
            clock: Rc::clone(&self.clock),
            input: None,
            subscribers: std::mem::take(&mut self.subscribers),
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), ExplorerError> {
        ensure!(
            !self.closed,
            ProjectClosedSnafu {
                project: self.project.id.clone(),
            }
        );
        Ok(())
    }

    /// Callers address nodes by project path in both modes. The store root
    /// only appears at the backend boundary.
    fn resolve(&self, path: &str) -> Result<String, ExplorerError> {
        Ok(normalize(path)?)
    }

    fn existing(&self, path: &str) -> Result<String, ExplorerError> {
        let path = self.resolve(path)?;
        if !self.tree.contains(&path) {
            return Err(TreeError::NotFound { path }.into());
        }
        Ok(path)
    }

    fn insertion_point(&self) -> String {
        let anchor = match self.selection.anchor() {
            Some(anchor) if self.tree.contains(anchor) => anchor,
            Some(stale) => {
                debug!("Anchor {stale} no longer exists, using the project root");
                ROOT_DIR_PATH
            }
            None => ROOT_DIR_PATH,
        };
        match classify(anchor) {
            NodeKind::Folder => anchor.to_string(),
            NodeKind::File => parent_of(anchor).unwrap_or_else(|_| ROOT_DIR_PATH.to_string()),
        }
    }

    fn create_in(
        &mut self,
        parent: &str,
        name: &str,
        intent: Option<NodeKind>,
    ) -> Result<String, ExplorerError> {
        let name = name.trim();
        let kind = if name.ends_with(SEPARATOR) {
            NodeKind::Folder
        } else {
            intent.unwrap_or(NodeKind::File)
        };
        let path = path::join(parent, name, kind)?;
        let content = (kind == NodeKind::File).then(Vec::new);
        self.tree.insert(&path, content.clone())?;

        self.record(ChangeRecord::create(path.as_str(), content));
        self.selection.clear_context();
        self.selection.select(Some(path.clone()));
        info!("Created {path}");
        Ok(path)
    }

    fn relocate(&mut self, path: &str, target: &str) -> Result<String, ExplorerError> {
        let moves = self.tree.rename(path, target)?;
        if moves.is_empty() {
            return Ok(target.to_string());
        }

        self.selection.rebase(path, target);
        if let Some(InputSession {
            purpose: InputPurpose::Rename { path: pending },
            ..
        }) = self.input.as_mut()
            && let Some(rebased) = path::rebase(pending, path, target)
        {
            *pending = rebased;
        }
        self.record(ChangeRecord::rename(path, target));

        info!("Renamed {path} to {target} ({} nodes)", moves.len());
        Ok(target.to_string())
    }

    fn record(&mut self, record: ChangeRecord) {
        let now = self.clock.now();
        self.sync.enqueue(record, now);
    }

    async fn flush_status(&mut self) -> FlushStatus {
        match self.flush_batch().await {
            Ok(records) => FlushStatus::Flushed(records),
            Err(e) => FlushStatus::Failed {
                transient: e.is_transient(),
            },
        }
    }

    async fn flush_batch(&mut self) -> Result<usize, BackendError> {
        let Some(batch) = self.sync.begin_flush() else {
            return Ok(0);
        };
        let result = self.backend.flush(&self.project.id, &batch).await;

        match self.sync.complete_flush(result, self.clock.now()) {
            FlushOutcome::Flushed(records) => {
                self.tree.mark_clean_except(&self.sync.pending_paths());
                info!(
                    "Flushed {} change(s) of project '{}'",
                    records.len(),
                    self.project.id
                );
                self.notify(SyncEvent::Flushed {
                    records: records.len(),
                });
                Ok(records.len())
            }
            FlushOutcome::Failed { error, retry_at } => {
                match retry_at {
                    Some(_) => warn!("Flush of project '{}' failed, will retry: {error}", self.project.id),
                    None => error!("Flush of project '{}' failed: {error}", self.project.id),
                }
                self.notify(SyncEvent::FlushFailed {
                    message: error.to_string(),
                    transient: error.is_transient(),
                });
                Err(error)
            }
        }
    }

    fn notify(&mut self, event: SyncEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
    }
}

impl<B: StorageBackend> Drop for Explorer<B> {
    fn drop(&mut self) {
        if !self.closed && self.sync.has_pending() {
            error!(
                "Project '{}' dropped with {} unflushed change(s)",
                self.project.id,
                self.sync.pending_len()
            );
        }
    }
}
