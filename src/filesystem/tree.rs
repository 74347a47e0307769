use std::collections::{HashMap, HashSet};

use hashlink::LinkedHashSet;
use snafu::{Snafu, ensure};
use tracing::debug;

use crate::filesystem::node::{Node, NodeData};
use crate::filesystem::{ProjectSnapshot, SnapshotEntry};
use crate::path::{
    self, NodeKind, PathError, ROOT_DIR_PATH, classify, invalid_path, is_within, normalize,
    parent_of, rebase,
};

/// The in-memory tree of a single project.
///
/// Nodes are keyed by their canonical path. Every mutation is validated in
/// full before anything is changed, so a failed call leaves the tree exactly
/// as it was.
#[derive(Debug, Clone)]
pub struct ProjectTree {
    nodes: HashMap<String, Node>,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectTree {
    pub fn new() -> Self {
        let mut root = Node::new(ROOT_DIR_PATH.to_string(), None);
        root.dirty = false;

        let mut nodes = HashMap::new();
        nodes.insert(ROOT_DIR_PATH.to_string(), root);
        Self { nodes }
    }

    /// Rebuilds a clean tree from a stored snapshot.
    pub fn from_snapshot(snapshot: &ProjectSnapshot) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for entry in &snapshot.entries {
            tree.insert(&entry.path, entry.content.clone())?;
        }
        tree.mark_all_clean();
        debug!("Hydrated project tree with {} nodes", tree.len());
        Ok(tree)
    }

    /// Entries in pre-order, parents first and siblings in insertion order.
    pub fn snapshot(&self) -> ProjectSnapshot {
        let entries = self
            .iter()
            .filter(|node| node.path != ROOT_DIR_PATH)
            .map(|node| SnapshotEntry {
                path: node.path.clone(),
                content: node.content().map(<[u8]>::to_vec),
            })
            .collect();
        ProjectSnapshot { entries }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[ROOT_DIR_PATH]
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Number of nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn children(&self, path: &str) -> Result<Vec<&Node>, TreeError> {
        let node = self.nodes.get(path).context_not_found(path)?;
        Ok(node
            .child_paths()
            .filter_map(|child| self.nodes.get(child))
            .collect())
    }

    /// Walks the whole tree in pre-order starting at the root.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.subtree_paths(ROOT_DIR_PATH)
            .into_iter()
            .filter_map(|path| self.nodes.get(&path))
    }

    pub fn insert(&mut self, path: &str, content: Option<Vec<u8>>) -> Result<&Node, TreeError> {
        let path = normalize(path)?;
        ensure!(!self.nodes.contains_key(&path), PathExistsSnafu { path });
        if classify(&path) == NodeKind::Folder && content.is_some() {
            return Err(invalid_path(path, "folders carry no content").into());
        }

        let parent = parent_of(&path)?;
        let Some(children) = self.nodes.get_mut(&parent).and_then(Node::children_mut) else {
            return MissingParentSnafu { path, parent }.fail();
        };
        children.insert(path.clone());

        debug!("Inserted {path}");
        Ok(self
            .nodes
            .entry(path.clone())
            .or_insert_with(|| Node::new(path, content)))
    }

    pub fn write(&mut self, path: &str, content: Vec<u8>) -> Result<(), TreeError> {
        let path = normalize(path)?;
        let node = self.nodes.get_mut(&path).context_not_found(&path)?;
        match &mut node.data {
            NodeData::File { content: current } => *current = content,
            NodeData::Folder { .. } => {
                return Err(invalid_path(path, "folders carry no content").into());
            }
        }
        node.dirty = true;
        Ok(())
    }

    /// Removes a node together with its whole subtree and returns the removed
    /// paths in pre-order.
    pub fn remove(&mut self, path: &str) -> Result<Vec<String>, TreeError> {
        let path = normalize(path)?;
        ensure!(path != ROOT_DIR_PATH, RootImmutableSnafu);
        ensure!(self.nodes.contains_key(&path), NotFoundSnafu { path });

        let removed = self.subtree_paths(&path);
        let parent = parent_of(&path)?;
        if let Some(children) = self.nodes.get_mut(&parent).and_then(Node::children_mut) {
            children.remove(path.as_str());
        }
        for removed_path in &removed {
            self.nodes.remove(removed_path);
        }

        debug!("Removed {path} ({} nodes)", removed.len());
        Ok(removed)
    }

    /// Moves `old_path` (and its subtree) to `new_path`.
    ///
    /// The affected paths are collected and every target is checked before the
    /// first node moves. A rename within the same folder keeps the node's
    /// position among its siblings; a move appends it to the new parent.
    /// Returns the `(old, new)` pairs of every moved node.
    pub fn rename(
        &mut self,
        old_path: &str,
        new_path: &str,
    ) -> Result<Vec<(String, String)>, TreeError> {
        let old_path = normalize(old_path)?;
        let new_path = normalize(new_path)?;
        ensure!(old_path != ROOT_DIR_PATH, RootImmutableSnafu);
        ensure!(
            self.nodes.contains_key(&old_path),
            NotFoundSnafu { path: old_path }
        );
        if classify(&old_path) != classify(&new_path) {
            return Err(invalid_path(new_path, "a node cannot change between file and folder").into());
        }
        if old_path == new_path {
            return Ok(Vec::new());
        }
        if is_within(&new_path, &old_path) {
            return Err(invalid_path(new_path, "a folder cannot be moved into itself").into());
        }
        ensure!(
            !self.nodes.contains_key(&new_path),
            PathExistsSnafu { path: new_path }
        );

        let old_parent = parent_of(&old_path)?;
        let new_parent = parent_of(&new_path)?;
        ensure!(
            self.get(&new_parent)
                .is_some_and(|node| node.kind() == NodeKind::Folder),
            MissingParentSnafu {
                path: new_path,
                parent: new_parent
            }
        );

        let moves = self
            .subtree_paths(&old_path)
            .into_iter()
            .map(|path| {
                let target = rebase(&path, &old_path, &new_path)
                    .ok_or_else(|| invalid_path(path.clone(), "outside of the renamed subtree"))?;
                Ok((path, target))
            })
            .collect::<Result<Vec<_>, TreeError>>()?;
        if let Some((_, taken)) = moves.iter().find(|(_, target)| self.nodes.contains_key(target)) {
            return PathExistsSnafu { path: taken }.fail();
        }

        self.apply_moves(&moves, &old_path, &new_path);
        self.relink(&old_parent, &new_parent, &old_path, &new_path);

        debug!("Renamed {old_path} to {new_path} ({} nodes)", moves.len());
        Ok(moves)
    }

    /// Moves `path` into the folder `new_parent`, keeping its name.
    pub fn move_to(
        &mut self,
        path: &str,
        new_parent: &str,
    ) -> Result<Vec<(String, String)>, TreeError> {
        let path = normalize(path)?;
        let new_parent = normalize(new_parent)?;
        let target = path::join(&new_parent, path::basename(&path), classify(&path))?;
        self.rename(&path, &target)
    }

    pub fn dirty_paths(&self) -> Vec<&str> {
        self.iter()
            .filter(|node| node.dirty)
            .map(|node| node.path.as_str())
            .collect()
    }

    /// Clears the dirty flag of every node not listed in `still_pending`.
    pub fn mark_clean_except(&mut self, still_pending: &HashSet<&str>) {
        for node in self.nodes.values_mut() {
            if !still_pending.contains(node.path.as_str()) {
                node.dirty = false;
            }
        }
    }

    pub fn mark_all_clean(&mut self) {
        self.mark_clean_except(&HashSet::new());
    }

    fn apply_moves(&mut self, moves: &[(String, String)], old_prefix: &str, new_prefix: &str) {
        let moved = moves
            .iter()
            .filter_map(|(old, new)| self.nodes.remove(old).map(|node| (new.clone(), node)))
            .collect::<Vec<_>>();

        for (new, mut node) in moved {
            if let Some(children) = node.children_mut() {
                *children = std::mem::take(children)
                    .into_iter()
                    .map(|child| rebase(&child, old_prefix, new_prefix).unwrap_or(child))
                    .collect();
            }
            node.path = new.clone();
            node.dirty = true;
            self.nodes.insert(new, node);
        }
    }

    fn relink(&mut self, old_parent: &str, new_parent: &str, old_path: &str, new_path: &str) {
        if old_parent == new_parent {
            if let Some(children) = self.nodes.get_mut(old_parent).and_then(Node::children_mut) {
                *children = std::mem::take(children)
                    .into_iter()
                    .map(|child| {
                        if child == old_path {
                            new_path.to_string()
                        } else {
                            child
                        }
                    })
                    .collect::<LinkedHashSet<_>>();
            }
            return;
        }

        if let Some(children) = self.nodes.get_mut(old_parent).and_then(Node::children_mut) {
            children.remove(old_path);
        }
        if let Some(children) = self.nodes.get_mut(new_parent).and_then(Node::children_mut) {
            children.insert(new_path.to_string());
        }
    }

    fn subtree_paths(&self, path: &str) -> Vec<String> {
        let mut collected = Vec::new();
        let mut stack = vec![path.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                let children = node.child_paths().collect::<Vec<_>>();
                stack.extend(children.into_iter().rev().map(str::to_string));
                collected.push(current);
            }
        }
        collected
    }
}

trait NotFoundExt<T> {
    fn context_not_found(self, path: &str) -> Result<T, TreeError>;
}

impl<T> NotFoundExt<T> for Option<T> {
    fn context_not_found(self, path: &str) -> Result<T, TreeError> {
        self.ok_or_else(|| TreeError::NotFound {
            path: path.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum TreeError {
    #[snafu(display("{source}"), context(false))]
    InvalidPath { source: PathError },
    #[snafu(display("'{}' already exists", path))]
    PathExists { path: String },
    #[snafu(display("'{}' does not exist", path))]
    NotFound { path: String },
    #[snafu(display("Cannot place '{}': parent folder '{}' is not tracked", path, parent))]
    MissingParent { path: String, parent: String },
    #[snafu(display("The project root cannot be renamed or removed"))]
    RootImmutable,
}
