use hashlink::LinkedHashSet;

use crate::path::{NodeKind, classify};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeData {
    File { content: Vec<u8> },
    Folder { children: LinkedHashSet<String> },
}

/// A file or folder of the project tree.
///
/// The kind is carried by the path itself; `data` only holds the payload that
/// belongs to that kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) path: String,
    pub(crate) data: NodeData,
    pub(crate) dirty: bool,
}

impl Node {
    pub(crate) fn new(path: String, content: Option<Vec<u8>>) -> Self {
        let data = match classify(&path) {
            NodeKind::Folder => NodeData::Folder {
                children: LinkedHashSet::new(),
            },
            NodeKind::File => NodeData::File {
                content: content.unwrap_or_default(),
            },
        };
        Self {
            path,
            data,
            dirty: true,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        classify(&self.path)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// File payload; `None` for folders.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.data {
            NodeData::File { content } => Some(content),
            NodeData::Folder { .. } => None,
        }
    }

    /// Child paths in insertion order; empty for files.
    pub fn child_paths(&self) -> impl Iterator<Item = &str> {
        let children = match &self.data {
            NodeData::Folder { children } => Some(children),
            NodeData::File { .. } => None,
        };
        children.into_iter().flatten().map(String::as_str)
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut LinkedHashSet<String>> {
        match &mut self.data {
            NodeData::Folder { children } => Some(children),
            NodeData::File { .. } => None,
        }
    }
}
