use hashlink::LinkedHashSet;

use crate::path::{is_within, rebase};
use crate::selection::ElementRef;
use crate::selection::element::ElementTable;

/// Everything the UI points at by path: the selected node, the target of an
/// open context menu, the open tabs and the rendered rows.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    selected: Option<String>,
    context_selected: Option<String>,
    open_files: LinkedHashSet<String>,
    elements: ElementTable,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, path: Option<String>) {
        self.selected = path;
    }

    pub fn select_context(&mut self, path: Option<String>) {
        self.context_selected = path;
    }

    pub fn clear_context(&mut self) {
        self.context_selected = None;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn context_selected(&self) -> Option<&str> {
        self.context_selected.as_deref()
    }

    /// The node a new item is placed relative to. A context-menu target wins
    /// over the normal selection.
    pub fn anchor(&self) -> Option<&str> {
        self.context_selected().or(self.selected())
    }

    pub fn open(&mut self, path: String) {
        self.open_files.insert(path);
    }

    pub fn close(&mut self, path: &str) -> bool {
        self.open_files.remove(path)
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.open_files.contains(path)
    }

    pub fn open_files(&self) -> impl Iterator<Item = &str> {
        self.open_files.iter().map(String::as_str)
    }

    pub fn bind_element(&mut self, element: ElementRef, path: String) {
        self.elements.bind(element, path);
    }

    pub fn unbind_element(&mut self, element: ElementRef) -> Option<String> {
        self.elements.unbind(element)
    }

    pub fn element_for_path(&self, path: &str) -> Option<ElementRef> {
        self.elements.element_for(path)
    }

    pub fn path_for_element(&self, element: ElementRef) -> Option<&str> {
        self.elements.path_for(element)
    }

    /// Follows a rename: every reference at or below `old` now points below `new`.
    pub fn rebase(&mut self, old: &str, new: &str) {
        for slot in [&mut self.selected, &mut self.context_selected] {
            if let Some(path) = slot.take() {
                *slot = Some(rebase(&path, old, new).unwrap_or(path));
            }
        }
        self.open_files = std::mem::take(&mut self.open_files)
            .into_iter()
            .map(|path| rebase(&path, old, new).unwrap_or(path))
            .collect();
        self.elements.rebase(old, new);
    }

    /// Drops every reference at or below a removed path.
    pub fn forget(&mut self, removed: &str) {
        for slot in [&mut self.selected, &mut self.context_selected] {
            if slot.as_deref().is_some_and(|path| is_within(path, removed)) {
                *slot = None;
            }
        }
        self.open_files.retain(|path| !is_within(path, removed));
        self.elements.retain(|path| !is_within(path, removed));
    }
}
