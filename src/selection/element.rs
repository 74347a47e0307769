use std::collections::HashMap;

use derive_more::{Display, From};

use crate::path::rebase;

/// Opaque handle the UI uses for a rendered tree row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
pub struct ElementRef(u64);

/// Two-way lookup between UI elements and node paths.
#[derive(Debug, Clone, Default)]
pub(crate) struct ElementTable {
    by_element: HashMap<ElementRef, String>,
    by_path: HashMap<String, ElementRef>,
}

impl ElementTable {
    pub(crate) fn bind(&mut self, element: ElementRef, path: String) {
        self.unbind(element);
        if let Some(previous) = self.by_path.insert(path.clone(), element) {
            self.by_element.remove(&previous);
        }
        self.by_element.insert(element, path);
    }

    pub(crate) fn unbind(&mut self, element: ElementRef) -> Option<String> {
        let path = self.by_element.remove(&element)?;
        self.by_path.remove(&path);
        Some(path)
    }

    pub(crate) fn element_for(&self, path: &str) -> Option<ElementRef> {
        self.by_path.get(path).copied()
    }

    pub(crate) fn path_for(&self, element: ElementRef) -> Option<&str> {
        self.by_element.get(&element).map(String::as_str)
    }

    pub(crate) fn rebase(&mut self, old: &str, new: &str) {
        let bindings = std::mem::take(&mut self.by_element);
        self.by_path.clear();
        for (element, path) in bindings {
            let path = rebase(&path, old, new).unwrap_or(path);
            self.by_path.insert(path.clone(), element);
            self.by_element.insert(element, path);
        }
    }

    pub(crate) fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.by_element.retain(|_, path| keep(path));
        self.by_path.retain(|path, _| keep(path));
    }
}
