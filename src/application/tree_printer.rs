use std::fmt::Write as _;

use colored::Colorize;

use crate::explorer::Explorer;
use crate::path::{self, NodeKind};
use crate::project::ProjectMode;
use crate::storage::StorageBackend;

const INDENT: &str = "  ";

/// Renders the project tree one node per line, indented by depth. Folders
/// keep their trailing separator, unflushed nodes are marked with `*` and
/// the selection with `>`.
pub fn render_tree<B: StorageBackend>(explorer: &Explorer<B>, color: bool) -> String {
    let mut out = String::new();
    let header = format!("{} ({})", explorer.project().id, explorer.mode());
    let _ = writeln!(out, "{}", paint(header, color, |s| s.bold().to_string()));

    for node in explorer.tree().iter().skip(1) {
        // Tree paths never carry the store root.
        let depth = path::depth_of(node.path(), &ProjectMode::Temporary);
        let marker = if explorer.selected() == Some(node.path()) {
            ">"
        } else {
            " "
        };
        let name = match node.kind() {
            NodeKind::Folder => paint(
                format!("{}/", path::basename(node.path())),
                color,
                |s| s.blue().bold().to_string(),
            ),
            NodeKind::File => path::basename(node.path()).to_string(),
        };
        let dirty = if node.is_dirty() {
            paint(" *".to_string(), color, |s| s.yellow().to_string())
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "{marker}{}{name}{dirty}",
            INDENT.repeat(depth)
        );
    }
    out
}

fn paint(text: String, color: bool, style: impl Fn(&str) -> String) -> String {
    if color { style(&text) } else { text }
}
