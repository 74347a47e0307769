use bincode::{Decode, Encode};
use hashlink::LinkedHashMap;
use snafu::Snafu;

use crate::path::{ROOT_DIR_PATH, is_within, parent_of, rebase};
use crate::sync::{ChangeOp, ChangeRecord};

/// Durable form of a project: its nodes in pre-order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct ProjectSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SnapshotEntry {
    pub path: String,
    /// `None` for folders.
    pub content: Option<Vec<u8>>,
}

impl ProjectSnapshot {
    /// Applies a change set in order. Either every record applies or the
    /// snapshot is left unchanged.
    pub fn apply(&mut self, changes: &[ChangeRecord]) -> Result<(), SnapshotConflict> {
        let mut entries = self
            .entries
            .iter()
            .map(|entry| (entry.path.clone(), entry.content.clone()))
            .collect::<LinkedHashMap<_, _>>();

        for record in changes {
            apply_record(&mut entries, record)?;
        }

        self.entries = entries
            .into_iter()
            .map(|(path, content)| SnapshotEntry { path, content })
            .collect();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type Entries = LinkedHashMap<String, Option<Vec<u8>>>;

fn apply_record(entries: &mut Entries, record: &ChangeRecord) -> Result<(), SnapshotConflict> {
    let path = record.path.as_str();
    match &record.op {
        ChangeOp::Create { content } => {
            if entries.contains_key(path) {
                return Err(conflict(path, "already exists"));
            }
            if !parent_exists(entries, path) {
                return Err(conflict(path, "parent is missing"));
            }
            entries.insert(path.to_string(), content.clone());
        }
        ChangeOp::Write { content } => match entries.get_mut(path) {
            Some(slot) => *slot = Some(content.clone()),
            None => return Err(conflict(path, "does not exist")),
        },
        ChangeOp::Remove => {
            if !entries.contains_key(path) {
                return Err(conflict(path, "does not exist"));
            }
            entries.retain(|entry, _| !is_within(entry, path));
        }
        ChangeOp::Rename { to } => {
            if !entries.contains_key(path) {
                return Err(conflict(path, "does not exist"));
            }
            if entries.contains_key(to.as_str()) {
                return Err(conflict(to, "already exists"));
            }
            if !parent_exists(entries, to) {
                return Err(conflict(to, "parent is missing"));
            }
            let rename_in_place = parent_of(path).ok() == parent_of(to).ok();
            let current = std::mem::take(entries);
            *entries = if rename_in_place {
                current
                    .into_iter()
                    .map(|(entry, content)| (rebase(&entry, path, to).unwrap_or(entry), content))
                    .collect()
            } else {
                let (moved, mut kept): (Vec<_>, Vec<_>) = current
                    .into_iter()
                    .partition(|(entry, _)| is_within(entry, path));
                kept.extend(
                    moved
                        .into_iter()
                        .map(|(entry, content)| (rebase(&entry, path, to).unwrap_or(entry), content)),
                );
                kept.into_iter().collect()
            };
        }
    }
    Ok(())
}

fn parent_exists(entries: &Entries, path: &str) -> bool {
    match parent_of(path) {
        Ok(parent) => parent == ROOT_DIR_PATH || entries.contains_key(&parent),
        Err(_) => false,
    }
}

fn conflict(path: &str, reason: &'static str) -> SnapshotConflict {
    SnapshotConflict {
        path: path.to_string(),
        reason,
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Change to '{}' does not apply: {}", path, reason))]
pub struct SnapshotConflict {
    path: String,
    reason: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::ProjectTree;

    fn folder(path: &str) -> ChangeRecord {
        ChangeRecord::create(path, None)
    }

    fn file(path: &str, content: &str) -> ChangeRecord {
        ChangeRecord::create(path, Some(content.as_bytes().to_vec()))
    }

    fn paths(snapshot: &ProjectSnapshot) -> Vec<&str> {
        snapshot.entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn applies_records_in_order() {
        let mut snapshot = ProjectSnapshot::default();
        snapshot
            .apply(&[
                folder("/src/"),
                file("/src/lib.rs", ""),
                ChangeRecord::write("/src/lib.rs", b"mod a;".to_vec()),
                folder("/docs/"),
                ChangeRecord::remove("/docs/"),
            ])
            .unwrap();

        assert_eq!(paths(&snapshot), vec!["/src/", "/src/lib.rs"]);
        assert_eq!(snapshot.entries[1].content.as_deref(), Some(&b"mod a;"[..]));
    }

    #[test]
    fn rename_in_place_keeps_order_and_move_appends() {
        let mut snapshot = ProjectSnapshot::default();
        snapshot
            .apply(&[
                folder("/a/"),
                file("/a/x.rs", ""),
                folder("/b/"),
                ChangeRecord::rename("/a/", "/c/"),
            ])
            .unwrap();
        assert_eq!(paths(&snapshot), vec!["/c/", "/c/x.rs", "/b/"]);

        snapshot
            .apply(&[ChangeRecord::rename("/c/x.rs", "/b/x.rs")])
            .unwrap();
        assert_eq!(paths(&snapshot), vec!["/c/", "/b/", "/b/x.rs"]);
        assert!(ProjectTree::from_snapshot(&snapshot).is_ok());
    }

    #[test]
    fn conflicting_change_set_leaves_snapshot_unchanged() {
        let mut snapshot = ProjectSnapshot::default();
        snapshot.apply(&[folder("/src/")]).unwrap();
        let before = snapshot.clone();

        let result = snapshot.apply(&[file("/src/a.rs", ""), folder("/src/")]);

        assert!(result.is_err());
        assert_eq!(snapshot, before);
    }

    #[test]
    fn create_requires_parent() {
        let mut snapshot = ProjectSnapshot::default();
        assert!(snapshot.apply(&[file("/missing/a.rs", "")]).is_err());
    }
}
