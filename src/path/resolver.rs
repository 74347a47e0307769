use snafu::{Snafu, ensure};

use crate::project::ProjectMode;

pub const SEPARATOR: char = '/';
pub const ROOT_DIR_PATH: &str = "/";

const FORBIDDEN_CHARS: [char; 2] = ['\0', '\\'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum PathError {
    #[snafu(display("Invalid path '{}': {}", path, reason))]
    InvalidPath { path: String, reason: &'static str },
}

/// Brings a user or backend supplied path into canonical form.
///
/// Repeated separators are collapsed, `.` and `..` segments are resolved and
/// a leading separator is added. The trailing separator is kept, so folder
/// paths stay folder paths; a path ending in `.` or `..` names a folder.
pub fn normalize(path: &str) -> Result<String, PathError> {
    ensure!(
        !path.contains(FORBIDDEN_CHARS),
        InvalidPathSnafu {
            path,
            reason: "contains a forbidden character"
        }
    );

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return InvalidPathSnafu {
                        path,
                        reason: "escapes the project root",
                    }
                    .fail();
                }
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        return Ok(ROOT_DIR_PATH.to_string());
    }

    let last = path.rsplit(SEPARATOR).next().unwrap_or_default();
    let is_folder = path.ends_with(SEPARATOR) || last == "." || last == "..";

    let mut normalized = String::with_capacity(path.len() + 2);
    for segment in segments {
        normalized.push(SEPARATOR);
        normalized.push_str(segment);
    }
    if is_folder {
        normalized.push(SEPARATOR);
    }
    Ok(normalized)
}

pub(crate) fn invalid_path(path: impl Into<String>, reason: &'static str) -> PathError {
    PathError::InvalidPath {
        path: path.into(),
        reason,
    }
}

pub fn classify(path: &str) -> NodeKind {
    if path.ends_with(SEPARATOR) {
        NodeKind::Folder
    } else {
        NodeKind::File
    }
}

/// Parent folder of a normalized path.
pub fn parent_of(path: &str) -> Result<String, PathError> {
    let trimmed = path.strip_suffix(SEPARATOR).unwrap_or(path);
    ensure!(
        !trimmed.is_empty(),
        InvalidPathSnafu {
            path,
            reason: "the project root has no parent"
        }
    );
    match trimmed.rfind(SEPARATOR) {
        Some(index) => Ok(trimmed[..=index].to_string()),
        None => Ok(ROOT_DIR_PATH.to_string()),
    }
}

/// Last segment of a path, without the trailing separator. Empty for the root.
pub fn basename(path: &str) -> &str {
    let trimmed = path.strip_suffix(SEPARATOR).unwrap_or(path);
    match trimmed.rfind(SEPARATOR) {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Extension of a file name. Folders and dotfiles without a second dot have none.
pub fn extension(path: &str) -> Option<&str> {
    if classify(path) == NodeKind::Folder {
        return None;
    }
    let name = basename(path);
    match name.rfind('.') {
        Some(index) if index > 0 && index + 1 < name.len() => Some(&name[index + 1..]),
        _ => None,
    }
}

/// Number of segments between the project root and `path`.
///
/// Temporary projects have no named root segment, so the leading empty
/// segment is simply skipped. Persisted paths are taken in store form (see
/// [`absolute`]) and are made project-relative before counting.
pub fn depth_of(path: &str, mode: &ProjectMode) -> usize {
    let project_path = match mode {
        ProjectMode::Temporary => path,
        ProjectMode::Persisted { root } => strip_store_root(path, root),
    };
    project_path
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .count()
}

/// Builds the path of a child named `name` inside the folder `parent`.
pub fn join(parent: &str, name: &str, kind: NodeKind) -> Result<String, PathError> {
    ensure!(
        classify(parent) == NodeKind::Folder,
        InvalidPathSnafu {
            path: parent,
            reason: "parent is not a folder"
        }
    );
    let name = validate_name(name)?;

    let mut path = String::with_capacity(parent.len() + name.len() + 1);
    path.push_str(parent);
    path.push_str(name);
    if kind == NodeKind::Folder {
        path.push(SEPARATOR);
    }
    Ok(path)
}

/// Root-relative display form: `/src/lib.rs` becomes `src/lib.rs`.
pub fn relative(path: &str) -> &str {
    path.trim_start_matches(SEPARATOR)
}

/// Path as the backing store addresses it.
pub fn absolute(path: &str, mode: &ProjectMode) -> String {
    match mode {
        ProjectMode::Temporary => path.to_string(),
        ProjectMode::Persisted { root } => format!("{SEPARATOR}{root}{path}"),
    }
}

/// Inverse of [`absolute`]; also accepts already project-rooted paths.
pub fn to_project_path(path: &str, mode: &ProjectMode) -> Result<String, PathError> {
    match mode {
        ProjectMode::Temporary => normalize(path),
        ProjectMode::Persisted { root } => normalize(strip_store_root(path, root)),
    }
}

/// Rewrites `path` when it lies at or below `old_prefix`.
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if path == old_prefix {
        return Some(new_prefix.to_string());
    }
    if classify(old_prefix) == NodeKind::Folder && path.starts_with(old_prefix) {
        return Some(format!("{new_prefix}{}", &path[old_prefix.len()..]));
    }
    None
}

pub fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor || (classify(ancestor) == NodeKind::Folder && path.starts_with(ancestor))
}

fn strip_store_root<'a>(path: &'a str, root: &str) -> &'a str {
    let Some(rest) = path.strip_prefix(SEPARATOR).and_then(|p| p.strip_prefix(root)) else {
        return path;
    };
    if rest.is_empty() {
        ROOT_DIR_PATH
    } else if rest.starts_with(SEPARATOR) {
        rest
    } else {
        path
    }
}

fn validate_name(name: &str) -> Result<&str, PathError> {
    let bare = name.strip_suffix(SEPARATOR).unwrap_or(name);
    ensure!(
        !bare.is_empty(),
        InvalidPathSnafu {
            path: name,
            reason: "name is empty"
        }
    );
    ensure!(
        bare != "." && bare != "..",
        InvalidPathSnafu {
            path: name,
            reason: "name is a relative segment"
        }
    );
    ensure!(
        !bare.contains(SEPARATOR),
        InvalidPathSnafu {
            path: name,
            reason: "name contains a separator"
        }
    );
    ensure!(
        !bare.contains(FORBIDDEN_CHARS),
        InvalidPathSnafu {
            path: name,
            reason: "contains a forbidden character"
        }
    );
    Ok(bare)
}
