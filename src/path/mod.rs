//! Path algebra for project-rooted paths.
//!
//! Every path handled by the explorer is absolute with respect to the project
//! root, uses `/` as separator and marks folders with a trailing `/`.
//! The functions here are pure and never touch the tree.

mod resolver;

pub use resolver::{
    NodeKind, PathError, ROOT_DIR_PATH, SEPARATOR, absolute, basename, classify, depth_of,
    extension, is_within, join, normalize, parent_of, rebase, relative, to_project_path,
};
pub(crate) use resolver::invalid_path;
