use derive_more::{Display, From};
use snafu::{Snafu, ensure};

const TEMPORARY_PROJECT_ID: &str = "default_workspace";

/// Identity of a project in a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From)]
#[from(String, &'static str)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as a single file name component, for stores that keep one file
    /// per project.
    pub fn file_stem(&self) -> Result<&str, InvalidProjectName> {
        let name = self.as_str();
        ensure!(
            !name.is_empty(),
            InvalidProjectNameSnafu {
                name,
                reason: "is empty"
            }
        );
        ensure!(
            name != "." && name != "..",
            InvalidProjectNameSnafu {
                name,
                reason: "is a relative path component"
            }
        );
        ensure!(
            !name.contains(['/', '\\', '\0']),
            InvalidProjectNameSnafu {
                name,
                reason: "contains a separator or NUL"
            }
        );
        Ok(name)
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Project name '{}' {}", name, reason))]
pub struct InvalidProjectName {
    name: String,
    reason: &'static str,
}

/// Whether a project lives only in ephemeral storage or has a durable
/// backend identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum ProjectMode {
    #[display("temporary")]
    Temporary,
    /// `root` is the named root segment of the project in the backing store.
    #[display("persisted ({root})")]
    Persisted { root: String },
}

impl ProjectMode {
    pub fn persisted(root: impl Into<String>) -> Self {
        ProjectMode::Persisted { root: root.into() }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, ProjectMode::Temporary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub mode: ProjectMode,
}

impl Project {
    /// The scratch project opened when the user has not named one yet.
    pub fn temporary() -> Self {
        Self {
            id: TEMPORARY_PROJECT_ID.into(),
            mode: ProjectMode::Temporary,
        }
    }

    pub fn persisted(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: ProjectId::from(name.clone()),
            mode: ProjectMode::persisted(name),
        }
    }
}
