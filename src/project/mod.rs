mod project;

pub use project::{InvalidProjectName, Project, ProjectId, ProjectMode};
