use std::path::PathBuf;

use crate::cli::Cli;

/// What a single invocation works on, taken from the command line.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub root: PathBuf,
    /// Persisted project to open; a temporary project when absent.
    pub project: Option<String>,
    /// Name to persist the temporary project under once the commands ran.
    pub persist_as: Option<String>,
    pub commands: Vec<String>,
    pub color: bool,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        let color = !cli.no_color
            && supports_color::on(supports_color::Stream::Stdout).is_some();
        Self {
            root: cli.root,
            project: cli.project,
            persist_as: cli.persist_as,
            commands: cli.commands,
            color,
        }
    }
}
