use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Drives a project explorer with a script of commands, e.g.
/// `explorer -p demo "mkdir src" "new lib.rs" tree`.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Commands to run in order: new, mkdir, select, context, rename, mv,
    /// rm, open, write, flush, tree
    pub commands: Vec<String>,

    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// The workspace directory holding explorer.yaml and the project store
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,

    /// Persisted project to open instead of a temporary one
    #[clap(long, short)]
    pub project: Option<String>,

    /// Persist the temporary project under this name when done
    #[clap(long, conflicts_with = "project")]
    pub persist_as: Option<String>,

    #[clap(long)]
    pub no_color: bool,
}
