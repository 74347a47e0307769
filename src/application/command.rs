use derive_more::Display;
use snafu::Snafu;
use tracing::info;

use crate::application::tree_printer::render_tree;
use crate::explorer::{Explorer, ExplorerError};
use crate::path::NodeKind;
use crate::storage::StorageBackend;

const VERBS: [&str; 11] = [
    "new", "mkdir", "select", "context", "rename", "mv", "rm", "open", "write", "flush", "tree",
];

/// One step of a scripted explorer session, e.g. `mkdir src` or
/// `rename /src/ app`.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Command {
    #[display("new {name}")]
    New { name: String },
    #[display("mkdir {name}")]
    Mkdir { name: String },
    #[display("select {}", path.as_deref().unwrap_or("-"))]
    Select { path: Option<String> },
    #[display("context {path}")]
    Context { path: String },
    #[display("rename {path} {name}")]
    Rename { path: String, name: String },
    #[display("mv {path} {folder}")]
    Move { path: String, folder: String },
    #[display("rm {path}")]
    Remove { path: String },
    #[display("open {path}")]
    Open { path: String },
    #[display("write {path}")]
    Write { path: String, content: String },
    #[display("flush")]
    Flush,
    #[display("tree")]
    Tree,
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let words = line.split_whitespace().collect::<Vec<_>>();
        let command = match words.as_slice() {
            [] => return EmptyCommandSnafu.fail(),
            ["new", name] => Command::New {
                name: name.to_string(),
            },
            ["mkdir", name] => Command::Mkdir {
                name: name.to_string(),
            },
            ["select"] => Command::Select { path: None },
            ["select", path] => Command::Select {
                path: Some(path.to_string()),
            },
            ["context", path] => Command::Context {
                path: path.to_string(),
            },
            ["rename", path, name] => Command::Rename {
                path: path.to_string(),
                name: name.to_string(),
            },
            ["mv", path, folder] => Command::Move {
                path: path.to_string(),
                folder: folder.to_string(),
            },
            ["rm", path] => Command::Remove {
                path: path.to_string(),
            },
            ["open", path] => Command::Open {
                path: path.to_string(),
            },
            ["write", path, content @ ..] => Command::Write {
                path: path.to_string(),
                content: content.join(" "),
            },
            ["flush"] => Command::Flush,
            ["tree"] => Command::Tree,
            [verb, ..] if VERBS.contains(verb) => {
                return InvalidArgumentsSnafu { line: line.trim() }.fail();
            }
            [verb, ..] => return UnknownCommandSnafu { verb: *verb }.fail(),
        };
        Ok(command)
    }
}

impl Command {
    /// Runs the command against an open explorer. Returns text to show the
    /// user, if the command produces any.
    pub async fn apply<B: StorageBackend>(
        &self,
        explorer: &mut Explorer<B>,
        color: bool,
    ) -> Result<Option<String>, ExplorerError> {
        match self {
            Command::New { name } => {
                explorer.new_item(name, None)?;
            }
            Command::Mkdir { name } => {
                explorer.new_item(name, Some(NodeKind::Folder))?;
            }
            Command::Select { path } => explorer.select(path.as_deref())?,
            Command::Context { path } => explorer.select_context(Some(path.as_str()))?,
            Command::Rename { path, name } => {
                explorer.rename(path, name)?;
            }
            Command::Move { path, folder } => {
                explorer.move_to(path, folder)?;
            }
            Command::Remove { path } => {
                explorer.remove(path)?;
            }
            Command::Open { path } => explorer.open_file(path)?,
            Command::Write { path, content } => {
                explorer.write(path, content.clone().into_bytes())?;
            }
            Command::Flush => {
                let records = explorer.flush().await?;
                info!("Flushed {records} change(s)");
            }
            Command::Tree => return Ok(Some(render_tree(explorer, color))),
        }
        Ok(None)
    }
}

#[derive(Debug, Snafu)]
pub enum CommandError {
    #[snafu(display("Empty command"))]
    EmptyCommand,
    #[snafu(display("Unknown command '{}'", verb))]
    UnknownCommand { verb: String },
    #[snafu(display("Wrong arguments in '{}'", line))]
    InvalidArguments { line: String },
}
