mod application;
mod command;
pub mod data;
mod runtime_config;
mod tree_printer;

pub use application::{Application, ApplicationError};
pub use command::{Command, CommandError};
pub use runtime_config::RuntimeConfig;
pub use tree_printer::render_tree;
