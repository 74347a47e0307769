use futures::{FutureExt, StreamExt};
use futures_channel::mpsc::UnboundedReceiver;
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::{Command, CommandError, RuntimeConfig};
use crate::config::{ConfigError, ExplorerConfig};
use crate::explorer::{Explorer, ExplorerError, SyncEvent};
use crate::project::Project;
use crate::storage::{DiskStore, MemoryStore, StorageBackend};

pub struct Application;

impl Application {
    pub async fn run(runtime_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let runtime_config: RuntimeConfig = runtime_config.into();
        let config = ExplorerConfig::read(&runtime_config.root)
            .await
            .context(ConfigSnafu)?;
        debug!("Loaded config: {:?}", config);

        let commands = runtime_config
            .commands
            .iter()
            .map(|line| Command::try_from(line.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .context(CommandParseSnafu)?;
        let store = DiskStore::new(runtime_config.root.join(&config.store_dir));

        match &runtime_config.project {
            Some(name) => {
                let mut explorer = Explorer::open(Project::persisted(name.as_str()), store, &config)
                    .await
                    .context(OpenSnafu)?;
                Self::execute(&mut explorer, &commands, runtime_config.color).await?;
                Self::shutdown(explorer).await
            }
            None => {
                let mut explorer = Explorer::open(Project::temporary(), MemoryStore::new(), &config)
                    .await
                    .context(OpenSnafu)?;
                Self::execute(&mut explorer, &commands, runtime_config.color).await?;

                match &runtime_config.persist_as {
                    Some(name) => {
                        let persisted = explorer
                            .persist(store, name.as_str())
                            .await
                            .context(PersistSnafu)?;
                        Self::shutdown(persisted).await
                    }
                    None => {
                        if explorer.tree().len() > 1 {
                            warn!("The temporary project is discarded on exit; pass --persist-as to keep it");
                        }
                        Self::shutdown(explorer).await
                    }
                }
            }
        }
    }

    async fn execute<B: StorageBackend>(
        explorer: &mut Explorer<B>,
        commands: &[Command],
        color: bool,
    ) -> Result<(), ApplicationError> {
        let mut events = explorer.subscribe();
        for command in commands {
            debug!("Running '{command}'");
            let output = command
                .apply(explorer, color)
                .await
                .context(CommandSnafu {
                    command: command.to_string(),
                })?;
            if let Some(output) = output {
                print!("{output}");
            }
            explorer.flush_if_due().await;
            report_events(&mut events);
        }

        explorer.run_until_idle().await;
        report_events(&mut events);
        Ok(())
    }

    async fn shutdown<B: StorageBackend>(mut explorer: Explorer<B>) -> Result<(), ApplicationError> {
        explorer.close().await.context(CloseSnafu)?;
        info!("Done with project '{}'", explorer.project().id);
        Ok(())
    }
}

fn report_events(events: &mut UnboundedReceiver<SyncEvent>) {
    while let Some(Some(event)) = events.next().now_or_never() {
        match event {
            SyncEvent::Flushed { records } => debug!("Stored {records} change(s)"),
            SyncEvent::FlushFailed { message, transient } => {
                warn!("Changes not stored yet (transient: {transient}): {message}")
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: ConfigError },
    #[snafu(display("Invalid command"))]
    CommandParseError { source: CommandError },
    #[snafu(display("Failed to open the project"))]
    OpenError { source: ExplorerError },
    #[snafu(display("Command '{}' failed", command))]
    CommandError {
        command: String,
        source: ExplorerError,
    },
    #[snafu(display("Failed to persist the temporary project"))]
    PersistError { source: ExplorerError },
    #[snafu(display("Failed to close the project"))]
    CloseError { source: ExplorerError },
}
