use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use passfile_core::{LocalFileRepository, MemoryRemote, PassFileContext, PassFileStore, Purpose};

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, PassfileConfig};
use crate::helpers::TerminalPrompt;

pub fn resolve_config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli.config.as_deref() {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    default_config_path()
}

pub fn load_config(cli: &Cli) -> anyhow::Result<PassfileConfig> {
    let config_path = resolve_config_path(cli)?;
    if !config_path.exists() {
        return Err(anyhow::anyhow!(missing_config_message(&config_path)));
    }
    read_config(&config_path)
}

fn missing_config_message(path: &std::path::Path) -> String {
    format!(
        "No passfile config found at {}. Run `passfile init` first.",
        path.display()
    )
}

/// Everything a command needs: the loaded context and where it lives.
pub struct App {
    pub config: PassfileConfig,
    pub context: PassFileContext,
    pub cancel: CancellationToken,
}

impl App {
    /// Load the passfile index for the configured server.
    ///
    /// No server client ships with the CLI, so the context gets an offline
    /// remote and works purely on the local store.
    pub async fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config = load_config(cli)?;
        let options = config.context_options();
        let repository =
            LocalFileRepository::new(&config.store.root, &options.server_id, Purpose::PassFiles);
        tracing::debug!("Opening passfile store at {}", repository.dir().display());

        let remote = Arc::new(MemoryRemote::new(options.user_id, String::new()));
        remote.set_offline(true);

        let context = PassFileContext::new(
            PassFileStore::new(Arc::new(repository)),
            remote,
            Arc::new(TerminalPrompt::new()),
            options,
        );
        let cancel = CancellationToken::new();
        context.load(&cancel).await?;
        Ok(Self {
            config,
            context,
            cancel,
        })
    }

    /// Repository for decrypted exports, next to the passfile store.
    pub fn exports(&self) -> LocalFileRepository {
        LocalFileRepository::new(
            &self.config.store.root,
            &self.config.server.id,
            Purpose::Exports,
        )
    }
}
