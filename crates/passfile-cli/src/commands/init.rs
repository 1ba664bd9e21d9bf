use std::io::IsTerminal;
use std::path::PathBuf;

use dialoguer::Input;

use passfile_core::{LocalFileRepository, Purpose};

use crate::app::resolve_config_path;
use crate::cli::{Cli, InitArgs};
use crate::config::{default_store_root, write_config, PassfileConfig};

const DEFAULT_SERVER: &str = "local";

fn ask_server() -> anyhow::Result<String> {
    Input::<String>::new()
        .with_prompt("Server")
        .default(DEFAULT_SERVER.to_string())
        .interact_text()
        .map_err(|e| anyhow::anyhow!("Failed to read server: {}", e))
}

pub fn handle_init(cli: &Cli, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = resolve_config_path(cli)?;
    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        ));
    }

    let root = match args.root.as_deref() {
        Some(root) => PathBuf::from(root),
        None => default_store_root()?,
    };
    let server = match args.server.clone() {
        Some(server) => server,
        None if std::io::stdin().is_terminal() => ask_server()?,
        None => DEFAULT_SERVER.to_string(),
    };
    let server = server.trim().to_string();
    if server.is_empty() {
        return Err(anyhow::anyhow!("Server cannot be empty"));
    }

    let config = PassfileConfig::new(root, server, args.user_id.unwrap_or(0));
    let store = LocalFileRepository::new(&config.store.root, &config.server.id, Purpose::PassFiles);
    std::fs::create_dir_all(store.dir()).map_err(|e| {
        anyhow::anyhow!(
            "Failed to create store directory {}: {}",
            store.dir().display(),
            e
        )
    })?;
    write_config(&config_path, &config)?;
    tracing::info!("Wrote config to {}", config_path.display());

    if !cli.quiet {
        println!("Initialized passfile store at {}", store.dir().display());
        println!("Config: {}", config_path.display());
    }
    Ok(())
}
