use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use passfile_core::crypto::DEFAULT_MIN_PASSPHRASE_LENGTH;
use passfile_core::context::DEFAULT_PASSPHRASE_ATTEMPTS;
use passfile_core::ContextOptions;

#[derive(Debug, Serialize, Deserialize)]
pub struct PassfileConfig {
    pub store: StoreSection,
    pub server: ServerSection,
    #[serde(default)]
    pub security: SecuritySection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSection {
    pub root: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerSection {
    pub id: String,
    #[serde(default)]
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub passphrase_attempts: u32,
    pub min_passphrase_length: usize,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            passphrase_attempts: DEFAULT_PASSPHRASE_ATTEMPTS,
            min_passphrase_length: DEFAULT_MIN_PASSPHRASE_LENGTH,
        }
    }
}

impl PassfileConfig {
    pub fn new(root: PathBuf, server_id: String, user_id: i64) -> Self {
        Self {
            store: StoreSection {
                root: root.to_string_lossy().to_string(),
            },
            server: ServerSection {
                id: server_id,
                user_id,
            },
            security: SecuritySection::default(),
        }
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            server_id: self.server.id.clone(),
            user_id: self.server.user_id,
            passphrase_attempts: self.security.passphrase_attempts,
            min_passphrase_length: self.security.min_passphrase_length,
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_store_root() -> anyhow::Result<PathBuf> {
    xdg_data_dir()
}

pub fn read_config(path: &Path) -> anyhow::Result<PassfileConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &PassfileConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("passfile"));
        }
    }
    Ok(home_dir()?.join(".config").join("passfile"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("passfile"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("passfile"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
