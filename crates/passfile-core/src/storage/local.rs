//! Directory-backed file repository.
//!
//! Each (server identity, purpose) pair gets its own directory under the
//! store root, so data fetched from different servers never mixes:
//!
//! ```text
//! <root>/<server id>/passfiles/passfiles.json
//! <root>/<server id>/passfiles/12.pwd
//! <root>/<server id>/exports/12.pwd.json
//! ```

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{PassfileError, Result};
use crate::fs::replace_file;
use crate::storage::traits::FileRepository;

/// What a store directory is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Encrypted passfile content and the index file
    PassFiles,
    /// Decrypted exports written on explicit user request
    Exports,
}

impl Purpose {
    pub fn dir_name(self) -> &'static str {
        match self {
            Purpose::PassFiles => "passfiles",
            Purpose::Exports => "exports",
        }
    }
}

/// File repository rooted at one directory per server and purpose.
#[derive(Debug, Clone)]
pub struct LocalFileRepository {
    dir: PathBuf,
}

impl LocalFileRepository {
    pub fn new(root: impl AsRef<Path>, server_id: &str, purpose: Purpose) -> Self {
        let dir = root
            .as_ref()
            .join(sanitize_server_id(server_id))
            .join(purpose.dir_name());
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !valid {
            return Err(PassfileError::InvalidInput(format!(
                "Invalid store file name: {:?}",
                name
            )));
        }
        Ok(self.dir.join(name))
    }
}

/// Map a server identity (usually a URL) to a single directory name.
///
/// ASCII letters, digits and `-` are kept, as is `.` anywhere but the ends.
/// Every other byte, `_` included, becomes `_XX` in hex, so distinct ids
/// never share a directory. A blank id maps to `_`.
pub fn sanitize_server_id(server_id: &str) -> String {
    let trimmed = server_id.trim();
    if trimmed.is_empty() {
        return "_".to_string();
    }
    let last = trimmed.len() - 1;
    let mut sanitized = String::with_capacity(trimmed.len());
    for (position, byte) in trimmed.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || (byte == b'.' && position != 0 && position != last);
        if keep {
            sanitized.push(char::from(byte));
        } else {
            sanitized.push_str(&format!("_{:02X}", byte));
        }
    }
    sanitized
}

async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(PassfileError::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(PassfileError::Cancelled),
        result = operation => result.map_err(PassfileError::from),
    }
}

#[async_trait]
impl FileRepository for LocalFileRepository {
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let dir = self.dir.clone();
        cancellable(cancel, async move {
            let mut names = Vec::new();
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(names),
                Err(err) => return Err(err),
            };
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
            }
            names.sort();
            Ok(names)
        })
        .await
    }

    async fn exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool> {
        let path = self.path_for(name)?;
        cancellable(cancel, tokio::fs::try_exists(path)).await
    }

    async fn read_all_bytes(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        tracing::debug!("Reading {}", path.display());
        cancellable(cancel, tokio::fs::read(path)).await
    }

    async fn write_all_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = self.path_for(name)?;
        tracing::debug!("Writing {} ({} bytes)", path.display(), bytes.len());
        let dir = self.dir.clone();
        cancellable(cancel, async move {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(path, bytes).await
        })
        .await
    }

    async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        let path = self.path_for(name)?;
        tracing::debug!("Deleting {}", path.display());
        cancellable(cancel, async move {
            match tokio::fs::remove_file(path).await {
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        })
        .await
    }

    async fn rename(&self, from: &str, to: &str, cancel: &CancellationToken) -> Result<()> {
        let source = self.path_for(from)?;
        let destination = self.path_for(to)?;
        tracing::debug!("Renaming {} to {}", source.display(), destination.display());
        cancellable(cancel, async move {
            tokio::task::spawn_blocking(move || replace_file(&source, &destination))
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
        })
        .await
    }
}
