//! Passfile layout on top of a [`FileRepository`].
//!
//! - `passfiles.json`: index of every known passfile (metadata, versions,
//!   marks, origin, tombstone), so listing never decrypts content
//! - `<id>.<ext>`: current encrypted content
//! - `<id>.<ext>.origin`: encrypted content as of the recorded origin, the
//!   baseline for three-way merges
//!
//! The index is replaced through a temporary file and a rename. Content is
//! first written as `<name>.v<version>.staged` and renamed into place only
//! after the index recording that version is written, so the index is the
//! commit record. Index writes are serialized by their own lock; content
//! files are only written under the owning passfile's mutation lock.

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{PassfileError, Result};
use crate::model::{PassFile, PassFileId, PassFileType};
use crate::storage::traits::FileRepository;

/// Name of the index file.
pub const INDEX_FILE: &str = "passfiles.json";

/// Current index format version.
const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    format_version: u32,
    passfiles: Vec<PassFile>,
}

/// Which copy of a passfile's content a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSlot {
    Current,
    Origin,
}

/// Content file name for a passfile.
pub fn content_file_name(id: PassFileId, passfile_type: PassFileType, slot: ContentSlot) -> String {
    match slot {
        ContentSlot::Current => format!("{}.{}", id, passfile_type.extension()),
        ContentSlot::Origin => format!("{}.{}.origin", id, passfile_type.extension()),
    }
}

/// Content written under a staging name, waiting for its index commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedContent {
    name: String,
    target: String,
}

impl StagedContent {
    /// Live file name the content is promoted to.
    pub fn target(&self) -> &str {
        &self.target
    }
}

fn staged_file_name(target: &str, version: u32) -> String {
    format!("{}.v{}.staged", target, version)
}

fn parse_staged_file_name(name: &str) -> Option<(&str, u32)> {
    let (target, version) = name.strip_suffix(".staged")?.rsplit_once(".v")?;
    Some((target, version.parse().ok()?))
}

/// Passfile-aware access to one store directory.
#[derive(Clone)]
pub struct PassFileStore {
    repository: Arc<dyn FileRepository>,
    index_lock: Arc<Mutex<()>>,
}

impl PassFileStore {
    pub fn new(repository: Arc<dyn FileRepository>) -> Self {
        Self {
            repository,
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn repository(&self) -> &Arc<dyn FileRepository> {
        &self.repository
    }

    /// Read the index. A store without an index is empty.
    pub async fn read_index(&self, cancel: &CancellationToken) -> Result<Vec<PassFile>> {
        let _guard = self.index_lock.lock().await;
        let bytes = match self.repository.read_all_bytes(INDEX_FILE, cancel).await {
            Ok(bytes) => bytes,
            Err(PassfileError::Io { source }) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(Vec::new())
            }
            Err(err) => return Err(err),
        };
        let index: IndexFile = serde_json::from_slice(&bytes).map_err(|e| {
            PassfileError::ContentCorrupt(format!("Index file is unreadable: {}", e))
        })?;
        if index.format_version > INDEX_FORMAT_VERSION {
            return Err(PassfileError::ContentCorrupt(format!(
                "Index format {} is newer than supported {}",
                index.format_version, INDEX_FORMAT_VERSION
            )));
        }
        Ok(index.passfiles)
    }

    /// Replace the index with `passfiles`.
    pub async fn write_index(
        &self,
        passfiles: Vec<PassFile>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let index = IndexFile {
            format_version: INDEX_FORMAT_VERSION,
            passfiles,
        };
        let bytes = serde_json::to_vec_pretty(&index)?;
        let _guard = self.index_lock.lock().await;
        self.replace(INDEX_FILE, &bytes, cancel).await
    }

    /// Read content bytes, `None` if the file does not exist.
    pub async fn read_content(
        &self,
        passfile: &PassFile,
        slot: ContentSlot,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        let name = content_file_name(passfile.id, passfile.passfile_type, slot);
        match self.repository.read_all_bytes(&name, cancel).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(PassfileError::Io { source }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Remove both content files of a passfile.
    pub async fn remove_content(
        &self,
        id: PassFileId,
        passfile_type: PassFileType,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for slot in [ContentSlot::Current, ContentSlot::Origin] {
            let name = content_file_name(id, passfile_type, slot);
            self.repository.delete(&name, cancel).await?;
        }
        Ok(())
    }

    /// Write content under a staging name. Nothing reads it until
    /// [`promote_staged`](Self::promote_staged) moves it into place.
    ///
    /// The staging name carries the passfile version the bytes belong to,
    /// so [`recover_staged`](Self::recover_staged) can tell committed
    /// content from abandoned content after a crash.
    pub async fn stage_content(
        &self,
        passfile: &PassFile,
        slot: ContentSlot,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<StagedContent> {
        let target = content_file_name(passfile.id, passfile.passfile_type, slot);
        let staged = StagedContent {
            name: staged_file_name(&target, passfile.version),
            target,
        };
        self.repository
            .write_all_bytes(&staged.name, bytes, cancel)
            .await?;
        Ok(staged)
    }

    /// Move staged content over the live files.
    pub async fn promote_staged(
        &self,
        staged: &[StagedContent],
        cancel: &CancellationToken,
    ) -> Result<()> {
        for file in staged {
            self.repository.rename(&file.name, &file.target, cancel).await?;
        }
        Ok(())
    }

    /// Drop staged content of a change that did not commit.
    pub async fn discard_staged(&self, staged: &[StagedContent]) {
        let cancel = CancellationToken::new();
        for file in staged {
            if let Err(err) = self.repository.delete(&file.name, &cancel).await {
                warn!("Could not remove staged file {}: {}", file.name, err);
            }
        }
    }

    /// Finish or roll back changes interrupted between staging and promotion.
    ///
    /// A staged file whose passfile the index records at the staged version
    /// was committed and is promoted; any other staged or temporary file is
    /// removed. Returns the number of files promoted.
    pub async fn recover_staged(
        &self,
        passfiles: &[PassFile],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut promoted = 0;
        for name in self.repository.list(cancel).await? {
            if name.ends_with(".tmp") {
                self.repository.delete(&name, cancel).await?;
                continue;
            }
            let Some((target, version)) = parse_staged_file_name(&name) else {
                continue;
            };
            let committed = passfiles.iter().any(|passfile| {
                passfile.version == version
                    && [ContentSlot::Current, ContentSlot::Origin].iter().any(|slot| {
                        content_file_name(passfile.id, passfile.passfile_type, *slot) == target
                    })
            });
            if committed {
                info!("Promoting committed content {} left staged", target);
                self.repository.rename(&name, target, cancel).await?;
                promoted += 1;
            } else {
                debug!("Removing abandoned staged file {}", name);
                self.repository.delete(&name, cancel).await?;
            }
        }
        Ok(promoted)
    }

    async fn replace(&self, name: &str, bytes: &[u8], cancel: &CancellationToken) -> Result<()> {
        let temp = format!("{}.tmp", name);
        self.repository.write_all_bytes(&temp, bytes, cancel).await?;
        if let Err(err) = self.repository.rename(&temp, name, cancel).await {
            let _ = self.repository.delete(&temp, &CancellationToken::new()).await;
            return Err(err);
        }
        Ok(())
    }
}
