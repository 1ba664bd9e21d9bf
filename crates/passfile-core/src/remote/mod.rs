//! Remote passfile API boundary.
//!
//! The core never talks HTTP itself; it consumes a [`RemoteApi`]. Uploads
//! are conditional on the version the client last saw, so a stale upload is
//! rejected with `PassfileError::VersionConflict` instead of overwriting
//! someone else's changes.

pub mod memory;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model::{PassFileId, PassFileInfo};

pub use memory::MemoryRemote;

/// Remote authority for a user's passfiles.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Metadata of every passfile the user owns remotely.
    async fn list_infos(&self, cancel: &CancellationToken) -> Result<Vec<PassFileInfo>>;

    /// Metadata of one passfile, `None` if it no longer exists remotely.
    async fn fetch_info(
        &self,
        id: PassFileId,
        cancel: &CancellationToken,
    ) -> Result<Option<PassFileInfo>>;

    /// Encrypted content of the current remote version.
    async fn fetch_content(&self, id: PassFileId, cancel: &CancellationToken) -> Result<Vec<u8>>;

    /// First upload of a locally created passfile; the server assigns the id.
    async fn create(
        &self,
        info: &PassFileInfo,
        content: &[u8],
        cancel: &CancellationToken,
    ) -> Result<PassFileInfo>;

    /// Upload new content if the remote is still at `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `PassfileError::VersionConflict` if the remote moved on.
    async fn upload(
        &self,
        id: PassFileId,
        content: &[u8],
        expected_version: u32,
        cancel: &CancellationToken,
    ) -> Result<PassFileInfo>;

    /// Change name and color without touching content.
    async fn patch_info(
        &self,
        id: PassFileId,
        name: &str,
        color: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PassFileInfo>;

    /// Delete a passfile; the server checks `confirmation_secret`.
    async fn delete(
        &self,
        id: PassFileId,
        confirmation_secret: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
