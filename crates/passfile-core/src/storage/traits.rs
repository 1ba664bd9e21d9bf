//! File repository trait definition.
//!
//! The `FileRepository` trait is the local persistence boundary of the core:
//! flat byte files addressed by name inside one directory. Implementations
//! make no atomicity promise; callers that need one write a temporary file
//! and `rename` it into place.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Byte storage keyed by file name.
///
/// Every operation takes a cancellation token and fails with
/// `PassfileError::Io` wrapping the OS error, or `PassfileError::Cancelled`.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Names of all files in the repository, sorted.
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<String>>;

    async fn exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool>;

    /// Read a whole file.
    ///
    /// # Errors
    ///
    /// Returns `PassfileError::Io` with `NotFound` kind if the file is missing.
    async fn read_all_bytes(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<u8>>;

    /// Create or replace a file.
    async fn write_all_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()>;

    /// Rename a file, replacing the destination if it exists.
    async fn rename(&self, from: &str, to: &str, cancel: &CancellationToken) -> Result<()>;
}
