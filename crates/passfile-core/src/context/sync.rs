//! Remote synchronization.
//!
//! A sync never decrypts content and never overwrites remote changes:
//! uploads are conditional on the recorded origin version, and a remote
//! that moved while local content changed too ends in `NeedsMerge`.
//! Remote failures become error marks on the passfile instead of errors.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::{ContextEvent, PassFileContext, PromptRequest};
use crate::error::{PassfileError, Result};
use crate::model::{
    ErrorKind, PassFile, PassFileContent, PassFileId, PassFileInfo, PassFileMark,
};
use crate::storage::ContentSlot;

/// What a sync did to one passfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    UpToDate,
    /// Tombstoned passfiles are only touched by `delete_remote`.
    Skipped,
    /// First upload; the passfile now lives under the server's id.
    Created { id: PassFileId },
    /// The remote copy was gone, so local changes became a new passfile.
    Recreated { id: PassFileId },
    Uploaded,
    Downloaded,
    /// Only name or color changed hands.
    InfoUpdated,
    NeedsMerge,
    /// Gone from the local store.
    Removed,
    /// A remote call failed and the matching error mark is set.
    Failed(ErrorKind),
}

impl PassFileContext {
    /// Bring one passfile in line with the remote.
    ///
    /// # Errors
    ///
    /// Remote failures are reported as [`SyncOutcome::Failed`]; only local
    /// failures, `Cancelled` and `ConcurrentMutation` are returned as errors.
    pub async fn sync(&self, id: PassFileId, cancel: &CancellationToken) -> Result<SyncOutcome> {
        let _guard = self.locks.try_acquire(id)?;
        let (passfile, content) = self.snapshot(id)?;
        if passfile.is_deleted() {
            return Ok(SyncOutcome::Skipped);
        }
        if passfile.is_local_only() {
            return self.upload_new(passfile, content, false, cancel).await;
        }

        let remote = match self.remote.fetch_info(id, cancel).await {
            Ok(remote) => remote,
            Err(err) => {
                return self
                    .record_failure(passfile, content, ErrorKind::Downloading, err)
                    .await
            }
        };
        match remote {
            Some(remote) => self.reconcile(passfile, content, remote, cancel).await,
            None if passfile.is_modified() => {
                info!(
                    "Passfile {} is gone remotely; uploading local changes as a new passfile",
                    id
                );
                self.upload_new(passfile, content, true, cancel).await
            }
            None => {
                info!("Passfile {} is gone remotely; removing local copy", id);
                self.remove_entry(&passfile).await?;
                Ok(SyncOutcome::Removed)
            }
        }
    }

    /// Sync every known passfile, then download passfiles that only exist
    /// remotely. Passfiles busy with another mutation are skipped.
    pub async fn sync_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(PassFileId, SyncOutcome)>> {
        let remote_infos = match self.remote.list_infos(cancel).await {
            Ok(infos) => infos,
            Err(PassfileError::Cancelled) => return Err(PassfileError::Cancelled),
            Err(err) => {
                warn!("Could not list remote passfiles: {}", err);
                Vec::new()
            }
        };

        let mut outcomes = Vec::new();
        for id in self.ids() {
            match self.sync(id, cancel).await {
                Ok(outcome) => outcomes.push((id, outcome)),
                Err(PassfileError::ConcurrentMutation(_)) => {
                    debug!("Skipping passfile {} while it is being modified", id);
                }
                Err(PassfileError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        for info in remote_infos {
            if self.contains(info.id) {
                continue;
            }
            match self.fetch_new(&info, cancel).await {
                Ok(()) => outcomes.push((info.id, SyncOutcome::Downloaded)),
                Err(err) if err.is_remote() => {
                    warn!("Could not download new passfile {}: {}", info.id, err);
                }
                Err(PassfileError::ConcurrentMutation(_)) => {}
                Err(err) => return Err(err),
            }
        }

        info!("Synced {} passfile(s)", outcomes.len());
        Ok(outcomes)
    }

    /// Delete a tombstoned passfile on the server, then locally.
    ///
    /// The prompt supplies the confirmation secret the server checks. On a
    /// remote failure the tombstone stays and `remote_deleting_error` is set.
    pub async fn delete_remote(
        &self,
        id: PassFileId,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let _guard = self.locks.try_acquire(id)?;
        let (passfile, content) = self.snapshot(id)?;
        if !passfile.is_deleted() {
            return Err(PassfileError::InvalidInput(format!(
                "Passfile {} must be deleted locally first",
                id
            )));
        }
        if passfile.is_local_only() {
            self.remove_entry(&passfile).await?;
            return Ok(SyncOutcome::Removed);
        }

        let secret = self
            .prompt
            .ask(PromptRequest::delete_confirmation(&passfile.name))
            .await
            .map(Zeroizing::new)
            .ok_or(PassfileError::Cancelled)?;
        match self.remote.delete(id, &secret, cancel).await {
            Ok(()) => {
                info!("Deleted passfile {} remotely", id);
                self.remove_entry(&passfile).await?;
                Ok(SyncOutcome::Removed)
            }
            Err(err) => {
                self.record_failure(passfile, content, ErrorKind::RemoteDeleting, err)
                    .await
            }
        }
    }

    async fn reconcile(
        &self,
        mut passfile: PassFile,
        content: PassFileContent,
        mut remote: PassFileInfo,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let id = passfile.id;
        let Some(origin) = passfile.origin.clone() else {
            warn!("Passfile {} has no recorded origin; adopting the remote copy", id);
            return self.download(passfile, content, &remote, cancel).await;
        };
        let before = passfile.clone();

        // Name and color first, so an upload below records the final info.
        let local_info_changed = passfile.info_modified();
        let remote_info_changed = origin.name != remote.name || origin.color != remote.color;
        let infos_differ = passfile.name != remote.name || passfile.color != remote.color;
        let mut info_outcome = SyncOutcome::UpToDate;
        if infos_differ && (local_info_changed || remote_info_changed) {
            let local_wins = local_info_changed
                && (!remote_info_changed || passfile.info_changed_on >= remote.info_changed_on);
            if local_wins {
                match self
                    .remote
                    .patch_info(id, &passfile.name, passfile.color.as_deref(), cancel)
                    .await
                {
                    Ok(patched) => remote = patched,
                    Err(err) => {
                        return self
                            .record_failure(passfile, content, ErrorKind::Uploading, err)
                            .await
                    }
                }
            } else {
                passfile.adopt_info(&remote);
            }
            info_outcome = SyncOutcome::InfoUpdated;
        }
        if let Some(recorded) = passfile.origin.as_mut() {
            recorded.name = remote.name.clone();
            recorded.color = remote.color.clone();
            recorded.info_changed_on = remote.info_changed_on;
        }

        if remote.version != origin.version {
            if passfile.content_modified() || passfile.mark.needs_merge {
                if !passfile.mark.needs_merge {
                    warn!(
                        "Passfile {} changed locally and remotely (origin {}, remote {}); merge needed",
                        id, origin.version, remote.version
                    );
                }
                passfile.mark.clear_errors();
                passfile.mark.needs_merge = true;
                passfile.mark.merged = false;
                self.persist(None, passfile, content, &[], ContextEvent::Changed(id))
                    .await?;
                return Ok(SyncOutcome::NeedsMerge);
            }
            return self.download(passfile, content, &remote, cancel).await;
        }

        if passfile.content_modified() {
            return self.upload(passfile, content, origin.version, cancel).await;
        }

        passfile.mark.clear_errors();
        if passfile != before {
            self.persist(None, passfile, content, &[], ContextEvent::Changed(id))
                .await?;
        }
        Ok(info_outcome)
    }

    async fn upload(
        &self,
        mut passfile: PassFile,
        content: PassFileContent,
        expected_version: u32,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let id = passfile.id;
        let encrypted = self.encrypted_bytes(&passfile, &content, cancel).await?;
        match self
            .remote
            .upload(id, &encrypted, expected_version, cancel)
            .await
        {
            Ok(uploaded) => {
                passfile.adopt_version(&uploaded);
                passfile.record_origin(&uploaded);
                passfile.mark = PassFileMark::default();
                info!("Uploaded passfile {} as version {}", id, uploaded.version);
                self.persist(
                    None,
                    passfile,
                    content,
                    &[(ContentSlot::Origin, encrypted.as_slice())],
                    ContextEvent::Changed(id),
                )
                .await?;
                Ok(SyncOutcome::Uploaded)
            }
            Err(PassfileError::VersionConflict { expected, actual }) => {
                warn!(
                    "Upload of passfile {} rejected (expected version {}, remote at {}); merge needed",
                    id, expected, actual
                );
                passfile.mark.clear_errors();
                passfile.mark.needs_merge = true;
                passfile.mark.merged = false;
                self.persist(None, passfile, content, &[], ContextEvent::Changed(id))
                    .await?;
                Ok(SyncOutcome::NeedsMerge)
            }
            Err(err) => {
                self.record_failure(passfile, content, ErrorKind::Uploading, err)
                    .await
            }
        }
    }

    async fn download(
        &self,
        mut passfile: PassFile,
        content: PassFileContent,
        remote: &PassFileInfo,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let id = passfile.id;
        let encrypted = match self.remote.fetch_content(id, cancel).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return self
                    .record_failure(passfile, content, ErrorKind::Downloading, err)
                    .await
            }
        };
        passfile.adopt_info(remote);
        passfile.adopt_version(remote);
        passfile.record_origin(remote);
        passfile.mark = PassFileMark::default();
        let content = PassFileContent::from_encrypted(passfile.passfile_type, encrypted.clone());

        info!("Downloaded passfile {} version {}", id, remote.version);
        self.persist(
            None,
            passfile,
            content,
            &[
                (ContentSlot::Current, encrypted.as_slice()),
                (ContentSlot::Origin, encrypted.as_slice()),
            ],
            ContextEvent::Changed(id),
        )
        .await?;
        Ok(SyncOutcome::Downloaded)
    }

    /// Upload a passfile the server does not know (yet or anymore).
    async fn upload_new(
        &self,
        mut passfile: PassFile,
        mut content: PassFileContent,
        recreated: bool,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let old_id = passfile.id;
        let encrypted = self.encrypted_bytes(&passfile, &content, cancel).await?;
        let created = match self
            .remote
            .create(&passfile.to_info(), &encrypted, cancel)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                return self
                    .record_failure(passfile, content, ErrorKind::Uploading, err)
                    .await
            }
        };

        // The server copy exists now; its id must be recorded locally.
        let _new_guard = self.locks.acquire(created.id).await;
        passfile.id = created.id;
        passfile.adopt_info(&created);
        passfile.adopt_version(&created);
        passfile.record_origin(&created);
        passfile.mark = PassFileMark::default();
        content.set_encrypted(encrypted.clone());

        info!("Uploaded passfile {} as {}", old_id, created.id);
        self.persist(
            Some(old_id),
            passfile,
            content,
            &[
                (ContentSlot::Current, encrypted.as_slice()),
                (ContentSlot::Origin, encrypted.as_slice()),
            ],
            ContextEvent::Rekeyed {
                old: old_id,
                new: created.id,
            },
        )
        .await?;
        Ok(if recreated {
            SyncOutcome::Recreated { id: created.id }
        } else {
            SyncOutcome::Created { id: created.id }
        })
    }

    /// Download a passfile first seen in the remote listing.
    async fn fetch_new(&self, info: &PassFileInfo, cancel: &CancellationToken) -> Result<()> {
        let _guard = self.locks.try_acquire(info.id)?;
        let encrypted = self.remote.fetch_content(info.id, cancel).await?;
        let passfile = PassFile::from_remote(info);
        let content = PassFileContent::from_encrypted(passfile.passfile_type, encrypted.clone());
        info!("Downloaded new passfile {}", info.id);
        self.persist(
            None,
            passfile,
            content,
            &[
                (ContentSlot::Current, encrypted.as_slice()),
                (ContentSlot::Origin, encrypted.as_slice()),
            ],
            ContextEvent::Changed(info.id),
        )
        .await
    }

    /// Encrypted content bytes from memory or the content file.
    pub(super) async fn encrypted_bytes(
        &self,
        passfile: &PassFile,
        content: &PassFileContent,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        if let Some(bytes) = content.encrypted() {
            return Ok(bytes.to_vec());
        }
        self.store
            .read_content(passfile, ContentSlot::Current, cancel)
            .await?
            .ok_or_else(|| {
                PassfileError::ContentCorrupt(format!(
                    "Content file of passfile {} is missing",
                    passfile.id
                ))
            })
    }

    /// Turn a remote failure into an error mark. Anything else propagates.
    pub(super) async fn record_failure(
        &self,
        mut passfile: PassFile,
        content: PassFileContent,
        kind: ErrorKind,
        err: PassfileError,
    ) -> Result<SyncOutcome> {
        if !err.is_remote() {
            return Err(err);
        }
        let id = passfile.id;
        warn!("Remote call for passfile {} failed: {}", id, err);
        passfile.mark.set_error(kind);
        self.persist(None, passfile, content, &[], ContextEvent::Changed(id))
            .await?;
        Ok(SyncOutcome::Failed(kind))
    }
}
