//! Interactive conflict resolution for passfiles marked `needs_merge`.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{missing_passphrase, ContextEvent, PassFileContext, SyncOutcome};
use crate::error::{PassfileError, Result};
use crate::merge::{PassFileMerge, VersionStamp};
use crate::model::{Content, ErrorKind, PassFileId, PassFileInfo, PassFileMark, Passphrase, Section};
use crate::storage::ContentSlot;

/// A merge computed against one remote version, waiting for the operator
/// to resolve its conflicts.
#[derive(Debug)]
pub struct PendingMerge<S> {
    merge: PassFileMerge<S>,
    remote: PassFileInfo,
    remote_encrypted: Vec<u8>,
    local_version: u32,
    passphrase: Passphrase,
}

impl<S: Section> PendingMerge<S> {
    pub fn merge(&self) -> &PassFileMerge<S> {
        &self.merge
    }

    /// Resolve conflicts through this.
    pub fn merge_mut(&mut self) -> &mut PassFileMerge<S> {
        &mut self.merge
    }

    /// Remote metadata the merge was computed against.
    pub fn remote_info(&self) -> &PassFileInfo {
        &self.remote
    }
}

fn stamp(version: u32, changed_on: DateTime<Utc>) -> VersionStamp {
    VersionStamp {
        version,
        changed_on,
    }
}

impl PassFileContext {
    /// Fetch the remote copy and merge it with local content against the
    /// cached origin content.
    ///
    /// Without cached origin content the merge runs degraded (see
    /// [`PassFileMerge::degraded`]).
    pub async fn begin_merge<S: Section>(
        &self,
        id: PassFileId,
        cancel: &CancellationToken,
    ) -> Result<PendingMerge<S>> {
        let (passfile, content) = self.snapshot(id)?;
        let local = self.unlock::<S>(&passfile, content, cancel).await?;
        let passphrase = local.passphrase().cloned().ok_or_else(missing_passphrase)?;
        let local_sections = local.clone_decrypted().unwrap_or_default();
        self.cache_unlocked(&passfile, S::wrap(local));

        let remote = self
            .remote
            .fetch_info(id, cancel)
            .await?
            .ok_or(PassfileError::NotFound(id))?;
        let remote_encrypted = self.remote.fetch_content(id, cancel).await?;
        let (remote_sections, _) = self
            .decrypt_sections::<S>(
                &format!("{} (server copy)", passfile.name),
                remote_encrypted.clone(),
                Some(passphrase.clone()),
                cancel,
            )
            .await?;

        let origin_sections = match self
            .store
            .read_content(&passfile, ContentSlot::Origin, cancel)
            .await?
        {
            Some(bytes) => {
                let (sections, _) = self
                    .decrypt_sections::<S>(
                        &format!("{} (last synced copy)", passfile.name),
                        bytes,
                        Some(passphrase.clone()),
                        cancel,
                    )
                    .await?;
                Some(sections)
            }
            None => None,
        };

        let merge = PassFileMerge::new(
            id,
            stamp(passfile.version, passfile.version_changed_on),
            stamp(remote.version, remote.version_changed_on),
            passfile
                .origin
                .as_ref()
                .map(|origin| stamp(origin.version, origin.version_changed_on)),
            &local_sections,
            origin_sections.as_deref(),
            &remote_sections,
        );
        info!(
            "Merging passfile {} against remote version {}: {} conflict(s)",
            id,
            remote.version,
            merge.conflict_count()
        );
        Ok(PendingMerge {
            merge,
            remote,
            remote_encrypted,
            local_version: passfile.version,
            passphrase,
        })
    }

    /// Store the merge result and upload it.
    ///
    /// `pending` stays usable on error, so conflicts can still be resolved
    /// and the commit retried.
    ///
    /// The merged content is committed locally with the `merged` mark
    /// before uploading, so a failed upload keeps the resolution. On success
    /// the origin advances to the uploaded version and the marks clear.
    ///
    /// # Errors
    ///
    /// Returns `PassfileError::UnresolvedConflicts` while conflicts are open.
    pub async fn commit_merge<S: Section>(
        &self,
        pending: &PendingMerge<S>,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let id = pending.merge.passfile_id;
        let _guard = self.locks.try_acquire(id)?;
        let sections = pending.merge.result()?;
        let (mut passfile, _) = self.snapshot(id)?;
        if passfile.version != pending.local_version {
            return Err(PassfileError::InvalidInput(format!(
                "Passfile {} changed after the merge started; merge again",
                id
            )));
        }

        let encrypted = self
            .encrypt_sections(&sections, &pending.passphrase, cancel)
            .await?;
        let mut content = Content::from_decrypted(sections, pending.passphrase.clone());
        content.set_encrypted(encrypted.clone());
        let content = S::wrap(content);

        let remote = &pending.remote;
        if !passfile.info_modified() {
            passfile.adopt_info(remote);
        }
        passfile.record_origin(remote);
        // Until the upload result is adopted the version may not go down.
        passfile.version = passfile.version.max(remote.version) + 1;
        passfile.version_changed_on = Utc::now();
        passfile.mark = PassFileMark {
            merged: true,
            ..PassFileMark::default()
        };
        self.persist(
            None,
            passfile.clone(),
            content.clone(),
            &[
                (ContentSlot::Current, encrypted.as_slice()),
                (ContentSlot::Origin, pending.remote_encrypted.as_slice()),
            ],
            ContextEvent::Changed(id),
        )
        .await?;

        match self
            .remote
            .upload(id, &encrypted, remote.version, cancel)
            .await
        {
            Ok(uploaded) => {
                passfile.adopt_version(&uploaded);
                passfile.record_origin(&uploaded);
                passfile.mark = PassFileMark::default();
                info!("Uploaded merge of passfile {} as version {}", id, uploaded.version);
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
            Err(PassfileError::VersionConflict { actual, .. }) => {
                warn!(
                    "Remote passfile {} moved to version {} during the merge; merge again",
                    id, actual
                );
                passfile.mark.merged = false;
                passfile.mark.needs_merge = true;
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
}
