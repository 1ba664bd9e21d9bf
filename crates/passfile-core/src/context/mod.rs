//! Passfile context: the in-memory authority over one user's passfiles.
//!
//! The context owns the loaded index, cached content and session
//! passphrases. Every mutation:
//!
//! 1. takes the passfile's mutation lock (a second mutation of the same id
//!    fails with `ConcurrentMutation`)
//! 2. works on a deep copy of the passfile and its content
//! 3. stages content files, commits the index, then swaps the copy in
//!
//! Cancellation or failure before step 3 drops the copy, so the context
//! never exposes a half-applied change. Step 3 itself is not cancellable.
//!
//! Remote synchronization lives in `sync`, conflict resolution in
//! `merging` and decryption gating in `gate`.

mod events;
mod gate;
mod locks;
mod merging;
mod options;
mod prompt;
mod sync;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec;
use crate::crypto::validate_passphrase;
use crate::error::{PassfileError, Result};
use crate::model::{
    Content, PassFile, PassFileContent, PassFileId, PassFileState, PassFileType, Passphrase,
    PwdSection, Section, TxtSection,
};
use crate::remote::RemoteApi;
use crate::storage::{ContentSlot, PassFileStore};

use events::EventBus;

pub use events::ContextEvent;
pub use locks::{MutationGuard, MutationLocks};
pub use merging::PendingMerge;
pub use options::{ContextOptions, DEFAULT_PASSPHRASE_ATTEMPTS};
pub use prompt::{PassphrasePrompt, PromptPurpose, PromptRequest};
pub use sync::SyncOutcome;

struct Entry {
    passfile: PassFile,
    content: PassFileContent,
}

/// All passfiles of one user on one server.
pub struct PassFileContext {
    store: PassFileStore,
    remote: Arc<dyn RemoteApi>,
    prompt: Arc<dyn PassphrasePrompt>,
    options: ContextOptions,
    entries: Mutex<BTreeMap<PassFileId, Entry>>,
    session: Mutex<HashMap<PassFileId, Passphrase>>,
    next_local_id: AtomicI64,
    locks: MutationLocks,
    index_commit: tokio::sync::Mutex<()>,
    events: EventBus,
}

impl PassFileContext {
    pub fn new(
        store: PassFileStore,
        remote: Arc<dyn RemoteApi>,
        prompt: Arc<dyn PassphrasePrompt>,
        options: ContextOptions,
    ) -> Self {
        Self {
            store,
            remote,
            prompt,
            options,
            entries: Mutex::new(BTreeMap::new()),
            session: Mutex::new(HashMap::new()),
            next_local_id: AtomicI64::new(-1),
            locks: MutationLocks::new(),
            index_commit: tokio::sync::Mutex::new(()),
            events: EventBus::default(),
        }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Replace the in-memory state with the store's index.
    ///
    /// Content is not read until it is first needed. Returns the number of
    /// passfiles loaded, tombstoned ones included.
    pub async fn load(&self, cancel: &CancellationToken) -> Result<usize> {
        let passfiles = self.store.read_index(cancel).await?;
        let promoted = self.store.recover_staged(&passfiles, cancel).await?;
        if promoted > 0 {
            warn!("Promoted {} content file(s) left staged by an interrupted change", promoted);
        }
        let lowest = passfiles.iter().map(|p| p.id).min().unwrap_or(0).min(0);
        self.next_local_id.store(lowest - 1, Ordering::SeqCst);

        let count = passfiles.len();
        {
            let mut entries = self.entries();
            entries.clear();
            for passfile in passfiles {
                let content = PassFileContent::empty(passfile.passfile_type);
                entries.insert(passfile.id, Entry { passfile, content });
            }
        }
        self.session().clear();

        info!(
            "Loaded {} passfile(s) for server {}",
            count, self.options.server_id
        );
        self.events.publish(ContextEvent::Loaded);
        Ok(count)
    }

    /// Passfiles not deleted locally, ordered by name.
    pub fn list(&self) -> Vec<PassFile> {
        self.collect(|passfile| !passfile.is_deleted())
    }

    /// Tombstoned passfiles waiting for remote deletion or restore.
    pub fn list_deleted(&self) -> Vec<PassFile> {
        self.collect(PassFile::is_deleted)
    }

    pub fn get(&self, id: PassFileId) -> Result<PassFile> {
        self.entries()
            .get(&id)
            .map(|entry| entry.passfile.clone())
            .ok_or(PassfileError::NotFound(id))
    }

    pub fn state(&self, id: PassFileId) -> Result<PassFileState> {
        self.get(id).map(|passfile| passfile.state())
    }

    /// Register a change callback. Callbacks run in registration order on
    /// the task that made the change and must not block.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&ContextEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(Arc::new(callback));
    }

    /// Counter bumped on every change, for polling consumers.
    pub fn revision(&self) -> u64 {
        self.events.revision()
    }

    /// Create a passfile locally. It gets a negative local id until its
    /// first upload.
    pub async fn create<S: Section>(
        &self,
        name: &str,
        color: Option<String>,
        passphrase: Passphrase,
        sections: Vec<S>,
        cancel: &CancellationToken,
    ) -> Result<PassFileId> {
        let name = validate_name(name)?;
        let color = validate_color(color)?;
        validate_passphrase(passphrase.expose(), self.options.min_passphrase_length)?;

        let mut passfile = PassFile::new(S::PASSFILE_TYPE, self.options.user_id, name, color);
        passfile.id = self.next_local_id.fetch_sub(1, Ordering::SeqCst);
        let id = passfile.id;
        let _guard = self.locks.try_acquire(id)?;

        let encrypted = self.encrypt_sections(&sections, &passphrase, cancel).await?;
        let mut content = Content::from_decrypted(sections, passphrase.clone());
        content.set_encrypted(encrypted.clone());

        self.persist(
            None,
            passfile,
            S::wrap(content),
            &[(ContentSlot::Current, encrypted.as_slice())],
            ContextEvent::Changed(id),
        )
        .await?;
        self.remember_passphrase(id, &passphrase);
        info!("Created {} passfile {}", S::PASSFILE_TYPE, id);
        Ok(id)
    }

    /// Rename or recolor a passfile. The content version is untouched.
    pub async fn update_info(
        &self,
        id: PassFileId,
        name: &str,
        color: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = validate_name(name)?;
        let color = validate_color(color)?;
        let _guard = self.locks.try_acquire(id)?;
        let (mut passfile, content) = self.snapshot(id)?;
        ensure_live(&passfile)?;

        passfile.set_info(name, color);
        if cancel.is_cancelled() {
            return Err(PassfileError::Cancelled);
        }
        self.persist(None, passfile, content, &[], ContextEvent::Changed(id))
            .await
    }

    /// Decrypted copy of a passfile's sections, prompting for the passphrase
    /// if it is not cached for this session.
    pub async fn content<S: Section>(
        &self,
        id: PassFileId,
        cancel: &CancellationToken,
    ) -> Result<Vec<S>> {
        let (passfile, content) = self.snapshot(id)?;
        let unlocked = self.unlock::<S>(&passfile, content, cancel).await?;
        let sections = unlocked.clone_decrypted().unwrap_or_default();
        self.cache_unlocked(&passfile, S::wrap(unlocked));
        Ok(sections)
    }

    /// Apply `edit` to a copy of the sections and store the result as a new
    /// version. Nothing changes unless every step succeeds.
    pub async fn update_content<S, F>(
        &self,
        id: PassFileId,
        edit: F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        S: Section,
        F: FnOnce(&mut Vec<S>) + Send,
    {
        let _guard = self.locks.try_acquire(id)?;
        let (mut passfile, content) = self.snapshot(id)?;
        ensure_live(&passfile)?;

        let unlocked = self.unlock::<S>(&passfile, content, cancel).await?;
        let passphrase = unlocked
            .passphrase()
            .cloned()
            .ok_or_else(missing_passphrase)?;
        let mut sections = unlocked.clone_decrypted().unwrap_or_default();
        edit(&mut sections);

        let encrypted = self.encrypt_sections(&sections, &passphrase, cancel).await?;
        let mut content = Content::from_decrypted(sections, passphrase);
        content.set_encrypted(encrypted.clone());
        passfile.bump_version();
        let version = passfile.version;

        self.persist(
            None,
            passfile,
            S::wrap(content),
            &[(ContentSlot::Current, encrypted.as_slice())],
            ContextEvent::Changed(id),
        )
        .await?;
        debug!("Passfile {} content now at version {}", id, version);
        Ok(())
    }

    /// Re-encrypt a passfile under a new passphrase. Counts as a content
    /// change, so the version increases.
    pub async fn change_passphrase(
        &self,
        id: PassFileId,
        new_passphrase: Passphrase,
        cancel: &CancellationToken,
    ) -> Result<()> {
        validate_passphrase(new_passphrase.expose(), self.options.min_passphrase_length)?;
        let passfile_type = self.get(id)?.passfile_type;
        match passfile_type {
            PassFileType::Pwd => {
                self.reencrypt::<PwdSection>(id, new_passphrase, cancel)
                    .await
            }
            PassFileType::Txt => {
                self.reencrypt::<TxtSection>(id, new_passphrase, cancel)
                    .await
            }
        }
    }

    /// Plain codec bytes of a passfile's content, for export.
    pub async fn export<S: Section>(
        &self,
        id: PassFileId,
        user_friendly: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let sections = self.content::<S>(id, cancel).await?;
        codec::serialize(&sections, user_friendly)
    }

    /// Delete a passfile locally.
    ///
    /// A passfile that was never uploaded is removed at once. Otherwise it is
    /// tombstoned until [`delete_remote`](Self::delete_remote) succeeds.
    pub async fn delete(&self, id: PassFileId, cancel: &CancellationToken) -> Result<()> {
        let _guard = self.locks.try_acquire(id)?;
        let (mut passfile, content) = self.snapshot(id)?;
        if passfile.is_deleted() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(PassfileError::Cancelled);
        }
        if passfile.is_local_only() {
            info!("Removing never-uploaded passfile {}", id);
            return self.remove_entry(&passfile).await;
        }
        passfile.mark_deleted();
        self.persist(None, passfile, content, &[], ContextEvent::Changed(id))
            .await
    }

    /// Undo a local delete.
    pub async fn restore(&self, id: PassFileId, cancel: &CancellationToken) -> Result<()> {
        let _guard = self.locks.try_acquire(id)?;
        let (mut passfile, content) = self.snapshot(id)?;
        if !passfile.is_deleted() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(PassfileError::Cancelled);
        }
        passfile.restore();
        passfile.mark.remote_deleting_error = false;
        self.persist(None, passfile, content, &[], ContextEvent::Changed(id))
            .await
    }

    /// Drop every decrypted section list and session passphrase.
    pub fn lock_all(&self) {
        for entry in self.entries().values_mut() {
            entry.content.lock();
        }
        self.session().clear();
        debug!("Locked all passfiles");
    }

    async fn reencrypt<S: Section>(
        &self,
        id: PassFileId,
        new_passphrase: Passphrase,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let _guard = self.locks.try_acquire(id)?;
        let (mut passfile, content) = self.snapshot(id)?;
        ensure_live(&passfile)?;

        let unlocked = self.unlock::<S>(&passfile, content, cancel).await?;
        let sections = unlocked.clone_decrypted().unwrap_or_default();
        let encrypted = self
            .encrypt_sections(&sections, &new_passphrase, cancel)
            .await?;
        let mut content = Content::from_decrypted(sections, new_passphrase.clone());
        content.set_encrypted(encrypted.clone());
        passfile.bump_version();

        self.persist(
            None,
            passfile,
            S::wrap(content),
            &[(ContentSlot::Current, encrypted.as_slice())],
            ContextEvent::Changed(id),
        )
        .await?;
        self.remember_passphrase(id, &new_passphrase);
        info!("Changed passphrase of passfile {}", id);
        Ok(())
    }

    async fn encrypt_sections<S: Section>(
        &self,
        sections: &[S],
        passphrase: &Passphrase,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let plain = codec::serialize(sections, false)?;
        crate::crypto::encrypt_async(plain, passphrase.clone(), cancel).await
    }

    /// Stage content files, commit the index, then publish the new state.
    ///
    /// The index write is the commit point. A failure before it removes the
    /// staged files and leaves disk and memory as they were. Staged files
    /// that cannot be promoted after it are promoted by the next `load`.
    ///
    /// `replaced` names the id the passfile had before, when it changes on
    /// first upload; its entry is dropped and its files removed after the
    /// commit, so `files` must carry every content slot of the new id.
    async fn persist(
        &self,
        replaced: Option<PassFileId>,
        passfile: PassFile,
        content: PassFileContent,
        files: &[(ContentSlot, &[u8])],
        event: ContextEvent,
    ) -> Result<()> {
        // Files and index must end up in step, so this runs to completion.
        let settle = CancellationToken::new();
        let id = passfile.id;
        let rekeyed_from = replaced.filter(|old| *old != id);

        let mut staged = Vec::with_capacity(files.len());
        for (slot, bytes) in files {
            match self
                .store
                .stage_content(&passfile, *slot, bytes, &settle)
                .await
            {
                Ok(file) => staged.push(file),
                Err(err) => {
                    self.store.discard_staged(&staged).await;
                    return Err(err);
                }
            }
        }

        {
            let _index = self.index_commit.lock().await;
            let passfiles = self.index_with(rekeyed_from, Some(&passfile));
            if let Err(err) = self.store.write_index(passfiles, &settle).await {
                self.store.discard_staged(&staged).await;
                return Err(err);
            }
            let mut entries = self.entries();
            if let Some(old) = rekeyed_from {
                entries.remove(&old);
            }
            entries.insert(id, Entry { passfile: passfile.clone(), content });
        }

        if let Err(err) = self.store.promote_staged(&staged, &settle).await {
            warn!(
                "Content of passfile {} is committed but still staged: {}",
                id, err
            );
        }
        if let Some(old) = rekeyed_from {
            if let Err(err) = self
                .store
                .remove_content(old, passfile.passfile_type, &settle)
                .await
            {
                warn!("Could not remove content files of passfile {}: {}", old, err);
            }
            let mut session = self.session();
            if let Some(passphrase) = session.remove(&old) {
                session.insert(id, passphrase);
            }
        }
        self.events.publish(event);
        Ok(())
    }

    /// Remove a passfile from the index and delete its content files.
    async fn remove_entry(&self, passfile: &PassFile) -> Result<()> {
        let settle = CancellationToken::new();
        {
            let _index = self.index_commit.lock().await;
            let passfiles = self.index_with(Some(passfile.id), None);
            self.store.write_index(passfiles, &settle).await?;
            self.entries().remove(&passfile.id);
        }
        self.session().remove(&passfile.id);
        self.events.publish(ContextEvent::Removed(passfile.id));
        self.store
            .remove_content(passfile.id, passfile.passfile_type, &settle)
            .await
    }

    /// Index records with `removed` left out and `upserted` swapped in.
    fn index_with(&self, removed: Option<PassFileId>, upserted: Option<&PassFile>) -> Vec<PassFile> {
        let entries = self.entries();
        let mut passfiles: Vec<PassFile> = entries
            .values()
            .map(|entry| &entry.passfile)
            .filter(|passfile| Some(passfile.id) != removed)
            .filter(|passfile| upserted.map_or(true, |new| new.id != passfile.id))
            .cloned()
            .collect();
        passfiles.extend(upserted.cloned());
        passfiles.sort_by_key(|passfile| passfile.id);
        passfiles
    }

    /// Deep copy of a passfile and its content.
    fn snapshot(&self, id: PassFileId) -> Result<(PassFile, PassFileContent)> {
        self.entries()
            .get(&id)
            .map(|entry| (entry.passfile.clone(), entry.content.clone()))
            .ok_or(PassfileError::NotFound(id))
    }

    fn contains(&self, id: PassFileId) -> bool {
        self.entries().contains_key(&id)
    }

    fn ids(&self) -> Vec<PassFileId> {
        self.entries().keys().copied().collect()
    }

    fn collect(&self, keep: impl Fn(&PassFile) -> bool) -> Vec<PassFile> {
        let mut passfiles: Vec<PassFile> = self
            .entries()
            .values()
            .map(|entry| &entry.passfile)
            .filter(|passfile| keep(passfile))
            .cloned()
            .collect();
        passfiles.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        passfiles
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<PassFileId, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn session(&self) -> MutexGuard<'_, HashMap<PassFileId, Passphrase>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ensure_live(passfile: &PassFile) -> Result<()> {
    if passfile.is_deleted() {
        return Err(PassfileError::InvalidInput(format!(
            "Passfile {} is deleted; restore it first",
            passfile.id
        )));
    }
    Ok(())
}

fn missing_passphrase() -> PassfileError {
    PassfileError::Crypto("Decrypted content has no passphrase".to_string())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PassfileError::InvalidInput(
            "Passfile name cannot be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Accepts `#rgb`, `#rrggbb` and `#aarrggbb`; blank means no color.
fn validate_color(color: Option<String>) -> Result<Option<String>> {
    let Some(color) = color else {
        return Ok(None);
    };
    let color = color.trim();
    if color.is_empty() {
        return Ok(None);
    }
    let valid = color
        .strip_prefix('#')
        .map(|hex| matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false);
    if !valid {
        return Err(PassfileError::InvalidInput(format!(
            "Invalid color '{}' (expected a hex color like #3a7bd5)",
            color
        )));
    }
    Ok(Some(color.to_ascii_lowercase()))
}
