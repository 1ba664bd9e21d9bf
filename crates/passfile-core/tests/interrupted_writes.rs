mod common;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use common::{context_over, remote, Device, SERVER};
use passfile_core::storage::{content_file_name, ContentSlot, INDEX_FILE};
use passfile_core::{
    FileRepository, LocalFileRepository, MemoryRemote, PassFileContext, PassFileId,
    PassFileState, PassFileType, PassfileError, Purpose, Result, SyncOutcome, TxtSection,
};

const PASSPHRASE: &str = "correct horse";

/// Store directory whose index writes fail while `index_full` is set.
struct IndexFullRepository {
    inner: LocalFileRepository,
    index_full: AtomicBool,
}

impl IndexFullRepository {
    fn over(device: &Device) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalFileRepository::new(device.dir.path(), SERVER, Purpose::PassFiles),
            index_full: AtomicBool::new(false),
        })
    }

    fn fill(&self) {
        self.index_full.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FileRepository for IndexFullRepository {
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.inner.list(cancel).await
    }

    async fn exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool> {
        self.inner.exists(name, cancel).await
    }

    async fn read_all_bytes(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.inner.read_all_bytes(name, cancel).await
    }

    async fn write_all_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if name.starts_with(INDEX_FILE) && self.index_full.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
        }
        self.inner.write_all_bytes(name, bytes, cancel).await
    }

    async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        self.inner.delete(name, cancel).await
    }

    async fn rename(&self, from: &str, to: &str, cancel: &CancellationToken) -> Result<()> {
        self.inner.rename(from, to, cancel).await
    }
}

fn note(text: &str) -> Vec<TxtSection> {
    vec![TxtSection::new("journal", text)]
}

async fn text_after_restart(
    device: &Device,
    remote: &Arc<MemoryRemote>,
    id: PassFileId,
) -> (PassFileContext, String) {
    let context = device.restart(remote).await;
    device.prompt.push(PASSPHRASE);
    let sections = context
        .content::<TxtSection>(id, &CancellationToken::new())
        .await
        .expect("content should decrypt");
    (context, sections[0].content.clone())
}

async fn store_files(device: &Device) -> Vec<String> {
    device
        .repository()
        .list(&CancellationToken::new())
        .await
        .expect("list should succeed")
}

#[tokio::test]
async fn test_failed_index_write_keeps_previous_content() {
    let remote = remote();
    let device = Device::new(&remote);
    let repository = IndexFullRepository::over(&device);
    let context = context_over(repository.clone(), &remote, device.prompt.clone());
    let cancel = CancellationToken::new();
    let local_id = context
        .create("Journal", None, PASSPHRASE.into(), note("day one"), &cancel)
        .await
        .expect("create should succeed");
    let id = match context.sync(local_id, &cancel).await {
        Ok(SyncOutcome::Created { id }) => id,
        other => panic!("unexpected first sync result: {:?}", other),
    };

    repository.fill();
    let result = context
        .update_content::<TxtSection, _>(
            id,
            |sections| sections[0].content = "edited".to_string(),
            &cancel,
        )
        .await;

    assert!(matches!(result, Err(PassfileError::Io { .. })));
    assert_eq!(context.get(id).expect("passfile should exist").version, 1);
    assert_eq!(
        store_files(&device).await,
        vec![
            format!("{}.txt", id),
            format!("{}.txt.origin", id),
            INDEX_FILE.to_string(),
        ]
    );

    let (restarted, text) = text_after_restart(&device, &remote, id).await;
    assert_eq!(text, "day one");
    assert_eq!(restarted.state(id).expect("state"), PassFileState::Clean);
    assert_eq!(
        restarted.sync(id, &cancel).await.expect("sync should succeed"),
        SyncOutcome::UpToDate
    );
}

#[tokio::test]
async fn test_failed_first_upload_commit_keeps_local_files() {
    let remote = remote();
    let device = Device::new(&remote);
    let repository = IndexFullRepository::over(&device);
    let context = context_over(repository.clone(), &remote, device.prompt.clone());
    let cancel = CancellationToken::new();
    let local_id = context
        .create("Journal", None, PASSPHRASE.into(), note("day one"), &cancel)
        .await
        .expect("create should succeed");

    repository.fill();
    let result = context.sync(local_id, &cancel).await;

    assert!(matches!(result, Err(PassfileError::Io { .. })));
    let passfile = context.get(local_id).expect("local entry should remain");
    assert!(passfile.is_local_only());
    let current = content_file_name(local_id, PassFileType::Txt, ContentSlot::Current);
    assert_eq!(store_files(&device).await, vec![current, INDEX_FILE.to_string()]);

    let (_, text) = text_after_restart(&device, &remote, local_id).await;
    assert_eq!(text, "day one");
}

#[tokio::test]
async fn test_load_promotes_content_committed_before_a_crash() {
    let remote = remote();
    let device = Device::new(&remote);
    let cancel = CancellationToken::new();
    let id = device
        .context
        .create("Journal", None, PASSPHRASE.into(), note("day one"), &cancel)
        .await
        .expect("create should succeed");
    let current = content_file_name(id, PassFileType::Txt, ContentSlot::Current);
    let repository = device.repository();
    let bytes = repository
        .read_all_bytes(&current, &cancel)
        .await
        .expect("content should exist");
    repository
        .rename(&current, &format!("{}.v0.staged", current), &cancel)
        .await
        .expect("rename should succeed");
    repository
        .write_all_bytes(&format!("{}.v9.staged", current), b"abandoned", &cancel)
        .await
        .expect("write should succeed");

    let (_, text) = text_after_restart(&device, &remote, id).await;

    assert_eq!(text, "day one");
    assert_eq!(store_files(&device).await, vec![current.clone(), INDEX_FILE.to_string()]);
    assert_eq!(
        repository.read_all_bytes(&current, &cancel).await.expect("read"),
        bytes
    );
}
