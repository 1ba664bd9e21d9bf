#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use passfile_core::storage::{content_file_name, ContentSlot};
use passfile_core::{
    ContextOptions, FileRepository, LocalFileRepository, MemoryRemote, PassFileContext,
    PassFileId, PassFileStore, PassFileType, PassphrasePrompt, PromptRequest, Purpose,
};

pub const SERVER: &str = "https://vault.example:8443";
pub const DELETE_SECRET: &str = "account-password";

/// Answers prompts from a queue; an empty queue dismisses the prompt.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<PromptRequest>>,
}

impl ScriptedPrompt {
    pub fn push(&self, answer: &str) {
        self.answers.lock().unwrap().push_back(answer.to_string());
    }

    pub fn requests(&self) -> Vec<PromptRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn asked(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PassphrasePrompt for ScriptedPrompt {
    async fn ask(&self, request: PromptRequest) -> Option<String> {
        self.requests.lock().unwrap().push(request);
        self.answers.lock().unwrap().pop_front()
    }
}

/// One client installation: its own store directory, shared remote.
pub struct Device {
    pub context: Arc<PassFileContext>,
    pub prompt: Arc<ScriptedPrompt>,
    pub dir: TempDir,
}

impl Device {
    pub fn new(remote: &Arc<MemoryRemote>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let prompt = Arc::new(ScriptedPrompt::default());
        let context = Arc::new(context_in(&dir, remote, prompt.clone()));
        Self {
            context,
            prompt,
            dir,
        }
    }

    /// A fresh context over the same store directory, as after a restart.
    pub async fn restart(&self, remote: &Arc<MemoryRemote>) -> PassFileContext {
        let context = context_in(&self.dir, remote, self.prompt.clone());
        context
            .load(&CancellationToken::new())
            .await
            .expect("load should succeed");
        context
    }

    pub fn repository(&self) -> LocalFileRepository {
        LocalFileRepository::new(self.dir.path(), SERVER, Purpose::PassFiles)
    }

    pub async fn remove_origin_file(&self, id: PassFileId, passfile_type: PassFileType) {
        let name = content_file_name(id, passfile_type, ContentSlot::Origin);
        self.repository()
            .delete(&name, &CancellationToken::new())
            .await
            .expect("delete should succeed");
    }

    pub async fn has_file(&self, name: &str) -> bool {
        self.repository()
            .exists(name, &CancellationToken::new())
            .await
            .expect("exists should succeed")
    }
}

pub fn remote() -> Arc<MemoryRemote> {
    Arc::new(MemoryRemote::new(42, DELETE_SECRET))
}

fn context_in(
    dir: &TempDir,
    remote: &Arc<MemoryRemote>,
    prompt: Arc<ScriptedPrompt>,
) -> PassFileContext {
    let repository = LocalFileRepository::new(dir.path(), SERVER, Purpose::PassFiles);
    context_over(Arc::new(repository), remote, prompt)
}

/// A context over any repository, for wrapping the device's store.
pub fn context_over(
    repository: Arc<dyn FileRepository>,
    remote: &Arc<MemoryRemote>,
    prompt: Arc<ScriptedPrompt>,
) -> PassFileContext {
    PassFileContext::new(
        PassFileStore::new(repository),
        remote.clone(),
        prompt,
        ContextOptions {
            server_id: SERVER.to_string(),
            user_id: 42,
            ..ContextOptions::default()
        },
    )
}
