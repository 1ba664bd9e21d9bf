//! In-process remote used by tests and offline setups.
//!
//! Behaves like the real server where the core depends on it: ids are
//! assigned on create, every content upload bumps the version, uploads
//! against a stale version are rejected and deletes check a secret.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::RemoteApi;
use crate::error::{PassfileError, Result};
use crate::model::{PassFileId, PassFileInfo};

#[derive(Default)]
struct RemoteState {
    files: BTreeMap<PassFileId, (PassFileInfo, Vec<u8>)>,
    next_id: PassFileId,
    offline: bool,
    uploads: usize,
}

/// A remote that keeps everything in memory.
pub struct MemoryRemote {
    user_id: i64,
    delete_secret: String,
    state: Mutex<RemoteState>,
}

impl MemoryRemote {
    pub fn new(user_id: i64, delete_secret: impl Into<String>) -> Self {
        Self {
            user_id,
            delete_secret: delete_secret.into(),
            state: Mutex::new(RemoteState {
                next_id: 1,
                ..RemoteState::default()
            }),
        }
    }

    /// Make every call fail with `PassfileError::Network` while `offline`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Number of successful content uploads (create included).
    pub fn upload_count(&self) -> usize {
        self.lock().uploads
    }

    pub fn info(&self, id: PassFileId) -> Option<PassFileInfo> {
        self.lock().files.get(&id).map(|(info, _)| info.clone())
    }

    pub fn content(&self, id: PassFileId) -> Option<Vec<u8>> {
        self.lock().files.get(&id).map(|(_, content)| content.clone())
    }

    /// Replace content as another device would, bumping the version.
    pub fn push_content(&self, id: PassFileId, content: Vec<u8>) -> Option<PassFileInfo> {
        let mut state = self.lock();
        let (info, stored) = state.files.get_mut(&id)?;
        info.version += 1;
        info.version_changed_on = Utc::now();
        *stored = content;
        Some(info.clone())
    }

    /// Rename as another device would.
    pub fn push_info(&self, id: PassFileId, name: &str, color: Option<&str>) -> Option<PassFileInfo> {
        let mut state = self.lock();
        let (info, _) = state.files.get_mut(&id)?;
        info.name = name.to_string();
        info.color = color.map(str::to_string);
        info.info_changed_on = Utc::now();
        Some(info.clone())
    }

    /// Delete as another device would.
    pub fn remove(&self, id: PassFileId) -> bool {
        self.lock().files.remove(&id).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        // A panic while holding this lock only happens in a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connect(&self, cancel: &CancellationToken) -> Result<std::sync::MutexGuard<'_, RemoteState>> {
        if cancel.is_cancelled() {
            return Err(PassfileError::Cancelled);
        }
        let state = self.lock();
        if state.offline {
            return Err(PassfileError::Network("remote is unreachable".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteApi for MemoryRemote {
    async fn list_infos(&self, cancel: &CancellationToken) -> Result<Vec<PassFileInfo>> {
        let state = self.connect(cancel)?;
        Ok(state.files.values().map(|(info, _)| info.clone()).collect())
    }

    async fn fetch_info(
        &self,
        id: PassFileId,
        cancel: &CancellationToken,
    ) -> Result<Option<PassFileInfo>> {
        let state = self.connect(cancel)?;
        Ok(state.files.get(&id).map(|(info, _)| info.clone()))
    }

    async fn fetch_content(&self, id: PassFileId, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let state = self.connect(cancel)?;
        state
            .files
            .get(&id)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| PassfileError::Network(format!("passfile {} not found remotely", id)))
    }

    async fn create(
        &self,
        info: &PassFileInfo,
        content: &[u8],
        cancel: &CancellationToken,
    ) -> Result<PassFileInfo> {
        let mut state = self.connect(cancel)?;
        let now = Utc::now();
        let id = state.next_id;
        state.next_id += 1;
        let created = PassFileInfo {
            id,
            user_id: self.user_id,
            passfile_type: info.passfile_type,
            name: info.name.clone(),
            color: info.color.clone(),
            version: 1,
            created_on: now,
            info_changed_on: now,
            version_changed_on: now,
        };
        state.files.insert(id, (created.clone(), content.to_vec()));
        state.uploads += 1;
        Ok(created)
    }

    async fn upload(
        &self,
        id: PassFileId,
        content: &[u8],
        expected_version: u32,
        cancel: &CancellationToken,
    ) -> Result<PassFileInfo> {
        let mut state = self.connect(cancel)?;
        let (info, stored) = state
            .files
            .get_mut(&id)
            .ok_or_else(|| PassfileError::Network(format!("passfile {} not found remotely", id)))?;
        if info.version != expected_version {
            return Err(PassfileError::VersionConflict {
                expected: expected_version,
                actual: info.version,
            });
        }
        info.version += 1;
        info.version_changed_on = Utc::now();
        *stored = content.to_vec();
        let updated = info.clone();
        state.uploads += 1;
        Ok(updated)
    }

    async fn patch_info(
        &self,
        id: PassFileId,
        name: &str,
        color: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PassFileInfo> {
        let mut state = self.connect(cancel)?;
        let (info, _) = state
            .files
            .get_mut(&id)
            .ok_or_else(|| PassfileError::Network(format!("passfile {} not found remotely", id)))?;
        info.name = name.to_string();
        info.color = color.map(str::to_string);
        info.info_changed_on = Utc::now();
        Ok(info.clone())
    }

    async fn delete(
        &self,
        id: PassFileId,
        confirmation_secret: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut state = self.connect(cancel)?;
        if confirmation_secret != self.delete_secret {
            return Err(PassfileError::Network(
                "deletion rejected: wrong confirmation secret".to_string(),
            ));
        }
        state.files.remove(&id);
        Ok(())
    }
}
