//! Passfile metadata, remote origin snapshots and marks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::section::PassFileType;

/// Server-assigned passfile identifier. Values `<= 0` were never uploaded.
pub type PassFileId = i64;

/// Passfile metadata as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassFileInfo {
    pub id: PassFileId,
    pub user_id: i64,
    pub passfile_type: PassFileType,
    pub name: String,
    pub color: Option<String>,
    pub version: u32,
    pub created_on: DateTime<Utc>,
    pub info_changed_on: DateTime<Utc>,
    pub version_changed_on: DateTime<Utc>,
}

/// Snapshot of the last remote state a passfile was synchronized against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrigin {
    pub name: String,
    pub color: Option<String>,
    pub version: u32,
    pub info_changed_on: DateTime<Utc>,
    pub version_changed_on: DateTime<Utc>,
}

impl From<&PassFileInfo> for RemoteOrigin {
    fn from(info: &PassFileInfo) -> Self {
        Self {
            name: info.name.clone(),
            color: info.color.clone(),
            version: info.version,
            info_changed_on: info.info_changed_on,
            version_changed_on: info.version_changed_on,
        }
    }
}

/// Sticky abnormal-state flags, cleared on successful resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PassFileMark {
    pub needs_merge: bool,
    pub merged: bool,
    pub downloading_error: bool,
    pub uploading_error: bool,
    pub remote_deleting_error: bool,
    pub other_error: bool,
}

impl PassFileMark {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    /// The most significant error flag, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        if self.downloading_error {
            Some(ErrorKind::Downloading)
        } else if self.uploading_error {
            Some(ErrorKind::Uploading)
        } else if self.remote_deleting_error {
            Some(ErrorKind::RemoteDeleting)
        } else if self.other_error {
            Some(ErrorKind::Other)
        } else {
            None
        }
    }

    pub fn set_error(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::Downloading => self.downloading_error = true,
            ErrorKind::Uploading => self.uploading_error = true,
            ErrorKind::RemoteDeleting => self.remote_deleting_error = true,
            ErrorKind::Other => self.other_error = true,
        }
    }

    pub fn clear_errors(&mut self) {
        self.downloading_error = false;
        self.uploading_error = false;
        self.remote_deleting_error = false;
        self.other_error = false;
    }
}

/// Which remote interaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Downloading,
    Uploading,
    RemoteDeleting,
    Other,
}

/// Lifecycle state derived from versions and marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassFileState {
    Clean,
    LocallyModified,
    NeedsMerge,
    Merged,
    Error(ErrorKind),
}

/// A passfile as tracked locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassFile {
    pub id: PassFileId,
    pub user_id: i64,
    pub passfile_type: PassFileType,
    pub name: String,
    pub color: Option<String>,
    pub version: u32,
    pub created_on: DateTime<Utc>,
    pub info_changed_on: DateTime<Utc>,
    pub version_changed_on: DateTime<Utc>,
    pub local_deleted_on: Option<DateTime<Utc>>,
    pub origin: Option<RemoteOrigin>,
    #[serde(default)]
    pub mark: PassFileMark,
}

impl PassFile {
    /// A brand-new local passfile: unassigned id, version 0, no origin.
    pub fn new(
        passfile_type: PassFileType,
        user_id: i64,
        name: impl Into<String>,
        color: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            passfile_type,
            name: name.into(),
            color,
            version: 0,
            created_on: now,
            info_changed_on: now,
            version_changed_on: now,
            local_deleted_on: None,
            origin: None,
            mark: PassFileMark::default(),
        }
    }

    /// A passfile first seen on the remote, already in sync with it.
    pub fn from_remote(info: &PassFileInfo) -> Self {
        Self {
            id: info.id,
            user_id: info.user_id,
            passfile_type: info.passfile_type,
            name: info.name.clone(),
            color: info.color.clone(),
            version: info.version,
            created_on: info.created_on,
            info_changed_on: info.info_changed_on,
            version_changed_on: info.version_changed_on,
            local_deleted_on: None,
            origin: Some(RemoteOrigin::from(info)),
            mark: PassFileMark::default(),
        }
    }

    pub fn is_local_only(&self) -> bool {
        self.id <= 0
    }

    pub fn is_deleted(&self) -> bool {
        self.local_deleted_on.is_some()
    }

    /// Content changed since the recorded origin (always true without one).
    pub fn content_modified(&self) -> bool {
        match &self.origin {
            Some(origin) => origin.version != self.version,
            None => true,
        }
    }

    /// Name or color changed since the recorded origin.
    pub fn info_modified(&self) -> bool {
        match &self.origin {
            Some(origin) => origin.name != self.name || origin.color != self.color,
            None => true,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.content_modified() || self.info_modified()
    }

    pub fn state(&self) -> PassFileState {
        if let Some(kind) = self.mark.error_kind() {
            PassFileState::Error(kind)
        } else if self.mark.needs_merge {
            PassFileState::NeedsMerge
        } else if self.mark.merged {
            PassFileState::Merged
        } else if self.is_modified() {
            PassFileState::LocallyModified
        } else {
            PassFileState::Clean
        }
    }

    pub fn set_info(&mut self, name: impl Into<String>, color: Option<String>) {
        self.name = name.into();
        self.color = color;
        self.info_changed_on = Utc::now();
    }

    /// Record a content change.
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.version_changed_on = Utc::now();
    }

    /// Take name and color from the remote.
    pub fn adopt_info(&mut self, info: &PassFileInfo) {
        self.name = info.name.clone();
        self.color = info.color.clone();
        self.info_changed_on = info.info_changed_on;
    }

    /// Take version and content timestamp from the remote.
    pub fn adopt_version(&mut self, info: &PassFileInfo) {
        self.version = info.version;
        self.version_changed_on = info.version_changed_on;
    }

    pub fn record_origin(&mut self, info: &PassFileInfo) {
        self.origin = Some(RemoteOrigin::from(info));
    }

    pub fn mark_deleted(&mut self) {
        self.local_deleted_on = Some(Utc::now());
    }

    pub fn restore(&mut self) {
        self.local_deleted_on = None;
    }

    /// Metadata in the shape the remote API expects.
    pub fn to_info(&self) -> PassFileInfo {
        PassFileInfo {
            id: self.id,
            user_id: self.user_id,
            passfile_type: self.passfile_type,
            name: self.name.clone(),
            color: self.color.clone(),
            version: self.version,
            created_on: self.created_on,
            info_changed_on: self.info_changed_on,
            version_changed_on: self.version_changed_on,
        }
    }
}
