//! Change notifications for context subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::model::PassFileId;

/// What changed in a passfile context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEvent {
    /// The index was (re)loaded from the store.
    Loaded,
    /// A passfile was added or its metadata, content or marks changed.
    Changed(PassFileId),
    /// A passfile got its server id on first upload.
    Rekeyed { old: PassFileId, new: PassFileId },
    /// A passfile is gone from the local store.
    Removed(PassFileId),
}

type Callback = Arc<dyn Fn(&ContextEvent) + Send + Sync>;

/// Subscribers in registration order plus a revision counter.
#[derive(Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Callback>>,
    revision: AtomicU64,
}

impl EventBus {
    pub(crate) fn subscribe(&self, callback: Callback) {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(callback);
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Bump the revision, then notify every subscriber in order.
    pub(crate) fn publish(&self, event: ContextEvent) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        // Snapshot so callbacks may subscribe without deadlocking.
        let subscribers: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for callback in subscribers {
            callback(&event);
        }
    }
}
