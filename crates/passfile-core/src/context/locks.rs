//! Per-passfile mutation locks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::{PassfileError, Result};
use crate::model::PassFileId;

/// Set of passfile ids with a mutation in flight.
///
/// Mutations never wait: a second mutation of a held id fails with
/// `PassfileError::ConcurrentMutation`. Different ids never contend. Only
/// work that must finish once started, such as recording an id the server
/// just assigned, waits through [`acquire`](Self::acquire).
#[derive(Debug, Clone, Default)]
pub struct MutationLocks {
    held: Arc<Mutex<HashSet<PassFileId>>>,
    released: Arc<Notify>,
}

impl MutationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, id: PassFileId) -> Result<MutationGuard> {
        let mut held = self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !held.insert(id) {
            return Err(PassfileError::ConcurrentMutation(id));
        }
        Ok(MutationGuard {
            held: Arc::clone(&self.held),
            released: Arc::clone(&self.released),
            id,
        })
    }

    /// Wait until `id` is free, then hold it.
    pub async fn acquire(&self, id: PassFileId) -> MutationGuard {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if let Ok(guard) = self.try_acquire(id) {
                return guard;
            }
            released.await;
        }
    }

    pub fn is_held(&self, id: PassFileId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&id)
    }
}

/// Releases its id when dropped.
#[derive(Debug)]
pub struct MutationGuard {
    held: Arc<Mutex<HashSet<PassFileId>>>,
    released: Arc<Notify>,
    id: PassFileId,
}

impl MutationGuard {
    pub fn id(&self) -> PassFileId {
        self.id
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.id);
        self.released.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let locks = MutationLocks::new();
        let _guard = locks.try_acquire(4).unwrap();

        assert!(matches!(
            locks.try_acquire(4),
            Err(PassfileError::ConcurrentMutation(4))
        ));
        assert!(locks.try_acquire(5).is_ok());
    }

    #[test]
    fn test_drop_releases() {
        let locks = MutationLocks::new();
        {
            let guard = locks.try_acquire(-1).unwrap();
            assert_eq!(guard.id(), -1);
            assert!(locks.is_held(-1));
        }
        assert!(!locks.is_held(-1));
        assert!(locks.try_acquire(-1).is_ok());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let locks = MutationLocks::new();
        let guard = locks.try_acquire(40).unwrap();

        let waiter = tokio::spawn({
            let locks = locks.clone();
            async move { locks.acquire(40).await.id() }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), 40);
        assert!(!locks.is_held(40));
    }

    #[tokio::test]
    async fn test_acquire_free_id_is_immediate() {
        let locks = MutationLocks::new();
        let guard = locks.acquire(-2).await;
        assert!(locks.is_held(-2));
        assert!(locks.try_acquire(-2).is_err());
        drop(guard);
    }
}
