//! Per-session dispatch serialization.
//!
//! Updates from the same `(chat_id, user_id)` pair are dispatched one at a
//! time so that scope transitions made by one update are visible to the next.
//! Different pairs never contend. Entries are dropped as soon as nobody holds
//! or waits for them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::scope::SessionKey;

/// Table of per-key async mutexes.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other dispatch holds `key`, then holds it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, key: SessionKey) -> SessionGuard<'_> {
        let mutex = self.locks.entry(key).or_default().clone();
        let guard = mutex.lock_owned().await;
        SessionGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds one key of a [`SessionLocks`] table.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    key: SessionKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table's own reference left: nobody is waiting.
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_same_key_waits() {
        let locks = SessionLocks::new();
        let first = locks.acquire((1, 1)).await;

        let mut second = task::spawn(locks.acquire((1, 1)));
        assert_pending!(second.poll());

        drop(first);
        assert!(second.is_woken());
        let guard = assert_ready!(second.poll());
        drop(guard);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let locks = SessionLocks::new();
        let _a = locks.acquire((1, 1)).await;

        let mut other = task::spawn(locks.acquire((1, 2)));
        let _b = assert_ready!(other.poll());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_keys_are_removed() {
        let locks = SessionLocks::new();
        {
            let _guard = locks.acquire((3, 4)).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
