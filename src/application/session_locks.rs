//! Per-conversation turn serialization.
//!
//! Turns for one `(channel, session_key)` run one at a time; different keys
//! never contend. Entries nobody holds or waits on are pruned on acquire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::foundation::{Channel, SessionKey};

type LockKey = (Channel, SessionKey);

/// Keyed async mutexes, shared by every handler that mutates sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of a session's read-merge-write.
pub struct SessionLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other turn holds this conversation's lock.
    pub async fn acquire(&self, channel: Channel, key: &SessionKey) -> SessionLockGuard {
        let lock = {
            let mut locks = self.table();
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((channel, key.clone()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        SessionLockGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of conversations with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<LockKey, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(s: &str) -> SessionKey {
        SessionKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = SessionLocks::new();
        let guard = locks.acquire(Channel::Text, &key("a")).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(Channel::Text, &key("a")).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = SessionLocks::new();
        let _a = locks.acquire(Channel::Text, &key("a")).await;

        tokio::time::timeout(Duration::from_millis(100), locks.acquire(Channel::Text, &key("b")))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_millis(100), locks.acquire(Channel::Voice, &key("a")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = SessionLocks::new();
        drop(locks.acquire(Channel::Text, &key("a")).await);
        drop(locks.acquire(Channel::Text, &key("b")).await);

        assert_eq!(locks.tracked(), 1);
    }
}
