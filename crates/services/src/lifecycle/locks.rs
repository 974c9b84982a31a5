use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-meeting async locks keyed by provider meeting id.
///
/// Serializes finalization within this process; across processes the
/// conditional `notified_at` claim in the database decides the winner.
#[derive(Default)]
pub struct MeetingLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MeetingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(
            self.locks
                .entry(key.to_string())
                .or_insert_with(Default::default)
                .value(),
        );
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = MeetingLocks::new();
        let guard = locks.acquire("83921002231").await;

        let contender = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.acquire("83921002231"),
        )
        .await;
        assert!(contender.is_err());

        drop(guard);
        let reacquired = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.acquire("83921002231"),
        )
        .await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn different_keys_are_independent() {
        let locks = MeetingLocks::new();
        let _a = locks.acquire("111").await;
        let b = tokio::time::timeout(std::time::Duration::from_millis(20), locks.acquire("222"))
            .await;
        assert!(b.is_ok());
    }
}
