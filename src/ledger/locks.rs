//! Per-user pessimistic locks.
//!
//! Every business operation holds its user's lock from before the store
//! transaction begins until after it commits or rolls back, so two requests
//! for the same user never interleave. Positions belong to exactly one user,
//! so the user lock covers them too.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one operation on one user.
pub type UserLockGuard = OwnedMutexGuard<()>;

/// Lazily populated table of one async mutex per user id.
///
/// Entries are created on first use and only ever removed through
/// [`LockTable::discard`], so the table holds at most one entry per
/// registered user plus ids with a request still in flight.
#[derive(Debug, Default, Clone)]
pub struct LockTable {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`.
    pub async fn acquire(&self, user_id: i64) -> UserLockGuard {
        // Clone the mutex out so the map shard is not held across the await.
        let lock = self
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Release `guard` and forget `user_id` unless another request is
    /// queued on the same mutex.
    ///
    /// Used when the id turned out not to belong to any user.
    pub fn discard(&self, user_id: i64, guard: UserLockGuard) {
        drop(guard);
        self.locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_serializes() {
        let table = LockTable::new();
        let guard = table.acquire(1).await;

        let contender = table.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.acquire(1).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let table = LockTable::new();
        let _first = table.acquire(1).await;

        let second = tokio::time::timeout(Duration::from_millis(100), table.acquire(2)).await;
        assert!(second.is_ok());
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_discard_forgets_idle_entry() {
        let table = LockTable::new();

        let guard = table.acquire(7).await;
        table.discard(7, guard);
        assert_eq!(table.len(), 0);

        let _ = table.acquire(8).await;
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_discard_keeps_entry_with_waiter() {
        let table = LockTable::new();
        let guard = table.acquire(7).await;

        let contender = table.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.acquire(7).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        table.discard(7, guard);
        assert_eq!(table.len(), 1);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
