//! Per-user write serialization.
//!
//! Every mutating operation for a user holds that user's lock for its whole
//! duration, including multi-transaction flows such as purchases. The lock is
//! taken before any database transaction is opened, and helpers that run
//! inside a transaction never take it again.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{EngineError, ResultEngine};

#[derive(Debug, Default)]
pub(crate) struct UserLocks {
    slots: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

/// Held while a user's write is in flight.
pub(crate) struct UserGuard {
    _guard: OwnedMutexGuard<()>,
}

impl UserLocks {
    fn slot(&self, user_id: i64) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop idle entries so the map tracks only users with recent writes.
        slots.retain(|id, slot| *id == user_id || Arc::strong_count(slot) > 1);
        slots.entry(user_id).or_default().clone()
    }

    pub(crate) async fn acquire(&self, user_id: i64, timeout: Duration) -> ResultEngine<UserGuard> {
        let slot = self.slot(user_id);
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(UserGuard { _guard: guard }),
            Err(_) => Err(EngineError::Busy(format!(
                "user {user_id} has another write in progress"
            ))),
        }
    }

    /// Takes the lock only if it is free right now.
    pub(crate) fn try_acquire(&self, user_id: i64) -> Option<UserGuard> {
        self.slot(user_id)
            .try_lock_owned()
            .ok()
            .map(|guard| UserGuard { _guard: guard })
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_writer_times_out_while_first_holds_the_lock() {
        let locks = UserLocks::default();
        let held = locks.acquire(7, Duration::from_millis(50)).await.unwrap();

        let err = locks
            .acquire(7, Duration::from_millis(20))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Busy(_)));

        drop(held);
        assert!(locks.acquire(7, Duration::from_millis(20)).await.is_ok());
    }

    #[tokio::test]
    async fn different_users_do_not_contend() {
        let locks = UserLocks::default();
        let _a = locks.acquire(1, Duration::from_millis(20)).await.unwrap();
        assert!(locks.acquire(2, Duration::from_millis(20)).await.is_ok());
    }

    #[tokio::test]
    async fn idle_slots_are_pruned() {
        let locks = UserLocks::default();
        for user_id in 0..10 {
            let _guard = locks.acquire(user_id, Duration::from_millis(20)).await.unwrap();
        }
        let _last = locks.acquire(99, Duration::from_millis(20)).await.unwrap();
        assert_eq!(locks.tracked(), 1);
    }
}
