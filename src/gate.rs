//! Per-user event serialization.
//!
//! Wizard state and the default-account pointer are single-slot mutable
//! state scoped to one user, so events for the same user must not
//! interleave. Each user gets an async mutex; events for different users
//! proceed concurrently. The guard is released on every exit path by drop,
//! including handler errors.

use crate::storage::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Registry of per-user locks.
#[derive(Default)]
pub struct UserGate {
    locks: RwLock<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserGate {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive lock for `user`, waiting behind any in-flight
    /// event of the same user.
    pub async fn acquire(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let locks = self.locks.read().await;
            locks.get(&user.0).cloned()
        };

        let lock = match lock {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                locks
                    .entry(user.0)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_user_events_serialize() {
        let gate = Arc::new(UserGate::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let overlap_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let in_section = in_section.clone();
            let overlap_seen = overlap_seen.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = gate.acquire(UserId(1)).await;
                if in_section.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlap_seen.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.expect("task");
        }

        assert_eq!(overlap_seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn different_users_do_not_block_each_other() {
        let gate = UserGate::new();
        let _one = gate.acquire(UserId(1)).await;
        // Would deadlock if user 2 shared user 1's lock
        let _two = gate.acquire(UserId(2)).await;
    }
}
