//! Short-lived per-secret locks guarding usage decrements.
//!
//! A guard is held from the moment a secret is matched until the request
//! finishes, so a replayed verification of the same secret cannot decrement
//! it twice. Failing to acquire means another request already owns the
//! decrement.

use std::sync::Arc;

use dashmap::DashMap;

#[derive(Debug, Clone, Default)]
pub struct UsageLocks {
    held: Arc<DashMap<i64, ()>>,
}

impl UsageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `secret_id`, or `None` when it is already held.
    pub fn try_acquire(&self, secret_id: i64) -> Option<UsageGuard> {
        match self.held.entry(secret_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(UsageGuard { secret_id, held: Arc::clone(&self.held) })
            }
        }
    }

    pub fn is_held(&self, secret_id: i64) -> bool {
        self.held.contains_key(&secret_id)
    }
}

/// Releases its secret's lock on drop.
#[derive(Debug)]
pub struct UsageGuard {
    secret_id: i64,
    held: Arc<DashMap<i64, ()>>,
}

impl UsageGuard {
    pub fn secret_id(&self) -> i64 {
        self.secret_id
    }
}

impl Drop for UsageGuard {
    fn drop(&mut self) {
        self.held.remove(&self.secret_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let locks = UsageLocks::new();
        let guard = locks.try_acquire(7).unwrap();
        assert_eq!(guard.secret_id(), 7);
        assert!(locks.try_acquire(7).is_none());
        assert!(locks.try_acquire(8).is_some());

        drop(guard);
        assert!(!locks.is_held(7));
        assert!(locks.try_acquire(7).is_some());
    }
}
