//! Chain lock shared by the block producer and the block importer
//!
//! Whoever holds the guard owns the chain head: it is held from reading the
//! head until the new block is persisted, so two writers never build on the
//! same parent.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Named mutual-exclusion lock over the chain head
#[derive(Clone, Debug)]
pub struct ChainLock {
    name: &'static str,
    inner: Arc<Mutex<()>>,
}

/// Held lock; released on drop
pub struct ChainLockGuard<'a> {
    name: &'static str,
    _guard: MutexGuard<'a, ()>,
}

impl ChainLock {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(())),
        }
    }

    /// Wait for the lock
    pub async fn acquire(&self) -> ChainLockGuard<'_> {
        let guard = self.inner.lock().await;
        tracing::trace!(lock = self.name, "chain lock acquired");
        ChainLockGuard {
            name: self.name,
            _guard: guard,
        }
    }

    /// Take the lock if it is free
    pub fn try_acquire(&self) -> Option<ChainLockGuard<'_>> {
        self.inner.try_lock().ok().map(|guard| ChainLockGuard {
            name: self.name,
            _guard: guard,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for ChainLock {
    fn default() -> Self {
        Self::new("chain")
    }
}

impl Drop for ChainLockGuard<'_> {
    fn drop(&mut self) {
        tracing::trace!(lock = self.name, "chain lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_the_lock() {
        let lock = ChainLock::new("test");
        let other = lock.clone();

        let guard = lock.acquire().await;
        assert!(other.try_acquire().is_none());
        drop(guard);
        assert!(other.try_acquire().is_some());
    }
}
