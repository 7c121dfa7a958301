//! # WriteGate
//!
//! The subsystem-wide exclusive-write / shared-read lock.
//!
//! Every mutating operation (vote cast/change/remove together with its karma
//! update, thread node creation and edits, post creation) holds the write
//! side for its whole check-then-write sequence. Reads take the shared side,
//! so they never observe a vote whose paired score update is still pending.
//!
//! # Developer Note
//! The lock is coarse: two votes on unrelated targets still
//! queue behind each other. tokio's `RwLock` is fair, so a waiting writer is
//! granted before readers that arrive after it. There is no timeout; a queued
//! operation runs once it reaches the front.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cloneable handle; clones share the same underlying lock.
#[derive(Debug, Clone, Default)]
pub struct WriteGate {
    inner: Arc<RwLock<()>>,
}

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.write().await
    }

    /// True when both handles guard the same subsystem.
    #[cfg(test)]
    pub(crate) fn same_as(&self, other: &WriteGate) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
