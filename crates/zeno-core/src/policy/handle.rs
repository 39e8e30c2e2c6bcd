//! Shared, atomically swapped routing policy.

use std::sync::Arc;

use tokio::sync::RwLock;
use zeno_types::policy::RoutingPolicy;

/// Cloneable handle to the live routing policy.
///
/// Readers take an `Arc` snapshot and keep using it for the whole turn;
/// writers swap the `Arc` wholesale. A reader therefore never observes a
/// policy that is half replaced.
#[derive(Clone)]
pub struct PolicyHandle {
    current: Arc<RwLock<Arc<RoutingPolicy>>>,
}

impl PolicyHandle {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(policy))),
        }
    }

    /// Frozen copy of the current policy.
    pub async fn snapshot(&self) -> Arc<RoutingPolicy> {
        Arc::clone(&*self.current.read().await)
    }

    /// Swap in a new policy. Existing snapshots are unaffected.
    pub async fn install(&self, policy: RoutingPolicy) {
        *self.current.write().await = Arc::new(policy);
    }
}

impl Default for PolicyHandle {
    fn default() -> Self {
        Self::new(RoutingPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_is_frozen_across_install() {
        let handle = PolicyHandle::default();
        let before = handle.snapshot().await;

        let mut next = RoutingPolicy::default();
        next.retry_count = 7;
        handle.clone().install(next).await;

        assert_eq!(before.retry_count, 2);
        assert_eq!(handle.snapshot().await.retry_count, 7);
    }
}
