//! Routing policy provider: load, seed, read and replace.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use zeno_types::error::PolicyError;
use zeno_types::policy::RoutingPolicy;

use super::handle::PolicyHandle;
use super::repository::PolicyRepository;

/// Owns the live policy and keeps it in sync with storage.
///
/// Writers are serialized so the stored and the live policy always end up
/// as the same value.
pub struct PolicyService<P: PolicyRepository> {
    repo: P,
    handle: PolicyHandle,
    write_lock: Mutex<()>,
}

impl<P: PolicyRepository> PolicyService<P> {
    pub fn new(repo: P, handle: PolicyHandle) -> Self {
        Self {
            repo,
            handle,
            write_lock: Mutex::new(()),
        }
    }

    /// Handle shared with the orchestrator.
    pub fn handle(&self) -> &PolicyHandle {
        &self.handle
    }

    /// Load the stored policy into the handle, seeding the default policy
    /// on first start.
    pub async fn load_or_seed(&self) -> Result<Arc<RoutingPolicy>, PolicyError> {
        let _guard = self.write_lock.lock().await;
        let policy = match self.repo.load_policy().await? {
            Some(policy) => policy,
            None => {
                let policy = RoutingPolicy::default();
                self.repo.save_policy(&policy).await?;
                info!("seeded default routing policy");
                policy
            }
        };
        self.handle.install(policy).await;
        Ok(self.handle.snapshot().await)
    }

    /// Snapshot of the live policy.
    pub async fn current_policy(&self) -> Arc<RoutingPolicy> {
        self.handle.snapshot().await
    }

    /// Validate, persist and swap in `policy`. Full replace, no patching.
    ///
    /// On any error the previous policy stays live.
    pub async fn replace_policy(&self, policy: RoutingPolicy) -> Result<(), PolicyError> {
        policy.validate()?;
        let _guard = self.write_lock.lock().await;
        self.repo.save_policy(&policy).await?;
        info!(
            models = policy.fallback_order.len(),
            retry_count = policy.retry_count,
            "routing policy replaced"
        );
        self.handle.install(policy).await;
        Ok(())
    }
}
