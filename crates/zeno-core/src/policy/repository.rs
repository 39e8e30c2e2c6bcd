//! PolicyRepository trait definition.

use zeno_types::error::RepositoryError;
use zeno_types::policy::RoutingPolicy;

/// Durable storage for the singleton routing policy.
///
/// Implementations live in zeno-infra (e.g., `SqlitePolicyRepository`).
pub trait PolicyRepository: Send + Sync {
    /// The stored policy, or `None` before the first save.
    fn load_policy(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<RoutingPolicy>, RepositoryError>> + Send;

    /// Overwrite the stored policy.
    fn save_policy(
        &self,
        policy: &RoutingPolicy,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
