//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Core services are generic over repository traits; AppState pins them to
//! the SQLite implementations.

use std::sync::Arc;
use std::time::Duration;

use zeno_core::admission::RateLimiter;
use zeno_core::chat::service::ChatService;
use zeno_core::llm::registry::GatewayRegistry;
use zeno_core::policy::handle::PolicyHandle;
use zeno_core::policy::service::PolicyService;
use zeno_core::turn::backoff::Backoff;
use zeno_core::turn::orchestrator::FallbackOrchestrator;
use zeno_infra::llm::build_registry;
use zeno_infra::sqlite::chat::SqliteChatRepository;
use zeno_infra::sqlite::metrics::SqliteMetricsRepository;
use zeno_infra::sqlite::policy::SqlitePolicyRepository;
use zeno_infra::sqlite::pool::DatabasePool;
use zeno_types::config::ServerConfig;

/// How often idle rate-limit keys are dropped.
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

pub type ConcreteChatService = ChatService<SqliteChatRepository>;

pub type ConcretePolicyService = PolicyService<SqlitePolicyRepository>;

pub type ConcreteOrchestrator = FallbackOrchestrator<SqliteChatRepository, SqliteMetricsRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub chat_service: Arc<ConcreteChatService>,
    pub policy_service: Arc<ConcretePolicyService>,
    pub metrics: Arc<SqliteMetricsRepository>,
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub limiter: Arc<RateLimiter>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Connect to the database, build provider gateways and wire services.
    pub async fn init(config: ServerConfig) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::new(&config.database_url).await?;
        let registry = build_registry(&config)?;
        Self::from_parts(config, db_pool, registry).await
    }

    /// Wire services over an open pool and a ready gateway registry.
    ///
    /// Loads the stored routing policy, seeding the default on first start.
    pub async fn from_parts(
        config: ServerConfig,
        db_pool: DatabasePool,
        registry: GatewayRegistry,
    ) -> anyhow::Result<Self> {
        let policy_service = PolicyService::new(
            SqlitePolicyRepository::new(db_pool.clone()),
            PolicyHandle::default(),
        );
        policy_service.load_or_seed().await?;

        let chat_service = Arc::new(ChatService::new(SqliteChatRepository::new(db_pool.clone())));
        let metrics = Arc::new(SqliteMetricsRepository::new(db_pool.clone()));

        let orchestrator = FallbackOrchestrator::new(
            Arc::clone(&chat_service),
            Arc::clone(&metrics),
            policy_service.handle().clone(),
            Arc::new(registry),
            Backoff::new(config.backoff_base_secs),
        );

        let limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        );

        Ok(Self {
            config: Arc::new(config),
            chat_service,
            policy_service: Arc::new(policy_service),
            metrics,
            orchestrator: Arc::new(orchestrator),
            limiter: Arc::new(limiter),
            db_pool,
        })
    }

    /// Periodically drop idle rate-limit keys. Runs until the runtime stops.
    pub fn spawn_limiter_pruning(&self) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(&self.limiter);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
            loop {
                ticker.tick().await;
                let removed = limiter.prune(std::time::Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.tracked_keys(), "pruned rate-limit keys");
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fake gateways and a state backed by a throwaway database.

    use std::sync::Arc;

    use tempfile::TempDir;
    use zeno_core::llm::provider::{FragmentStream, ProviderGateway};
    use zeno_core::llm::registry::GatewayRegistry;
    use zeno_infra::sqlite::pool::DatabasePool;
    use zeno_types::config::ServerConfig;
    use zeno_types::llm::{GenerationRequest, LlmError, ProviderFamily};
    use zeno_types::policy::{ModelSettings, RoutingPolicy};

    use super::AppState;

    /// Replies to every request with fixed fragments, or always fails.
    pub struct FakeGateway {
        pub fragments: Option<Vec<&'static str>>,
    }

    impl ProviderGateway for FakeGateway {
        fn name(&self) -> &str {
            "fake"
        }

        fn stream(&self, _request: GenerationRequest) -> FragmentStream {
            let fragments = self.fragments.clone();
            Box::pin(async_stream::stream! {
                match fragments {
                    Some(fragments) => {
                        for f in fragments {
                            yield Ok(f.to_string());
                        }
                    }
                    None => yield Err(LlmError::Status { status: 503, body: "down".to_string() }),
                }
            })
        }
    }

    /// A two-model, single-retry policy so failures never wait on backoff.
    pub fn test_policy() -> RoutingPolicy {
        RoutingPolicy {
            default_model: "A".to_string(),
            models: vec![ModelSettings::new("A", 5), ModelSettings::new("B", 5)],
            fallback_order: vec!["A".to_string(), "B".to_string()],
            retry_count: 1,
            max_tokens: 100,
            memory_window: 10,
            system_prompt: "test".to_string(),
        }
    }

    pub async fn test_state(
        dir: &TempDir,
        gateway: FakeGateway,
        config: ServerConfig,
    ) -> AppState {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("api.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        let mut registry = GatewayRegistry::new(ProviderFamily::OpenAiCompatible);
        registry.register(ProviderFamily::OpenAiCompatible, Arc::new(gateway));

        let state = AppState::from_parts(config, pool, registry).await.unwrap();
        state
            .policy_service
            .replace_policy(test_policy())
            .await
            .unwrap();
        state
    }
}
