//! Provider gateway implementations.
//!
//! Concrete [`ProviderGateway`] adapters for each provider family, plus the
//! factory ([`build_registry`]) that wires them into a [`GatewayRegistry`]
//! from the server configuration.

pub mod gemini;
pub mod openai_compat;
pub(crate) mod sse;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tracing::{info, warn};

use zeno_core::llm::provider::ProviderGateway;
use zeno_core::llm::registry::GatewayRegistry;
use zeno_types::config::{ProviderEndpoint, ServerConfig};
use zeno_types::llm::{LlmError, ProviderFamily};

use self::gemini::GeminiGateway;
use self::openai_compat::OpenAiCompatibleGateway;

/// Build a registry with one gateway per family, reading API keys from the
/// process environment.
pub fn build_registry(config: &ServerConfig) -> Result<GatewayRegistry, LlmError> {
    build_registry_with(config, |name| std::env::var(name).ok())
}

/// Like [`build_registry`], with an explicit key lookup.
///
/// A family whose key variable is unset is still registered; its requests
/// go out unauthenticated and fail upstream, which the orchestrator treats
/// as an ordinary model failure.
pub fn build_registry_with(
    config: &ServerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GatewayRegistry, LlmError> {
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs.max(1));
    let providers = &config.providers;
    let mut registry = GatewayRegistry::new(providers.default_family);

    let key = resolve_key(ProviderFamily::OpenAiCompatible, &providers.openai_compatible, &lookup);
    let gateway = OpenAiCompatibleGateway::new(
        providers.openai_compatible.base_url.clone(),
        key,
        connect_timeout,
    )?;
    register(&mut registry, ProviderFamily::OpenAiCompatible, gateway, &providers.openai_compatible);

    let key = resolve_key(ProviderFamily::Gemini, &providers.gemini, &lookup);
    let gateway = GeminiGateway::new(providers.gemini.base_url.clone(), key, connect_timeout)?;
    register(&mut registry, ProviderFamily::Gemini, gateway, &providers.gemini);

    Ok(registry)
}

fn resolve_key(
    family: ProviderFamily,
    endpoint: &ProviderEndpoint,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    match lookup(&endpoint.api_key_env).filter(|k| !k.trim().is_empty()) {
        Some(key) => Some(SecretString::from(key)),
        None => {
            warn!(
                family = %family,
                env = %endpoint.api_key_env,
                "no API key configured; requests will be sent unauthenticated"
            );
            None
        }
    }
}

fn register(
    registry: &mut GatewayRegistry,
    family: ProviderFamily,
    gateway: impl ProviderGateway + 'static,
    endpoint: &ProviderEndpoint,
) {
    info!(family = %family, base_url = %endpoint.base_url, "registered provider gateway");
    registry.register(family, Arc::new(gateway));
}
