//! Gateway registry for runtime adapter lookup.
//!
//! Maps each provider family to its adapter and resolves a model id to the
//! adapter that serves it.

use std::collections::HashMap;
use std::sync::Arc;

use zeno_types::llm::{LlmError, ProviderFamily};
use zeno_types::policy::RoutingPolicy;

use super::provider::ProviderGateway;

/// Registry of provider adapters, indexed by family.
pub struct GatewayRegistry {
    gateways: HashMap<ProviderFamily, Arc<dyn ProviderGateway>>,
    default_family: ProviderFamily,
}

impl GatewayRegistry {
    /// Create an empty registry. Models without an explicit family resolve
    /// to `default_family`.
    pub fn new(default_family: ProviderFamily) -> Self {
        Self {
            gateways: HashMap::new(),
            default_family,
        }
    }

    /// Register an adapter for a family, replacing any existing one.
    pub fn register(&mut self, family: ProviderFamily, gateway: Arc<dyn ProviderGateway>) {
        self.gateways.insert(family, gateway);
    }

    pub fn default_family(&self) -> ProviderFamily {
        self.default_family
    }

    /// Family that serves `model` under `policy`.
    pub fn family_for(&self, policy: &RoutingPolicy, model: &str) -> ProviderFamily {
        policy
            .model(model)
            .and_then(|m| m.provider)
            .unwrap_or(self.default_family)
    }

    /// Adapter that serves `model` under `policy`.
    pub fn resolve(
        &self,
        policy: &RoutingPolicy,
        model: &str,
    ) -> Result<Arc<dyn ProviderGateway>, LlmError> {
        let family = self.family_for(policy, model);
        self.gateways
            .get(&family)
            .cloned()
            .ok_or_else(|| LlmError::UnknownModel(model.to_string()))
    }

    /// List registered families.
    pub fn families(&self) -> Vec<ProviderFamily> {
        self.gateways.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::FragmentStream;
    use zeno_types::llm::GenerationRequest;
    use zeno_types::policy::ModelSettings;

    struct NamedGateway(&'static str);

    impl ProviderGateway for NamedGateway {
        fn name(&self) -> &str {
            self.0
        }

        fn stream(&self, _request: GenerationRequest) -> FragmentStream {
            Box::pin(futures_util::stream::empty())
        }
    }

    fn policy() -> RoutingPolicy {
        let mut gemini = ModelSettings::new("gemini-flash", 10);
        gemini.provider = Some(ProviderFamily::Gemini);
        RoutingPolicy {
            default_model: "gemini-flash".to_string(),
            models: vec![gemini, ModelSettings::new("llama", 10)],
            fallback_order: vec!["gemini-flash".to_string(), "llama".to_string()],
            retry_count: 1,
            max_tokens: 10,
            memory_window: 0,
            system_prompt: String::new(),
        }
    }

    #[test]
    fn resolves_by_explicit_family_then_default() {
        let mut registry = GatewayRegistry::new(ProviderFamily::OpenAiCompatible);
        registry.register(ProviderFamily::Gemini, Arc::new(NamedGateway("gemini")));
        registry.register(
            ProviderFamily::OpenAiCompatible,
            Arc::new(NamedGateway("openai_compatible")),
        );

        let policy = policy();
        assert_eq!(registry.resolve(&policy, "gemini-flash").unwrap().name(), "gemini");
        assert_eq!(registry.resolve(&policy, "llama").unwrap().name(), "openai_compatible");
        assert_eq!(
            registry.resolve(&policy, "not-listed").unwrap().name(),
            "openai_compatible"
        );
    }

    #[test]
    fn missing_family_is_unknown_model() {
        let registry = GatewayRegistry::new(ProviderFamily::OpenAiCompatible);
        let err = registry.resolve(&policy(), "llama").err().unwrap();
        assert!(matches!(err, LlmError::UnknownModel(ref m) if m == "llama"));
    }
}
