//! Routing policy: which models a turn may use, in what order, and with
//! which limits.
//!
//! The policy is a singleton owned by the policy provider. Turns never see
//! it mutate: each takes an `Arc` snapshot and works from that frozen copy.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::llm::ProviderFamily;

/// Timeout applied to a model that has no entry in the model set.
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 15;

/// Per-model settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Whole-request timeout in seconds.
    #[serde(rename = "timeout", default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Wire-protocol family. `None` uses the server's default family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderFamily>,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_MODEL_TIMEOUT_SECS
}

impl ModelSettings {
    pub fn new(id: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            timeout_secs,
            provider: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The administrator-controlled routing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub default_model: String,
    #[serde(default)]
    pub models: Vec<ModelSettings>,
    /// Strict preference order, first = preferred.
    pub fallback_order: Vec<String>,
    /// Attempts per model before moving on.
    pub retry_count: u32,
    /// Output cap passed to providers.
    pub max_tokens: u32,
    /// Maximum number of prior messages included as context.
    pub memory_window: u32,
    pub system_prompt: String,
}

impl RoutingPolicy {
    /// Look up a model's settings by id.
    pub fn model(&self, id: &str) -> Option<&ModelSettings> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Timeout for `id`, falling back to [`DEFAULT_MODEL_TIMEOUT_SECS`].
    pub fn timeout_for(&self, id: &str) -> Duration {
        self.model(id)
            .map(ModelSettings::timeout)
            .unwrap_or(Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS))
    }

    /// `fallback_order` minus models explicitly disabled in the model set.
    ///
    /// Ids absent from the model set count as enabled.
    pub fn effective_fallback_order(&self) -> Vec<String> {
        self.fallback_order
            .iter()
            .filter(|id| self.model(id).is_none_or(|m| m.enabled))
            .cloned()
            .collect()
    }

    /// Reject policies the orchestrator cannot run.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.fallback_order.is_empty() {
            return Err(PolicyError::Invalid(
                "fallback_order must name at least one model".to_string(),
            ));
        }
        if self.fallback_order.iter().any(|id| id.trim().is_empty()) {
            return Err(PolicyError::Invalid(
                "fallback_order contains an empty model id".to_string(),
            ));
        }
        if self.retry_count == 0 {
            return Err(PolicyError::Invalid("retry_count must be at least 1".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(PolicyError::Invalid("max_tokens must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(PolicyError::Invalid(format!(
                    "model '{}' is listed more than once",
                    model.id
                )));
            }
            if model.timeout_secs == 0 {
                return Err(PolicyError::Invalid(format!(
                    "model '{}' must have a timeout of at least 1 second",
                    model.id
                )));
            }
        }

        if self.effective_fallback_order().is_empty() {
            return Err(PolicyError::Invalid(
                "every model in fallback_order is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        let models = vec![
            ModelSettings::new("google/gemini-2.0-flash-lite-preview-02-05:free", 20),
            ModelSettings::new("google/gemma-2-9b-it:free", 20),
            ModelSettings::new("meta-llama/llama-3-8b-instruct:free", 15),
            ModelSettings::new("mistralai/mistral-7b-instruct:free", 15),
        ];
        let fallback_order = models.iter().map(|m| m.id.clone()).collect();
        Self {
            default_model: models[0].id.clone(),
            models,
            fallback_order,
            retry_count: 2,
            max_tokens: 1024,
            memory_window: 10,
            system_prompt: "You are ZenoAi, an advanced AI backend.".to_string(),
        }
    }
}
