//! ProviderGateway trait definition.
//!
//! This is the abstraction every provider family implements. One call opens
//! one outbound streaming connection and yields the decoded text fragments.

use std::pin::Pin;

use futures_util::Stream;

use zeno_types::llm::{GenerationRequest, LlmError};

/// Lazy, finite, non-restartable sequence of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send + 'static>>;

/// Trait for provider wire-protocol adapters.
///
/// Implementations live in zeno-infra (`OpenAiCompatibleGateway`,
/// `GeminiGateway`). A gateway never retries and keeps no state between
/// calls. Fragments already yielded before an `Err` item stay delivered.
///
/// The trait is object-safe so the registry can hold `Arc<dyn ProviderGateway>`.
pub trait ProviderGateway: Send + Sync {
    /// Human-readable family name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Stream one generation. The request's `timeout` bounds the whole call.
    fn stream(&self, request: GenerationRequest) -> FragmentStream;
}
