//! Conversation turn execution.
//!
//! - `FallbackOrchestrator`: retry, fallback and degradation across models
//! - `Backoff` / `Sleeper`: retry pacing with an injectable sleep

pub mod backoff;
pub mod orchestrator;
