//! Business logic and repository trait definitions for Zeno.
//!
//! This crate defines the "ports" (repository and gateway traits) that the
//! infrastructure layer implements, plus the fallback orchestrator that
//! drives a conversation turn across them. It depends only on `zeno-types`,
//! never on `zeno-infra` or any database/IO crate.

pub mod admission;
pub mod chat;
pub mod llm;
pub mod metrics;
pub mod policy;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;
