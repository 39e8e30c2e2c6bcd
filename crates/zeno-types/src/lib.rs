//! Shared domain types for Zeno.
//!
//! This crate contains the types used across the Zeno workspace: sessions
//! and messages, the routing policy, turn metrics, provider request shapes,
//! server configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod metric;
pub mod policy;
