//! Infrastructure layer for Zeno.
//!
//! Contains implementations of the ports defined in `zeno-core`: SQLite
//! storage, HTTP gateways for each provider family, the configuration
//! loader and the routing policy file watcher.

pub mod config;
pub mod llm;
pub mod policy_watch;
pub mod sqlite;
