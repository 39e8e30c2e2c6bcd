//! Provider gateway abstractions for Zeno.
//!
//! - `ProviderGateway`: object-safe trait each wire-protocol adapter implements
//! - `GatewayRegistry`: family-indexed lookup used by the orchestrator

pub mod provider;
pub mod registry;
