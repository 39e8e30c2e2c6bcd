//! Conversation persistence abstractions for Zeno.
//!
//! `ChatRepository` is the port the infrastructure layer implements;
//! `ChatService` is the conversation store the orchestrator talks to.

pub mod repository;
pub mod service;
