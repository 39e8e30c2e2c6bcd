//! Turn telemetry abstractions for Zeno.
//!
//! Metrics are best-effort: the orchestrator logs and swallows recording
//! failures, so a missing metric never fails a turn.

pub mod repository;
