//! Routing policy provider for Zeno.
//!
//! - `PolicyRepository`: storage port
//! - `PolicyHandle`: atomically swapped snapshot shared with every turn
//! - `PolicyService`: seeding, validation and full replacement

pub mod handle;
pub mod repository;
pub mod service;
