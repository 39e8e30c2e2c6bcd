//! HTTP/REST API layer for Zeno.
//!
//! Axum-based API: public routes under `/api/v1/`, admin routes under
//! `/api/admin/` with optional key authentication, envelope response
//! format, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
