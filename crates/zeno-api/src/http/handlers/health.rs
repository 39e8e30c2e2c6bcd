//! Liveness probe.
//!
//! GET /api/v1/health

use axum::Json;
use serde_json::{Value, json};

/// GET /api/v1/health - No auth, no envelope.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "operational",
        "system": "ZenoAi",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
