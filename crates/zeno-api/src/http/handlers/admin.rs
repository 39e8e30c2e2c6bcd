//! Administrative endpoints.
//!
//! Endpoints:
//! - GET  /api/admin/stats          - Dashboard aggregates
//! - GET  /api/admin/config         - Live routing policy
//! - POST /api/admin/config         - Replace the routing policy
//! - GET  /api/admin/requests/live  - Most recent turn metrics

use axum::Json;
use axum::extract::State;

use zeno_core::metrics::repository::MetricsRepository;
use zeno_types::metric::{LiveRequest, TurnStats};
use zeno_types::policy::RoutingPolicy;

use crate::http::error::AppError;
use crate::http::extractors::admin::AdminAuthorized;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

/// Number of rows in the live request feed.
pub const LIVE_REQUEST_LIMIT: u32 = 20;

/// GET /api/admin/stats - Request volume, latency, fallbacks, model mix.
pub async fn get_stats(
    State(state): State<AppState>,
    _auth: AdminAuthorized,
) -> Result<Json<ApiResponse<TurnStats>>, AppError> {
    let clock = RequestClock::start();
    let since = chrono::Utc::now() - chrono::Duration::hours(1);
    let stats = state.metrics.stats(since).await?;
    Ok(Json(clock.respond(stats).with_link("self", "/api/admin/stats")))
}

/// GET /api/admin/config - The routing policy turns currently use.
pub async fn get_config(
    State(state): State<AppState>,
    _auth: AdminAuthorized,
) -> Result<Json<ApiResponse<RoutingPolicy>>, AppError> {
    let clock = RequestClock::start();
    let policy = state.policy_service.current_policy().await;
    Ok(Json(clock.respond(RoutingPolicy::clone(&policy))))
}

/// POST /api/admin/config - Full replace; invalid policies are rejected and
/// the previous one stays live.
pub async fn replace_config(
    State(state): State<AppState>,
    _auth: AdminAuthorized,
    Json(policy): Json<RoutingPolicy>,
) -> Result<Json<ApiResponse<RoutingPolicy>>, AppError> {
    let clock = RequestClock::start();
    state.policy_service.replace_policy(policy).await?;
    let live = state.policy_service.current_policy().await;
    tracing::info!(fallback_order = ?live.fallback_order, "routing policy updated via API");
    Ok(Json(clock.respond(RoutingPolicy::clone(&live))))
}

/// GET /api/admin/requests/live - Newest turn metrics first.
pub async fn live_requests(
    State(state): State<AppState>,
    _auth: AdminAuthorized,
) -> Result<Json<ApiResponse<Vec<LiveRequest>>>, AppError> {
    let clock = RequestClock::start();
    let rows = state
        .metrics
        .recent_metrics(LIVE_REQUEST_LIMIT)
        .await?
        .into_iter()
        .map(LiveRequest::from)
        .collect();
    Ok(Json(clock.respond(rows)))
}
