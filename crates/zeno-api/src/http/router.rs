//! Axum router configuration with middleware.
//!
//! Public routes live under `/api/v1/`, admin routes under `/api/admin/`.
//! Middleware: CORS, tracing.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/session/new", post(handlers::session::create_session))
        .route("/chat/stream", post(handlers::chat::stream_chat));

    let admin_routes = Router::new()
        .route("/stats", get(handlers::admin::get_stats))
        .route(
            "/config",
            get(handlers::admin::get_config).post(handlers::admin::replace_config),
        )
        .route("/requests/live", get(handlers::admin::live_requests));

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/api/admin", admin_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// Connect info is attached so admission control can key on the peer IP.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
