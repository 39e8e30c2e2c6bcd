//! Session creation.
//!
//! POST /api/v1/session/new

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestClock};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NewSession {
    pub session_id: Uuid,
}

/// POST /api/v1/session/new - Create an empty conversation.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<NewSession>>, AppError> {
    let clock = RequestClock::start();
    let session = state.chat_service.create_session().await?;
    tracing::info!(session_id = %session.id, "session opened");

    Ok(Json(
        clock
            .respond(NewSession {
                session_id: session.id,
            })
            .with_link("chat", "/api/v1/chat/stream"),
    ))
}
