//! SSE streaming chat endpoint.
//!
//! POST /api/v1/chat/stream
//!
//! Admits the caller, checks the session, then relays the orchestrator's
//! turn as Server-Sent Events. Every frame is a bare `data:` line:
//! - `{"content": "..."}` -- incremental text (including the outage notice)
//! - `{"error": "...", "detail": "..."}` -- internal fault, at most once
//! - `[DONE]` -- end of stream, always last

use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::Stream;
use uuid::Uuid;

use zeno_core::turn::orchestrator::{TurnEvent, TurnRequest};

use crate::http::error::AppError;
use crate::http::extractors::client::ClientIp;
use crate::state::AppState;

/// End-of-stream marker frame.
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize)]
pub struct StreamChatRequest {
    pub session_id: String,
    pub message: String,
}

/// POST /api/v1/chat/stream - Stream one conversation turn.
pub async fn stream_chat(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<StreamChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if let Err(limited) = state.limiter.check(&client_ip) {
        tracing::warn!(client = %client_ip, "admission rejected");
        return Err(limited.into());
    }

    let session_id: Uuid = body
        .session_id
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid session_id: {}", body.session_id)))?;

    if body.message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    if state.chat_service.get_session(&session_id).await?.is_none() {
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    tracing::debug!(%session_id, client = %client_ip, "starting turn");
    let events = state.orchestrator.stream_turn(TurnRequest {
        session_id,
        message: body.message,
    });

    let frames = events.map(|event| Ok::<_, Infallible>(to_sse_event(&event)));
    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &TurnEvent) -> Event {
    Event::default().data(frame_data(event))
}

/// Payload of the `data:` line for one turn event.
fn frame_data(event: &TurnEvent) -> String {
    match event {
        TurnEvent::Fragment(text) => json!({ "content": text }).to_string(),
        TurnEvent::Error { message, detail } => {
            json!({ "error": message, "detail": detail }).to_string()
        }
        TurnEvent::Done => DONE_MARKER.to_string(),
    }
}
