//! Session endpoints.
//!
//! `POST /api/chat` allocates a session and returns its id; the client then
//! binds a WebSocket to it with an `init` frame.
//!
//! Response: `{"sessionId": "..."}`
//! Error:    `{"error": "..."}`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tether_core::types::Turn;
use tether_sessions::SessionError;
use tracing::{info, warn};

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub session_id: String,
    pub history: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
}

type ApiError = (StatusCode, Json<ChatError>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ChatError {
            error: error.into(),
        }),
    )
}

/// POST /api/chat: create a session.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionCreated>, ApiError> {
    match state.sessions.create().await {
        Ok(session) => {
            info!(session_id = %session.id(), "session created");
            Ok(Json(SessionCreated {
                session_id: session.id().to_string(),
            }))
        }
        Err(e) => {
            warn!(error = %e, code = e.code(), "session creation failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// GET /api/chat/{id}/history: read-only view of the recorded turns.
pub async fn session_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionHistory>, ApiError> {
    match state.sessions.get(&id) {
        Ok(session) => Ok(Json(SessionHistory {
            session_id: session.id().to_string(),
            history: session.history(),
        })),
        Err(e @ SessionError::NotFound { .. }) => {
            Err(api_error(StatusCode::NOT_FOUND, e.to_string()))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
