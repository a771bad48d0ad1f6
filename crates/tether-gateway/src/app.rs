use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tether_agent::SessionAgent;
use tether_core::config::TetherConfig;
use tether_sessions::SessionStore;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: TetherConfig,
    pub sessions: Arc<SessionStore<SessionAgent>>,
}

impl AppState {
    pub fn new(config: TetherConfig, sessions: Arc<SessionStore<SessionAgent>>) -> Self {
        Self { config, sessions }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.config.gateway.static_dir);

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/chat", post(crate::http::chat::create_session))
        .route(
            "/api/chat/{id}/history",
            get(crate::http::chat::session_history),
        )
        .route("/ws", get(crate::ws::connection::ws_handler))
        .fallback_service(static_dir)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
