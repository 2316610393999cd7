//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - Dashboard read models and operator commands
//! - Activity API (persisted zone activities)
//! - Audit log files
//! - WebSocket fan-out

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        broker: state.controller.connection_state().await,
        dashboard_clients: state.realtime.connection_count(),
    })
}
