//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::activity_store::{
    suppress_exact_duplicates, ActivityRange, ActivityRequest, InsertOutcome,
};
use crate::error::{Error, Result};
use crate::ingest_service::IngestCommand;
use crate::models::ApiResponse;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Dashboard
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/dashboard/reset", post(reset_dashboard))
        .route("/api/sensors", get(list_sensors))
        .route("/api/connection", get(get_connection))
        .route("/api/connection/reconnect", post(reconnect))
        .route("/api/connection/check", post(check_connection))
        .route("/api/ball-alert/dismiss", post(dismiss_ball_alert))
        // Activities
        .route("/api/activity", get(list_activities).post(create_activity))
        // Audit logs
        .route("/api/log-event", get(list_log_events).post(create_log_event))
        .route("/api/deployments", get(list_deployments))
        // WebSocket
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Dashboard Handlers
// ========================================

async fn get_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.controller.view(Utc::now()).await))
}

/// Operator reset of activity-derived dashboard data
async fn reset_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.controller.reset(Utc::now()).await))
}

async fn list_sensors(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.controller.sensors().await))
}

async fn get_connection(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.controller.connection().await))
}

async fn send_command(state: &AppState, command: IngestCommand) -> Result<()> {
    state
        .ingest
        .send(command)
        .await
        .map_err(|_| Error::Internal("Ingest service is not running".to_string()))
}

/// Manual reconnect (clears the attempt budget)
async fn reconnect(State(state): State<AppState>) -> Result<impl IntoResponse> {
    send_command(&state, IngestCommand::Reconnect).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(json!({"command": "reconnect"}))),
    ))
}

/// Health re-check; reconnects only when disconnected
async fn check_connection(State(state): State<AppState>) -> Result<impl IntoResponse> {
    send_command(&state, IngestCommand::CheckHealth).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(json!({"command": "check_health"}))),
    ))
}

async fn dismiss_ball_alert(State(state): State<AppState>) -> impl IntoResponse {
    let dismissed = state.controller.dismiss_ball_alert().await;
    Json(ApiResponse::success(json!({"dismissed": dismissed})))
}

// ========================================
// Activity Handlers
// ========================================

#[derive(Deserialize)]
struct ActivityQuery {
    start: Option<String>,
    end: Option<String>,
}

/// Activities newest first, exact duplicates removed
async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse> {
    let range = ActivityRange::from_query(query.start.as_deref(), query.end.as_deref())?;
    let records = state.activity_store.list(&range).await?;
    Ok(Json(suppress_exact_duplicates(records)))
}

async fn create_activity(
    State(state): State<AppState>,
    Json(request): Json<ActivityRequest>,
) -> Result<axum::response::Response> {
    let activity = request.into_new_activity(Utc::now())?;

    let response = match state.activity_store.insert_deduplicated(activity).await? {
        InsertOutcome::Inserted(record) => (StatusCode::CREATED, Json(json!(record))).into_response(),
        InsertOutcome::Duplicate => {
            (StatusCode::OK, Json(json!({"duplicate": true}))).into_response()
        }
    };
    Ok(response)
}

// ========================================
// Audit Log Handlers
// ========================================

async fn list_log_events(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.event_log.entries().await?))
}

async fn create_log_event(
    State(state): State<AppState>,
    Json(entry): Json<serde_json::Value>,
) -> Result<impl IntoResponse> {
    if !entry.is_object() {
        return Err(Error::Validation("Log entry must be a JSON object".to_string()));
    }
    state.event_log.prepend(entry).await?;
    Ok(Json(json!({"success": true})))
}

async fn list_deployments(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.deployment_log.entries().await?))
}

// ========================================
// WebSocket Handler
// ========================================

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut rx) = state.realtime.register().await;

    // Forward hub messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
        conn_id
    });

    let conn_id = tokio::select! {
        _ = send_task => conn_id,
        result = recv_task => result.unwrap_or(conn_id),
    };

    state.realtime.unregister(&conn_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity_store::MemoryActivityStore;
    use crate::audit_log::JsonArrayLog;
    use crate::controller::DashboardController;
    use crate::forwarder::StoreForwarder;
    use crate::realtime_hub::RealtimeHub;
    use crate::snapshot_store::Snapshots;
    use crate::state::AppConfig;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn app_state(dir: &std::path::Path) -> (AppState, mpsc::Receiver<IngestCommand>) {
        let store = Arc::new(MemoryActivityStore::new("development"));
        let realtime = Arc::new(RealtimeHub::new());
        let controller = Arc::new(DashboardController::new(
            Snapshots::in_memory(),
            Arc::new(StoreForwarder::new(store.clone())),
            realtime.clone(),
        ));
        let (tx, rx) = mpsc::channel(4);

        let state = AppState {
            config: AppConfig::default(),
            controller,
            activity_store: store,
            realtime,
            ingest: tx,
            event_log: Arc::new(JsonArrayLog::new(dir.join("logs.json"))),
            deployment_log: Arc::new(JsonArrayLog::new(dir.join("deployment-log.json"))),
        };
        (state, rx)
    }

    fn request(body: serde_json::Value) -> Json<ActivityRequest> {
        Json(serde_json::from_value(body).unwrap())
    }

    #[tokio::test]
    async fn test_create_activity_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _rx) = app_state(dir.path());
        let body = json!({
            "memberId": "42",
            "activityType": "start",
            "zone": "Cardio Area",
            "objectType": "person",
            "timestamp": "2024-03-01T10:00:00Z"
        });

        let created = create_activity(State(state.clone()), request(body.clone()))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let duplicate = create_activity(State(state.clone()), request(body)).await.unwrap();
        assert_eq!(duplicate.status(), StatusCode::OK);

        let missing = create_activity(State(state), request(json!({"zone": "Pool"}))).await;
        match missing {
            Err(e) => assert_eq!(e.into_response().status(), StatusCode::BAD_REQUEST),
            Ok(_) => panic!("activity without activityType was accepted"),
        }
    }

    #[tokio::test]
    async fn test_list_activities_rejects_bad_range() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _rx) = app_state(dir.path());
        let result = list_activities(
            State(state),
            Query(ActivityQuery {
                start: Some("last tuesday".into()),
                end: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_reconnect_sends_command() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mut rx) = app_state(dir.path());
        reconnect(State(state)).await.unwrap();
        assert_eq!(rx.recv().await, Some(IngestCommand::Reconnect));
    }

    #[tokio::test]
    async fn test_log_event_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _rx) = app_state(dir.path());

        create_log_event(State(state.clone()), Json(json!({"user": "admin", "action": "login"})))
            .await
            .unwrap();
        assert!(create_log_event(State(state.clone()), Json(json!([1, 2])))
            .await
            .is_err());

        let entries = state.event_log.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["action"], "login");
    }

    #[tokio::test]
    async fn test_reset_dashboard_clears_occupancy() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _rx) = app_state(dir.path());
        let raw = crate::transport::RawMessage {
            topic: "Flasheye/flasheye-edge-35/event".into(),
            payload: serde_json::to_vec(&json!({"zone_name": "Pool", "object_class": "person"})).unwrap(),
        };
        state.controller.handle_message(&raw, Utc::now()).await;
        assert_eq!(state.controller.view(Utc::now()).await.occupancy["Pool"], 1);

        let response = reset_dashboard(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.controller.view(Utc::now()).await.occupancy.is_empty());
    }
}
