use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use domain::{Alert, AlertKind, Urgency};

use crate::{error::ApiError, state::AppState, websocket};

/// 协作子系统投递的警报负载
#[derive(Debug, Deserialize)]
struct AlertPayload {
    #[serde(flatten)]
    kind: AlertKind,
    title: String,
    message: String,
    urgency: Urgency,
}

#[derive(Debug, Serialize)]
struct AlertAccepted {
    alert_id: String,
    topics: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket::ws_handler))
        .route("/api/v1/alerts", post(enqueue_alert))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// 警报入口
///
/// 资源、挑战、影响力等子系统在自己的 CRUD 提交后，经此把警报
/// 交给分发器。授权门槛由分发器按警报类别施加。
async fn enqueue_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AlertPayload>,
) -> Result<Json<AlertAccepted>, ApiError> {
    let emitter = state.jwt_service.extract_identity_from_headers(&headers)?;

    let alert = Alert::new(
        payload.kind,
        payload.title,
        payload.message,
        payload.urgency,
        emitter,
        state.dispatcher.clock().now(),
    );
    let alert_id = alert.id;

    let topics = state.dispatcher.dispatch(alert).await?;
    Ok(Json(AlertAccepted {
        alert_id: alert_id.to_string(),
        topics: topics.iter().map(|topic| topic.to_string()).collect(),
    }))
}
