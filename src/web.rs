use crate::error::{command_result, SessionError};
use crate::jobs::{JobKind, JobRecord};
use crate::state::AppState;
use axum::http::StatusCode;
use axum::{
    extract::ws::WebSocketUpgrade,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use quadlink_shared::{
    AttitudeResponse, BatteryResponse, ConnectResponse, ErrorBody, MessageResponse,
    StatusResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Public router constructor
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/takeoff", post(takeoff))
        .route("/read_parameters", post(read_parameters))
        .route("/read_battery_voltage", post(read_battery_voltage))
        .route("/status", get(status))
        .route("/ws", get(ws_handler))
        .route("/jobs/connect", post(start_connect_job))
        .route("/jobs/takeoff", post(start_takeoff_job))
        .route("/jobs/{id}", get(get_job))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::ConnectFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SessionError::TelemetryTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            SessionError::Link(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status != StatusCode::SERVICE_UNAVAILABLE {
            warn!("Request failed: {}", self);
        }
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConnectParams {
    uri: Option<String>,
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "Crazyflie": "Drone" }))
}

async fn connect(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectParams>,
) -> Result<Json<ConnectResponse>, SessionError> {
    let outcome = state.sessions.connect(params.uri.as_deref()).await?;
    Ok(Json(outcome.into()))
}

async fn disconnect(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    let outcome = state.sessions.disconnect().await;
    Json(MessageResponse::new(outcome.message()))
}

async fn takeoff(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, SessionError> {
    Ok(Json(state.commands.takeoff().await?))
}

async fn read_parameters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AttitudeResponse>, SessionError> {
    Ok(Json(state.commands.read_parameters().await?))
}

async fn read_battery_voltage(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BatteryResponse>, SessionError> {
    Ok(Json(state.commands.read_battery_voltage().await?))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(state.sessions.status().await)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let end = state.streamer.run(socket).await;
        debug!("[WS] Handler finished: {:?}", end);
    })
}

async fn start_connect_job(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConnectParams>,
) -> (StatusCode, Json<JobRecord>) {
    let sessions = state.sessions.clone();
    let record = state
        .jobs
        .spawn(JobKind::Connect, async move {
            let outcome = sessions.connect(params.uri.as_deref()).await;
            command_result(outcome.map(ConnectResponse::from))
        })
        .await;
    (StatusCode::ACCEPTED, Json(record))
}

async fn start_takeoff_job(State(state): State<Arc<AppState>>) -> (StatusCode, Json<JobRecord>) {
    let commands = state.commands.clone();
    let record = state
        .jobs
        .spawn(JobKind::Takeoff, async move {
            command_result(commands.takeoff().await)
        })
        .await;
    (StatusCode::ACCEPTED, Json(record))
}

async fn get_job(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Response {
    match state.jobs.get(id).await {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                detail: format!("no job {}", id),
            }),
        )
            .into_response(),
    }
}
