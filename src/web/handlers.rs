use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::alarms::{ActiveAlarm, AlarmDefinition, AlarmId, NewAlarmDefinition};
use crate::error::AlarmError;
use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    uptime: u64,
    definitions: usize,
    active_alarms: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.engine.stats().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        uptime: state.started.elapsed().as_secs(),
        definitions: stats.definitions,
        active_alarms: stats.active_alarms,
    })
}

pub async fn list_active(State(state): State<AppState>) -> Json<Vec<ActiveAlarm>> {
    Json(state.engine.list_active().await)
}

pub async fn get_alarm(
    Path(id): Path<AlarmId>,
    State(state): State<AppState>,
) -> Result<Json<ActiveAlarm>, AlarmError> {
    Ok(Json(state.engine.get_active(id).await?))
}

#[derive(Serialize)]
pub struct CommandResponse {
    status: &'static str,
    alarm: ActiveAlarm,
}

pub async fn acknowledge(
    Path(id): Path<AlarmId>,
    State(state): State<AppState>,
) -> Result<Json<CommandResponse>, AlarmError> {
    let alarm = state.engine.acknowledge(id).await?;
    Ok(Json(CommandResponse { status: "acknowledged", alarm }))
}

#[derive(Deserialize)]
pub struct ShelveRequest {
    duration_seconds: u64,
}

pub async fn shelve(
    Path(id): Path<AlarmId>,
    State(state): State<AppState>,
    Json(req): Json<ShelveRequest>,
) -> Result<Json<CommandResponse>, AlarmError> {
    if req.duration_seconds == 0 {
        return Err(AlarmError::InvalidDuration("duration_seconds must be positive".to_string()));
    }
    let alarm = state.engine.shelve(id, Duration::from_secs(req.duration_seconds)).await?;
    Ok(Json(CommandResponse { status: "shelved", alarm }))
}

pub async fn list_definitions(State(state): State<AppState>) -> Json<Vec<AlarmDefinition>> {
    Json(state.engine.list_definitions().await)
}

pub async fn create_definition(
    State(state): State<AppState>,
    Json(draft): Json<NewAlarmDefinition>,
) -> Result<(StatusCode, Json<AlarmDefinition>), AlarmError> {
    let definition = state.engine.create_definition(draft).await?;
    Ok((StatusCode::CREATED, Json(definition)))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AlarmError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AlarmError::NotFound(_) => StatusCode::NOT_FOUND,
            AlarmError::InvalidTransition { .. } | AlarmError::ShelveSuppressed => {
                StatusCode::CONFLICT
            }
            AlarmError::InvalidDuration(_)
            | AlarmError::Config(_)
            | AlarmError::Decode(_)
            | AlarmError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AlarmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
