use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use blinds_core::config::MAX_DURATION_MS;
use blinds_core::scheduler::JobId;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Body returned by every endpoint that only queues work.
pub(crate) fn queued(action: &str, job_id: JobId) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "queued": action, "job_id": job_id })),
    )
}

/// POST /api/blinds/open
pub async fn open_blinds(State(app): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    queued("open_blinds", app.handle.open_blinds())
}

/// POST /api/blinds/close
pub async fn close_blinds(State(app): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    queued("close_blinds", app.handle.close_blinds())
}

#[derive(Deserialize)]
pub struct SetPositionBody {
    position_ms: u64,
}

/// POST /api/blinds/position: drive to `position_ms` of accumulated motor time.
pub async fn set_blinds(
    State(app): State<AppState>,
    Json(body): Json<SetPositionBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_range(body.position_ms)?;
    Ok(queued("set_blinds", app.handle.set_blinds(body.position_ms)))
}

fn check_range(position_ms: u64) -> Result<(), AppError> {
    if position_ms > MAX_DURATION_MS {
        return Err(AppError::bad_request(format!(
            "position {position_ms} ms is out of range"
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct ResetBody {
    #[serde(default)]
    position_ms: u64,
}

/// POST /api/blinds/reset: overwrite the believed position without moving.
/// An empty body resets to zero.
pub async fn reset_position(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let position_ms = if body.iter().all(u8::is_ascii_whitespace) {
        0
    } else {
        serde_json::from_slice::<ResetBody>(&body)
            .map_err(|e| AppError::bad_request(format!("reset body: {e}")))?
            .position_ms
    };
    check_range(position_ms)?;
    Ok(queued(
        "reset_position",
        app.handle.reset_position(position_ms),
    ))
}

/// GET /api/position
pub async fn get_position(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "position_ms": app.handle.get_position() }))
}

/// GET /api/state
pub async fn get_state(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "state": app.handle.get_state() }))
}

/// GET /api/status: position, state, config and last fault in one read.
pub async fn get_status(State(app): State<AppState>) -> Json<blinds_core::status::Status> {
    Json(app.handle.status())
}
