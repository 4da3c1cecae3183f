use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use blinds_core::config::{Config, ConfigPatch};

use crate::error::AppError;
use crate::routes::blinds::queued;
use crate::state::AppState;

/// GET /api/config: the config the run loop is currently using.
pub async fn get_config(State(app): State<AppState>) -> Json<Config> {
    Json(app.handle.get_config())
}

/// PATCH /api/config: queue a reconfigure. Keys absent from the body keep
/// their value; the merged result is validated before anything is queued.
pub async fn update_config(
    State(app): State<AppState>,
    Json(patch): Json<ConfigPatch>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let id = app.handle.reconfigure(patch)?;
    Ok(queued("reconfigure", id))
}
