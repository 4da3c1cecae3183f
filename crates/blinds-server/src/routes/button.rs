use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/button: classify one gesture on the button pin.
///
/// The classifier blocks for as long as the button is held, so it runs on a
/// blocking worker rather than the async executor.
pub async fn get_button(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let probe = app.button.clone();
    let press = tokio::task::spawn_blocking(move || probe())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?
        .map_err(blinds_core::BlindsError::from)?;

    Ok(Json(serde_json::json!({ "press": press })))
}
