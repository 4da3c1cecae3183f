use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use blinds_core::scheduler::RecurringJob;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::routes::blinds::queued;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ScheduleBody {
    time: DateTime<Utc>,
    action: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// POST /api/schedule: run `action` once at `time` (RFC 3339).
pub async fn schedule_command(
    State(app): State<AppState>,
    Json(body): Json<ScheduleBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let id = app
        .handle
        .schedule_command(body.time, &body.action, &body.args)?;
    Ok(queued(&body.action, id))
}

#[derive(Deserialize)]
pub struct RecurringBody {
    name: String,
    first_time: DateTime<Utc>,
    period_seconds: u64,
    action: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// POST /api/recurring: register or replace a named recurring job.
pub async fn add_recurring(
    State(app): State<AppState>,
    Json(body): Json<RecurringBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let id = app.handle.schedule_recurring(
        &body.name,
        body.first_time,
        body.period_seconds,
        &body.action,
        &body.args,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "name": body.name, "job_id": id })),
    ))
}

#[derive(Deserialize)]
pub struct DailyBody {
    name: String,
    hour: u32,
    minute: u32,
    action: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// POST /api/recurring/daily: every day at `hour:minute` local time.
pub async fn add_daily(
    State(app): State<AppState>,
    Json(body): Json<DailyBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let id = app.handle.schedule_daily(
        &body.name,
        body.hour,
        body.minute,
        &body.action,
        &body.args,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "name": body.name, "job_id": id })),
    ))
}

#[derive(Serialize)]
pub struct RecurringEntry {
    name: String,
    next_time: DateTime<Utc>,
    action_name: &'static str,
    args: serde_json::Value,
    period: u64,
}

impl From<RecurringJob> for RecurringEntry {
    fn from(job: RecurringJob) -> Self {
        Self {
            action_name: job.command.action_name(),
            args: job.command.args(),
            next_time: job.next_fire_time,
            period: job.period.as_secs(),
            name: job.name,
        }
    }
}

/// GET /api/recurring
pub async fn list_recurring(State(app): State<AppState>) -> Json<Vec<RecurringEntry>> {
    Json(
        app.handle
            .get_recurring()
            .into_iter()
            .map(RecurringEntry::from)
            .collect(),
    )
}

/// DELETE /api/recurring/{name}: unknown names are a no-op, reported as
/// `removed: false`.
pub async fn delete_recurring(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Json<serde_json::Value> {
    let removed = app.handle.cancel_recurring(&name);
    Json(serde_json::json!({ "name": name, "removed": removed }))
}
