use std::sync::Arc;

use axum::http::StatusCode;
use blinds_core::clock::{Clock, ManualClock};
use blinds_core::config::Config;
use blinds_core::controller::Controller;
use blinds_core::driver::{Level, SimulatedDriver};
use blinds_server::auth::BasicAuth;
use blinds_server::state::AppState;
use chrono::DateTime;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Rig {
    _dir: TempDir,
    drv: Arc<SimulatedDriver>,
    clock: Arc<ManualClock>,
    controller: Controller<SimulatedDriver>,
    app: axum::Router,
}

fn rig() -> Rig {
    let dir = TempDir::new().unwrap();
    let config = Config {
        save_path: dir.path().join("blinds.json"),
        ..Config::default()
    };
    let drv = Arc::new(SimulatedDriver::new());
    let clock = Arc::new(ManualClock::new(
        DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    ));
    let controller = Controller::new(drv.clone(), config, clock.clone()).unwrap();
    let state = AppState::with_driver(controller.handle(), drv.clone());
    let app = blinds_server::build_router(state, BasicAuth::none());
    Rig {
        _dir: dir,
        drv,
        clock,
        controller,
        app,
    }
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_is_queued_then_executed_by_the_loop() {
    let mut r = rig();
    let (status, body) = send(r.app.clone(), "POST", "/api/blinds/open", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["queued"], "open_blinds");

    let (_, before) = get(r.app.clone(), "/api/position").await;
    assert_eq!(before["position_ms"], 0);

    r.controller.run_pending();
    let (_, after) = get(r.app.clone(), "/api/position").await;
    assert_eq!(after["position_ms"], 6000);
    let (_, state) = get(r.app.clone(), "/api/state").await;
    assert_eq!(state["state"], "REST");
}

#[tokio::test]
async fn rapid_position_requests_collapse() {
    let mut r = rig();
    post_json(
        r.app.clone(),
        "/api/blinds/position",
        serde_json::json!({ "position_ms": 6000 }),
    )
    .await;
    post_json(
        r.app.clone(),
        "/api/blinds/position",
        serde_json::json!({ "position_ms": 2000 }),
    )
    .await;
    r.controller.run_pending();
    assert_eq!(r.drv.pulses(0), vec![(0, 2000)]);
    let (_, body) = get(r.app.clone(), "/api/position").await;
    assert_eq!(body["position_ms"], 2000);
}

#[tokio::test]
async fn position_past_signed_range_is_400() {
    let mut r = rig();
    let (status, body) = post_json(
        r.app.clone(),
        "/api/blinds/position",
        serde_json::json!({ "position_ms": u64::MAX }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"));
    r.controller.run_pending();
    assert!(r.drv.pulses(0).is_empty());
}

#[tokio::test]
async fn reset_accepts_empty_and_explicit_bodies() {
    let mut r = rig();
    let (status, _) = post_json(
        r.app.clone(),
        "/api/blinds/reset",
        serde_json::json!({ "position_ms": 1200 }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    r.controller.run_pending();
    let (_, body) = get(r.app.clone(), "/api/position").await;
    assert_eq!(body["position_ms"], 1200);

    let (status, _) = send(r.app.clone(), "POST", "/api/blinds/reset", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    r.controller.run_pending();
    let (_, body) = get(r.app.clone(), "/api/position").await;
    assert_eq!(body["position_ms"], 0);
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[tokio::test]
async fn patch_config_applies_after_the_loop_runs() {
    let mut r = rig();
    let (status, _) = send(
        r.app.clone(),
        "PATCH",
        "/api/config",
        Some(serde_json::json!({ "open_duration_ms": 4000 })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    r.controller.run_pending();

    let (_, config) = get(r.app.clone(), "/api/config").await;
    assert_eq!(config["open_duration_ms"], 4000);
}

#[tokio::test]
async fn patch_config_with_clashing_pins_is_400() {
    let r = rig();
    let (status, body) = send(
        r.app.clone(),
        "PATCH",
        "/api/config",
        Some(serde_json::json!({ "motor_pin": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("pin"));
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn schedule_runs_at_requested_time() {
    let mut r = rig();
    let at = r.clock.now() + chrono::Duration::minutes(15);
    let (status, _) = post_json(
        r.app.clone(),
        "/api/schedule",
        serde_json::json!({ "time": at.to_rfc3339(), "action": "set_blinds", "args": [3000] }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    r.controller.run_pending();
    assert_eq!(r.controller.blinds().position(), 0);
    r.clock.set(at);
    r.controller.run_pending();
    assert_eq!(r.controller.blinds().position(), 3000);
}

#[tokio::test]
async fn schedule_unknown_action_is_400() {
    let r = rig();
    let (status, body) = post_json(
        r.app.clone(),
        "/api/schedule",
        serde_json::json!({ "time": r.clock.now().to_rfc3339(), "action": "dance" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("dance"));
}

#[tokio::test]
async fn recurring_lifecycle() {
    let r = rig();
    let first = r.clock.now() + chrono::Duration::hours(2);
    let (status, body) = post_json(
        r.app.clone(),
        "/api/recurring",
        serde_json::json!({
            "name": "morning",
            "first_time": first.to_rfc3339(),
            "period_seconds": 86400,
            "action": "open_blinds",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "morning");

    let (_, list) = get(r.app.clone(), "/api/recurring").await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["name"], "morning");
    assert_eq!(list[0]["period"], 86400);
    assert_eq!(list[0]["action_name"], "open_blinds");
    assert_eq!(list[0]["args"], serde_json::json!([]));
    assert!(list[0]["next_time"].is_string());

    let (status, body) = send(r.app.clone(), "DELETE", "/api/recurring/morning", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);
    // Cancelling an unknown name is a no-op, not an error.
    let (status, body) = send(r.app.clone(), "DELETE", "/api/recurring/morning", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], false);

    let (_, list) = get(r.app.clone(), "/api/recurring").await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn recurring_period_past_the_calendar_is_400() {
    let mut r = rig();
    let (status, body) = post_json(
        r.app.clone(),
        "/api/recurring",
        serde_json::json!({
            "name": "x",
            "first_time": r.clock.now().to_rfc3339(),
            "period_seconds": 10_000_000_000_000u64,
            "action": "save",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"));
    r.controller.run_pending();
    let (_, list) = get(r.app.clone(), "/api/recurring").await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn daily_registers_a_one_day_period() {
    let r = rig();
    let (status, _) = post_json(
        r.app.clone(),
        "/api/recurring/daily",
        serde_json::json!({ "name": "evening", "hour": 21, "minute": 15, "action": "close_blinds" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, list) = get(r.app.clone(), "/api/recurring").await;
    assert_eq!(list[0]["period"], 86400);

    let (status, _) = post_json(
        r.app.clone(),
        "/api/recurring/daily",
        serde_json::json!({ "name": "bad", "hour": 25, "minute": 0, "action": "open_blinds" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

#[tokio::test]
async fn button_reports_press_kind() {
    let r = rig();
    r.drv.script_input(28, &[(0, Level::Low), (1500, Level::High)]);
    let (status, body) = get(r.app.clone(), "/api/button").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["press"], "LONG_PRESS");

    let (_, body) = get(r.app.clone(), "/api/button").await;
    assert_eq!(body["press"], "NO_PRESS");
}

#[tokio::test]
async fn button_fault_is_500() {
    let r = rig();
    r.drv.fail_pin(28);
    let (status, body) = get(r.app.clone(), "/api/button").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("pin 28"));
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn basic_auth_guards_every_route_when_enabled() {
    let r = rig();
    let state = AppState::with_driver(r.controller.handle(), r.drv.clone());
    let app = blinds_server::build_router(state, BasicAuth::new("admin", "hunter2"));
    let (status, _) = get(app.clone(), "/api/position").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    use base64::Engine;
    let token = base64::engine::general_purpose::STANDARD.encode("admin:hunter2");
    let req = axum::http::Request::builder()
        .uri("/api/position")
        .header("authorization", format!("Basic {token}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
