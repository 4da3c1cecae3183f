pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::BasicAuth;
use crate::state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState, auth: BasicAuth) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Motion
        .route("/api/blinds/open", post(routes::blinds::open_blinds))
        .route("/api/blinds/close", post(routes::blinds::close_blinds))
        .route("/api/blinds/position", post(routes::blinds::set_blinds))
        .route("/api/blinds/reset", post(routes::blinds::reset_position))
        // Reads
        .route("/api/position", get(routes::blinds::get_position))
        .route("/api/state", get(routes::blinds::get_state))
        .route("/api/status", get(routes::blinds::get_status))
        // Config
        .route(
            "/api/config",
            get(routes::config::get_config).patch(routes::config::update_config),
        )
        // Scheduling
        .route("/api/schedule", post(routes::schedule::schedule_command))
        .route(
            "/api/recurring",
            get(routes::schedule::list_recurring).post(routes::schedule::add_recurring),
        )
        .route("/api/recurring/daily", post(routes::schedule::add_daily))
        .route(
            "/api/recurring/{name}",
            delete(routes::schedule::delete_recurring),
        )
        // Button
        .route("/api/button", get(routes::button::get_button))
        .layer(middleware::from_fn_with_state(
            Arc::new(auth),
            auth::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the API on a pre-bound listener until `shutdown` resolves.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port
/// before starting (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    auth: BasicAuth,
    listener: tokio::net::TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    if auth.is_enabled() {
        tracing::info!("HTTP Basic auth enabled");
    }
    let app = build_router(app_state, auth);

    tracing::info!("Blinds API listening on http://0.0.0.0:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `0.0.0.0:port` and serve until `shutdown` resolves.
pub async fn serve(
    app_state: AppState,
    auth: BasicAuth,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, auth, listener, shutdown).await
}
