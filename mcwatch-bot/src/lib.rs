pub mod config;
pub mod embeds;
mod error;
pub mod helpers;
pub mod notifier;
pub mod ping;
mod routes;
pub mod scheduler;
pub mod validation;

use axum::{Router, http::StatusCode, routing::get};
use mcwatch_db::Tracker;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Players shown by ranking queries when no limit is given.
pub const DEFAULT_TOP_LIMIT: usize = 10;

pub struct AppState {
    pub tracker: Arc<Tracker>,
}

/// Create the read-only HTTP API over the tracker
pub fn create_app(
    tracker: Arc<Tracker>,
    request_body_limit: usize,
    request_timeout: Duration,
) -> Router {
    let state = Arc::new(AppState { tracker });

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/players/top", get(routes::top_players))
        .route("/players/{name}", get(routes::player))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(request_body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
