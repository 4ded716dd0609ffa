//! HTTP surface for the hotel tax service.
//!
//! `GET /health` is always open. Everything else sits behind
//! [`auth::require_bearer`] when a token is configured.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod routes;
pub mod state;

use axum::Router;
use axum::middleware;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::{AppState, build_registry};

/// Full application router with state applied.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::directory::router())
        .merge(routes::configurations::router())
        .merge(routes::exemptions::router())
        .merge(routes::calculations::router())
        .merge(routes::reports::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .merge(routes::health::router())
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
