pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod store;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Config;
use crate::email::Mailer;
use crate::rate_limit::RouteRateLimiter;
use crate::state::{AppState, SharedState};
use crate::store::Store;

/// Assemble the router. Must be called within a tokio runtime: the rate
/// limiter's sweeper task is spawned here so every caller gets it.
pub fn build_app(store: Arc<dyn Store>, mailer: Option<Arc<dyn Mailer>>, config: Config) -> Router {
    let limiter = Arc::new(RouteRateLimiter::new(
        config.rate_limit_max,
        config.rate_limit_window_secs,
    ));
    tokio::spawn(limiter.clone().run_sweeper(Duration::from_secs(60)));

    let state: SharedState = Arc::new(AppState {
        store,
        config,
        mailer,
        limiter,
    });

    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
