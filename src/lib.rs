pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod origin;
pub mod prompt;
pub mod state;
pub mod store;
pub mod worker;

use axum::{
    Router,
    routing::{any, get},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{generate_handler, health_handler, metrics_handler};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // any method: the handler checks the origin before the verb
        .route("/api/generate", any(generate_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
