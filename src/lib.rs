//! Feedback intake endpoint.
//!
//! `POST /api/submit-feedback` takes `{rating, feedback, timestamp}`, throttles
//! per client address and relays a formatted message to a Telegram chat.
//! Throttling and the browser origin allow-list are independent and switched
//! on through [`config::FeedbackConfig`].
use std::sync::Arc;

use axum::{
    Router,
    routing::{any, get},
};

pub mod clock;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod message;
pub mod metrics;
pub mod models;
pub mod notifier;
pub mod rate_limit;
pub mod state;
pub mod store;

use handlers::{feedback_handler, health_handler, metrics_handler};
use state::AppState;

pub const FEEDBACK_PATH: &str = "/api/submit-feedback";

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(FEEDBACK_PATH, any(feedback_handler)) // method gate lives in the handler
        .with_state(state)
}
