mod feedback;
mod health;
mod metrics;

pub use feedback::feedback_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
