use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("feedback_requests_total", "Total number of feedback requests").unwrap();
    pub static ref ACCEPTED_TOTAL: Counter =
        register_counter!("feedback_accepted_total", "Feedback relayed to the chat").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("feedback_rate_limited_total", "Submissions rejected by the per-IP limit").unwrap();
    pub static ref NOTIFY_FAILURES: Counter =
        register_counter!("feedback_notify_failures_total", "Failed sendMessage calls").unwrap();
    pub static ref NOTIFY_LATENCY: Histogram = register_histogram!(
        "feedback_notify_latency_seconds",
        "sendMessage latency in seconds"
    )
    .unwrap();
}
