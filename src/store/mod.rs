//! Submission counters.
//!
//! The handler never reads a counter and writes it back in two steps. Instead
//! the store performs a *reservation*: check the policy and, if it passes,
//! store `{count + 1, now}` with a fresh window TTL, all under one lock (or one
//! Lua script for Redis). When delivery fails afterwards the reservation is
//! released, which puts the previous counter back unless a newer submission
//! already replaced it.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::SubmissionCounter;
use crate::rate_limit::{RateLimitPolicy, Rejection};

mod memory;
mod redis_store;

pub use memory::{MemoryStore, sweeper};
pub use redis_store::RedisStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt counter: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("store rejected a submission the policy allows")]
    Inconsistent,
}

/// Counter state around an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reserved {
    pub previous: SubmissionCounter,
    pub current: SubmissionCounter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Granted(Reserved),
    Rejected(Rejection),
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Current counter for `key`, `None` when absent or expired.
    /// Not on the request path (`reserve` reads the counter itself); used to
    /// inspect stored state from tests and tooling.
    async fn get(&self, key: &str) -> Result<Option<SubmissionCounter>, StoreError>;

    /// Atomically check `policy` and record a submission at `now`.
    async fn reserve(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> Result<Reservation, StoreError>;

    /// Undo `reserved` if it is still the stored counter.
    async fn release(&self, key: &str, reserved: &Reserved) -> Result<(), StoreError>;
}

pub(crate) fn accepted(previous: SubmissionCounter, now: DateTime<Utc>) -> Reserved {
    Reserved {
        previous,
        current: SubmissionCounter {
            count: previous.count + 1,
            last_submission_ms: now.timestamp_millis(),
        },
    }
}
