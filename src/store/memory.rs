use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::interval;
use tracing::debug;

use super::{Reservation, Reserved, StoreError, SubmissionStore, accepted};
use crate::clock::Clock;
use crate::models::SubmissionCounter;
use crate::rate_limit::RateLimitPolicy;

// Counter with its absolute expiry
#[derive(Clone, Copy)]
struct Entry {
    counter: SubmissionCounter,
    expires_at_ms: i64,
}

/// Process-local store. Fine for a single instance, counters die with the process.
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    // Drop expired counters, returns how many went
    pub fn purge_expired(&self) -> usize {
        let now_ms = self.clock.now().timestamp_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at_ms > now_ms);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<SubmissionCounter>, StoreError> {
        let now_ms = self.clock.now().timestamp_millis();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at_ms > now_ms)
            .map(|entry| entry.counter))
    }

    async fn reserve(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> Result<Reservation, StoreError> {
        let now_ms = now.timestamp_millis();

        // entry() holds the shard lock until the guard drops
        let mut entry = self.entries.entry(key.to_string()).or_insert(Entry {
            counter: SubmissionCounter::default(),
            expires_at_ms: now_ms,
        });

        if entry.expires_at_ms <= now_ms {
            entry.counter = SubmissionCounter::default();
        }

        let previous = entry.counter;
        if let Err(rejection) = policy.evaluate(&previous, now) {
            return Ok(Reservation::Rejected(rejection));
        }

        let reserved = accepted(previous, now);
        *entry = Entry {
            counter: reserved.current,
            expires_at_ms: now_ms + policy.window_ms(),
        };

        Ok(Reservation::Granted(reserved))
    }

    async fn release(&self, key: &str, reserved: &Reserved) -> Result<(), StoreError> {
        let restore_default = reserved.previous.count == 0;

        if restore_default {
            self.entries
                .remove_if(key, |_, entry| entry.counter == reserved.current);
        } else if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.counter == reserved.current {
                entry.counter = reserved.previous;
            }
        }

        Ok(())
    }
}

// Background purge loop - runs every `every`
pub async fn sweeper(store: Arc<MemoryStore>, every: Duration) {
    let mut interval = interval(every);

    loop {
        interval.tick().await;

        let purged = store.purge_expired();
        if purged > 0 {
            debug!(purged, remaining = store.len(), "Purged expired submission counters");
        }
    }
}
