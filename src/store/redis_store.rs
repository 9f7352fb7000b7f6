//! # Redis
//!
//! Counters live under `feedback:ip:<address>` as JSON
//! (`{"count":1,"lastSubmission":1700000000000}`), the same shape a KV-backed
//! deployment writes, with a `PX` expiry of one window.
//!
//! Both the reservation and its release run as Lua scripts so the
//! check-then-write happens inside Redis and concurrent requests from one
//! address cannot both slip under the limit.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{Client, Script, aio::ConnectionManager};
use tracing::info;

use super::{Reservation, Reserved, StoreError, SubmissionStore, accepted};
use crate::models::SubmissionCounter;
use crate::rate_limit::RateLimitPolicy;

// KEYS[1] counter, ARGV: now_ms, max, min_interval_ms, window_ms
// -> {granted, previous count, previous lastSubmission}
const RESERVE_LUA: &str = r#"
local count, last = 0, 0
local raw = redis.call('GET', KEYS[1])
if raw then
  local stored = cjson.decode(raw)
  count = tonumber(stored.count) or 0
  last = tonumber(stored.lastSubmission) or 0
end
local now = tonumber(ARGV[1])
if count >= tonumber(ARGV[2]) or (count > 0 and now - last < tonumber(ARGV[3])) then
  return {0, count, last}
end
redis.call('SET', KEYS[1], cjson.encode({count = count + 1, lastSubmission = now}), 'PX', ARGV[4])
return {1, count, last}
"#;

// KEYS[1] counter, ARGV: reserved count, reserved lastSubmission,
// previous count, previous lastSubmission
const RELEASE_LUA: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local stored = cjson.decode(raw)
if tonumber(stored.count) ~= tonumber(ARGV[1]) or tonumber(stored.lastSubmission) ~= tonumber(ARGV[2]) then
  return 0
end
if tonumber(ARGV[3]) == 0 then
  redis.call('DEL', KEYS[1])
else
  redis.call('SET', KEYS[1], cjson.encode({count = tonumber(ARGV[3]), lastSubmission = tonumber(ARGV[4])}), 'KEEPTTL')
end
return 1
"#;

pub struct RedisStore {
    connection: ConnectionManager,
    reserve: Script,
    release: Script,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;
        info!("Connected to Redis for submission counters");

        Ok(Self {
            connection,
            reserve: Script::new(RESERVE_LUA),
            release: Script::new(RELEASE_LUA),
        })
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<SubmissionCounter>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut connection).await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn reserve(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> Result<Reservation, StoreError> {
        let mut connection = self.connection.clone();
        let (granted, count, last_submission_ms): (i64, u32, i64) = self
            .reserve
            .key(key)
            .arg(now.timestamp_millis())
            .arg(policy.max_per_window)
            .arg(policy.min_interval_ms())
            .arg(policy.window_ms())
            .invoke_async(&mut connection)
            .await?;

        let previous = SubmissionCounter {
            count,
            last_submission_ms,
        };

        if granted == 1 {
            return Ok(Reservation::Granted(accepted(previous, now)));
        }

        match policy.evaluate(&previous, now) {
            Err(rejection) => Ok(Reservation::Rejected(rejection)),
            Ok(()) => Err(StoreError::Inconsistent),
        }
    }

    async fn release(&self, key: &str, reserved: &Reserved) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _restored: i64 = self
            .release
            .key(key)
            .arg(reserved.current.count)
            .arg(reserved.current.last_submission_ms)
            .arg(reserved.previous.count)
            .arg(reserved.previous.last_submission_ms)
            .invoke_async(&mut connection)
            .await?;

        Ok(())
    }
}
