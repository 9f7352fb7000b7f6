use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::models::{RateLimitedBody, SubmissionCounter};

const FORWARDED_FOR: &str = "x-forwarded-for";
const KEY_PREFIX: &str = "feedback:ip:";

// Per-IP submission policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_per_window: u32,
    pub min_interval: Duration,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_per_window: 3,
            min_interval: Duration::from_secs(15 * 60),
            window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl RateLimitPolicy {
    pub fn window_ms(&self) -> i64 {
        saturating_ms(self.window)
    }

    pub fn min_interval_ms(&self) -> i64 {
        saturating_ms(self.min_interval)
    }

    // Check a stored counter against the policy at `now`
    pub fn evaluate(&self, counter: &SubmissionCounter, now: DateTime<Utc>) -> Result<(), Rejection> {
        if counter.count >= self.max_per_window {
            let next_available = counter.last_submission_ms.saturating_add(self.window_ms());
            return Err(Rejection::DailyLimit {
                max: self.max_per_window,
                next_available: from_millis(next_available),
            });
        }

        let now_ms = now.timestamp_millis();
        let elapsed_minutes = (now_ms - counter.last_submission_ms) as f64 / 60_000.0;
        let min_minutes = self.min_interval.as_secs_f64() / 60.0;

        if counter.count > 0 && elapsed_minutes < min_minutes {
            let wait_minutes = (min_minutes - elapsed_minutes).ceil() as i64;
            return Err(Rejection::TooSoon {
                wait_minutes,
                next_available: now + TimeDelta::minutes(wait_minutes),
            });
        }

        Ok(())
    }

    pub fn remaining_after(&self, accepted: &SubmissionCounter) -> u32 {
        self.max_per_window.saturating_sub(accepted.count)
    }
}

/// Why a submission was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    DailyLimit {
        max: u32,
        next_available: DateTime<Utc>,
    },
    TooSoon {
        wait_minutes: i64,
        next_available: DateTime<Utc>,
    },
}

impl Rejection {
    pub fn next_available(&self) -> DateTime<Utc> {
        match self {
            Rejection::DailyLimit { next_available, .. }
            | Rejection::TooSoon { next_available, .. } => *next_available,
        }
    }

    pub fn body(&self) -> RateLimitedBody {
        let (error, message) = match self {
            Rejection::DailyLimit { max, .. } => (
                "Daily limit exceeded",
                format!("You've reached the maximum of {max} submissions per day."),
            ),
            Rejection::TooSoon { wait_minutes, .. } => (
                "Too many requests",
                format!("Please wait {wait_minutes} minute(s) before submitting again."),
            ),
        };

        RateLimitedBody {
            error: error.to_string(),
            message,
            next_available: iso_millis(self.next_available()),
        }
    }
}

// Client address: first X-Forwarded-For hop, then the socket peer
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn counter_key(client: &str) -> String {
    format!("{KEY_PREFIX}{client}")
}

// Same shape as a JS Date#toISOString
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn saturating_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    const T0: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60_000;

    #[test]
    fn fresh_counter_is_allowed() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.evaluate(&SubmissionCounter::default(), at(T0)), Ok(()));
    }

    #[test]
    fn daily_limit_points_at_last_submission_plus_window() {
        let policy = RateLimitPolicy::default();
        let counter = SubmissionCounter { count: 3, last_submission_ms: T0 };

        let rejection = policy.evaluate(&counter, at(T0 + 60 * MINUTE)).unwrap_err();

        assert_eq!(
            rejection,
            Rejection::DailyLimit { max: 3, next_available: at(T0 + 24 * 60 * MINUTE) }
        );
        let body = rejection.body();
        assert_eq!(body.error, "Daily limit exceeded");
        assert_eq!(body.message, "You've reached the maximum of 3 submissions per day.");
        assert_eq!(body.next_available, "2023-11-15T22:13:20.000Z");
    }

    #[test]
    fn too_soon_rounds_wait_up_to_whole_minutes() {
        let policy = RateLimitPolicy::default();
        let counter = SubmissionCounter { count: 1, last_submission_ms: T0 };
        let now = at(T0 + 4 * MINUTE + 30_000);

        let rejection = policy.evaluate(&counter, now).unwrap_err();

        // 10.5 minutes left rounds up to 11
        assert_eq!(
            rejection,
            Rejection::TooSoon { wait_minutes: 11, next_available: now + TimeDelta::minutes(11) }
        );
        assert_eq!(
            rejection.body().message,
            "Please wait 11 minute(s) before submitting again."
        );
    }

    #[test]
    fn interval_boundary_is_inclusive() {
        let policy = RateLimitPolicy::default();
        let counter = SubmissionCounter { count: 1, last_submission_ms: T0 };

        assert!(policy.evaluate(&counter, at(T0 + 15 * MINUTE - 1)).is_err());
        assert_eq!(policy.evaluate(&counter, at(T0 + 15 * MINUTE)), Ok(()));
    }

    #[test]
    fn daily_limit_wins_over_interval() {
        let policy = RateLimitPolicy::default();
        let counter = SubmissionCounter { count: 3, last_submission_ms: T0 };

        let rejection = policy.evaluate(&counter, at(T0 + MINUTE)).unwrap_err();
        assert!(matches!(rejection, Rejection::DailyLimit { .. }));
    }

    #[test]
    fn remaining_counts_down_from_max() {
        let policy = RateLimitPolicy::default();
        let accepted = SubmissionCounter { count: 1, last_submission_ms: T0 };
        assert_eq!(policy.remaining_after(&accepted), 2);
    }

    #[test]
    fn oversized_durations_saturate() {
        let policy = RateLimitPolicy {
            window: Duration::MAX,
            min_interval: Duration::from_secs(u64::MAX / 2),
            ..RateLimitPolicy::default()
        };

        assert_eq!(policy.window_ms(), i64::MAX);
        assert_eq!(policy.min_interval_ms(), i64::MAX);

        let counter = SubmissionCounter { count: 3, last_submission_ms: T0 };
        let rejection = policy.evaluate(&counter, at(T0)).unwrap_err();
        assert_eq!(rejection.next_available(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn client_address_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        let peer: SocketAddr = "192.0.2.1:5555".parse().unwrap();

        assert_eq!(client_address(&headers, Some(peer)), "203.0.113.7");
        assert_eq!(client_address(&HeaderMap::new(), Some(peer)), "192.0.2.1");
        assert_eq!(client_address(&HeaderMap::new(), None), "unknown");
        assert_eq!(counter_key("203.0.113.7"), "feedback:ip:203.0.113.7");
    }
}
