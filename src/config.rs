use std::time::Duration;

use clap::Parser;

use crate::cors::OriginPolicy;
use crate::rate_limit::RateLimitPolicy;

const MINUTES_PER_YEAR: u64 = 365 * 24 * 60;
const HOURS_PER_YEAR: u64 = 365 * 24;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "feedback-relay")]
#[command(about = "Feedback intake endpoint that relays submissions to a Telegram chat")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Bot token used to build the sendMessage url
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: String,

    // Chat that receives the feedback messages, group ids are negative
    #[arg(long, env = "TELEGRAM_CHAT_ID", allow_hyphen_values = true)]
    pub telegram_chat_id: String,

    // Bot API base url
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    // Timeout for the outbound sendMessage call in seconds
    #[arg(long, default_value_t = 10)]
    pub notify_timeout: u64,

    // Allowed origins (comma-separated), empty disables origin checking
    // Example: "https://example.com,https://www.example.com"
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    pub allowed_origins: String,

    // Turn off per-IP throttling
    #[arg(long, default_value_t = false)]
    pub disable_rate_limit: bool,

    // Max accepted submissions per window
    #[arg(long, default_value_t = 3)]
    pub max_submissions: u32,

    // Minimum minutes between two accepted submissions (at most a year)
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(0..=MINUTES_PER_YEAR))]
    pub min_interval_minutes: u64,

    // Window length in hours (1 hour to a year)
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u64).range(1..=HOURS_PER_YEAR))]
    pub window_hours: u64,

    // Redis url for the submission counters, in-memory store when unset
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,
}

/// Telegram destination for relayed feedback.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
    pub timeout: Duration,
}

/// Everything the intake handler needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    pub telegram: TelegramConfig,
    pub rate_limit: Option<RateLimitPolicy>,
    pub origins: Option<OriginPolicy>,
}

impl FeedbackConfig {
    pub fn from_args(args: &Args) -> Self {
        let rate_limit = (!args.disable_rate_limit).then(|| RateLimitPolicy {
            max_per_window: args.max_submissions,
            min_interval: Duration::from_secs(args.min_interval_minutes * 60),
            window: Duration::from_secs(args.window_hours * 60 * 60),
        });

        Self {
            telegram: TelegramConfig {
                api_url: args.telegram_api_url.trim_end_matches('/').to_string(),
                bot_token: args.telegram_bot_token.clone(),
                chat_id: args.telegram_chat_id.clone(),
                timeout: Duration::from_secs(args.notify_timeout),
            },
            rate_limit,
            origins: OriginPolicy::from_list(&args.allowed_origins),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "feedback-relay",
            "--telegram-bot-token",
            "123:abc",
            "--telegram-chat-id",
            "-1001",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_enable_rate_limit_without_origin_check() {
        let config = FeedbackConfig::from_args(&parse(&[]));

        let policy = config.rate_limit.unwrap();
        assert_eq!(policy.max_per_window, 3);
        assert_eq!(policy.min_interval, Duration::from_secs(15 * 60));
        assert_eq!(policy.window, Duration::from_secs(24 * 60 * 60));
        assert!(config.origins.is_none());
        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
        assert_eq!(config.telegram.timeout, Duration::from_secs(10));
    }

    #[test]
    fn cors_variant_from_flags() {
        let config = FeedbackConfig::from_args(&parse(&[
            "--disable-rate-limit",
            "--allowed-origins",
            "https://a.example, https://b.example",
            "--telegram-api-url",
            "http://localhost:9000/",
        ]));

        assert!(config.rate_limit.is_none());
        let origins = config.origins.unwrap();
        assert!(origins.allows("https://b.example"));
        assert_eq!(config.telegram.api_url, "http://localhost:9000");
    }

    #[test]
    fn out_of_range_windows_are_refused() {
        let base = ["feedback-relay", "--telegram-bot-token", "t", "--telegram-chat-id", "1"];

        let huge_interval = [&base[..], &["--min-interval-minutes", "18446744073709551615"][..]].concat();
        assert!(Args::try_parse_from(huge_interval).is_err());

        let huge_window = [&base[..], &["--window-hours", "10000000000000000"][..]].concat();
        assert!(Args::try_parse_from(huge_window).is_err());

        let zero_window = [&base[..], &["--window-hours", "0"][..]].concat();
        assert!(Args::try_parse_from(zero_window).is_err());

        let year = [&base[..], &["--window-hours", "8760", "--min-interval-minutes", "525600"][..]].concat();
        let policy = FeedbackConfig::from_args(&Args::try_parse_from(year).unwrap())
            .rate_limit
            .unwrap();
        assert_eq!(policy.window, Duration::from_secs(8760 * 60 * 60));
    }
}
