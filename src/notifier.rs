use std::time::Instant;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::metrics::{NOTIFY_FAILURES, NOTIFY_LATENCY};
use crate::models::SendMessage;

const PARSE_MODE: &str = "Markdown";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("telegram returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

// Bot API client bound to one chat
pub struct TelegramClient {
    client: Client,
    send_url: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            send_url: format!("{}/bot{}/sendMessage", config.api_url, config.bot_token),
            chat_id: config.chat_id.clone(),
        }
    }

    /// Deliver `text` to the configured chat. Any non-2xx answer is a failure.
    pub async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let start_time = Instant::now();
        let result = self.post(text).await;
        NOTIFY_LATENCY.observe(start_time.elapsed().as_secs_f64());

        if result.is_err() {
            NOTIFY_FAILURES.inc();
        }
        result
    }

    async fn post(&self, text: &str) -> Result<(), NotifyError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: PARSE_MODE,
        };

        // the url carries the bot token, keep it out of error messages
        let response = self
            .client
            .post(&self.send_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.without_url()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        debug!("Feedback delivered to chat {}", self.chat_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: String) -> TelegramConfig {
        TelegramConfig {
            api_url,
            bot_token: "123:abc".to_string(),
            chat_id: "-1001".to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn posts_markdown_message_to_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(serde_json::json!({
                "chat_id": "-1001",
                "text": "hello",
                "parse_mode": "Markdown"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = TelegramClient::new(&config(server.uri()));
        client.send("hello").await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: can't parse entities"))
            .mount(&server)
            .await;

        let client = TelegramClient::new(&config(server.uri()));
        let err = client.send("*broken").await.unwrap_err();

        match err {
            NotifyError::Rejected { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(body.contains("can't parse entities"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn stalled_api_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = TelegramClient::new(&TelegramConfig {
            timeout: Duration::from_millis(200),
            ..config(server.uri())
        });

        assert!(matches!(client.send("hi").await, Err(NotifyError::Request(_))));
    }
}
