use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// Feedback request body. Fields are relayed as sent, `None` when absent
#[derive(Clone, Debug, Default)]
pub struct FeedbackSubmission {
    pub rating: Option<Value>,
    pub feedback: Option<Value>,
    pub timestamp: Option<Value>, // client epoch millis, display only
}

impl From<Map<String, Value>> for FeedbackSubmission {
    fn from(mut body: Map<String, Value>) -> Self {
        Self {
            rating: body.remove("rating"),
            feedback: body.remove("feedback"),
            timestamp: body.remove("timestamp"),
        }
    }
}

// Per-IP counter as persisted in the store
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmissionCounter {
    pub count: u32,
    #[serde(rename = "lastSubmission")]
    pub last_submission_ms: i64,
}

// 200 body
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_submissions: Option<u32>,
}

// 429 body
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedBody {
    pub error: String,
    pub message: String,
    pub next_available: String,
}

// Telegram sendMessage payload
#[derive(Serialize, Debug)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'a str,
}
