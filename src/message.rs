use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::FeedbackSubmission;

// Renders like en-US Date#toLocaleString on a UTC host
const LOCALE_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";
const INVALID_DATE: &str = "Invalid Date";

// Largest |ms| a JS Date accepts
const MAX_DATE_MS: f64 = 8.64e15;

pub fn format_feedback(submission: &FeedbackSubmission, client: Option<&str>) -> String {
    let mut message = format!(
        "📢 New Feedback Received:\n\n⭐ Rating: {}/5\n📝 Feedback: {}\n⏰ Timestamp: {}",
        display(submission.rating.as_ref()),
        display(submission.feedback.as_ref()),
        local_timestamp(submission.timestamp.as_ref()),
    );

    if let Some(ip) = client {
        message.push_str(&format!("\n🌐 IP: {ip}"));
    }

    message
}

// Text of a relayed field, as string interpolation would show it
fn display(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "undefined".to_string();
    };

    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => display(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn local_timestamp(value: Option<&Value>) -> String {
    to_datetime(value)
        .map(|at| at.format(LOCALE_FORMAT).to_string())
        .unwrap_or_else(|| INVALID_DATE.to_string())
}

// Same inputs a Date constructor takes: epoch millis, null, or an ISO string
fn to_datetime(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let ms = match value? {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            return DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|at| at.with_timezone(&Utc));
        }
        Value::Array(_) | Value::Object(_) => return None,
    };

    if !ms.is_finite() || ms.abs() > MAX_DATE_MS {
        return None;
    }
    DateTime::from_timestamp_millis(ms.trunc() as i64)
}
