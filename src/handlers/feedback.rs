use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::FeedbackConfig;
use crate::error::AppError;
use crate::message::format_feedback;
use crate::metrics::{ACCEPTED_TOTAL, RATE_LIMITED_TOTAL, REQUEST_TOTAL};
use crate::models::{FeedbackSubmission, SubmitResponse};
use crate::rate_limit::{client_address, counter_key, iso_millis};
use crate::state::AppState;
use crate::store::{Reservation, Reserved};

// Feedback bodies are a rating and a comment, anything bigger is not ours
const MAX_BODY_BYTES: usize = 64 * 1024;

pub async fn feedback_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    REQUEST_TOTAL.inc();

    let (parts, body) = request.into_parts();

    if let Err(err) = check_method(&state.config, &parts.method) {
        return err.into_response();
    }

    let cors_headers = match &state.config.origins {
        Some(origins) => match origins.check(&parts.headers) {
            Ok(headers) => headers,
            Err(err) => return err.into_response(),
        },
        None => HeaderMap::new(),
    };

    if parts.method == Method::OPTIONS {
        return (StatusCode::OK, cors_headers).into_response();
    }

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let result = submit(&state, &parts.headers, peer, body).await;
    (cors_headers, result).into_response()
}

fn check_method(config: &FeedbackConfig, method: &Method) -> Result<(), AppError> {
    let preflight = *method == Method::OPTIONS && config.origins.is_some();
    if *method == Method::POST || preflight {
        Ok(())
    } else {
        Err(AppError::MethodNotAllowed)
    }
}

async fn submit(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    body: Body,
) -> Result<Json<SubmitResponse>, AppError> {
    let now = state.clock.now();
    let client = client_address(headers, peer);

    // reserve a slot first, released again if delivery fails
    let reservation = match &state.config.rate_limit {
        Some(policy) => {
            let key = counter_key(&client);
            match state.store.reserve(&key, now, policy).await? {
                Reservation::Granted(reserved) => Some((key, reserved)),
                Reservation::Rejected(rejection) => {
                    RATE_LIMITED_TOTAL.inc();
                    info!(
                        client = %client,
                        next_available = %iso_millis(rejection.next_available()),
                        "Feedback rate limited"
                    );
                    return Err(AppError::RateLimited(rejection));
                }
            }
        }
        None => None,
    };

    if let Err(err) = deliver(state, &client, body).await {
        if let Some((key, reserved)) = &reservation {
            release(state, key, reserved).await;
        }
        return Err(err);
    }

    ACCEPTED_TOTAL.inc();

    let remaining_submissions = match (&state.config.rate_limit, &reservation) {
        (Some(policy), Some((_, reserved))) => Some(policy.remaining_after(&reserved.current)),
        _ => None,
    };
    info!(client = %client, remaining = ?remaining_submissions, "Feedback relayed");

    Ok(Json(SubmitResponse {
        success: true,
        remaining_submissions,
    }))
}

async fn deliver(state: &AppState, client: &str, body: Body) -> Result<(), AppError> {
    let bytes = to_bytes(body, MAX_BODY_BYTES).await?;
    // only the envelope is checked, the fields pass through untouched
    let body: Map<String, Value> = serde_json::from_slice(&bytes)?;
    let submission = FeedbackSubmission::from(body);

    // the address only goes out when it is also the rate-limit key
    let shown_client = state.config.rate_limit.is_some().then_some(client);
    let text = format_feedback(&submission, shown_client);

    state.notifier.send(&text).await?;
    Ok(())
}

async fn release(state: &AppState, key: &str, reserved: &Reserved) {
    if let Err(e) = state.store.release(key, reserved).await {
        warn!("Failed to release submission slot for {key}: {e}");
    }
}
