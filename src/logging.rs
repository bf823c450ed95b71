//! Middleware for logging requests and responses.

use std::error::Error as _;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::Request,
    http::{
        StatusCode,
        header::CONTENT_TYPE,
        request::Parts as RequestParts,
        response::Parts as ResponseParts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::{Value, json};

/// The number of characters of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// The largest request body, in bytes, the server will accept.
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

const REDACTED_FIELDS: &[&str] = &["password"];

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If the body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
/// Password fields in JSON request bodies are redacted.
///
/// Requests with a body larger than [MAX_REQUEST_BODY_BYTES] are rejected with
/// `413 Payload Too Large` before they reach a handler.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match read_body(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    let body_text = String::from_utf8_lossy(&body_bytes);
    if is_json(&parts) {
        log_request(&parts, &redact_json(&body_text));
    } else {
        log_request(&parts, &body_text);
    }

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match read_body(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };
    log_response(&parts, &String::from_utf8_lossy(&body_bytes));

    Response::from_parts(parts, Body::from(body_bytes))
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, Response> {
    axum::body::to_bytes(body, limit).await.map_err(|error| {
        if error
            .source()
            .is_some_and(|source| source.is::<LengthLimitError>())
        {
            tracing::warn!("rejected body larger than {limit} bytes");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": format!("the body must not be larger than {limit} bytes") })),
            )
                .into_response();
        }

        tracing::error!("could not read body: {error}");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

fn is_json(parts: &RequestParts) -> bool {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Replace the value of any top level password field in a JSON object.
///
/// Bodies that are not JSON objects are returned unchanged.
fn redact_json(body_text: &str) -> String {
    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_owned();
    };

    for field in REDACTED_FIELDS {
        if let Some(value) = object.get_mut(*field) {
            *value = Value::from("********");
        }
    }

    Value::Object(object).to_string()
}

fn truncate(body: &str) -> Option<String> {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(LOG_BODY_LENGTH_LIMIT).collect();

    chars.next().map(|_| head)
}

fn log_request(parts: &RequestParts, body: &str) {
    match truncate(body) {
        Some(head) => {
            tracing::info!(
                "Received request: {} {}\nbody: {head}...",
                parts.method,
                parts.uri
            );
            tracing::debug!("Full request body: {body:?}");
        }
        None => tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        ),
    }
}

fn log_response(parts: &ResponseParts, body: &str) {
    match truncate(body) {
        Some(head) => {
            tracing::info!("Sending response: {}\nbody: {head}...", parts.status);
            tracing::debug!("Full response body: {body:?}");
        }
        None => tracing::info!("Sending response: {}\nbody: {body:?}", parts.status),
    }
}
