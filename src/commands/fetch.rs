//! Constructors for the `Fetch` domain (request interception).

use serde_json::{Map, Value, json};

use super::{AuthResponse, ErrorReason};
use crate::cdp::Command;

/// Enable request interception. `patterns` are CDP `RequestPattern`
/// objects; no patterns means every request pauses.
pub fn enable(patterns: Option<&[Value]>, handle_auth_requests: bool) -> Command {
    let mut params = Map::new();
    if let Some(patterns) = patterns {
        params.insert("patterns".into(), json!(patterns));
    }
    params.insert("handleAuthRequests".into(), json!(handle_auth_requests));
    Command::new("Fetch.enable", Value::Object(params))
}

pub fn disable() -> Command {
    Command::plain("Fetch.disable")
}

/// Let a paused request continue, optionally rewriting its URL or method.
pub fn continue_request(request_id: &str, url: Option<&str>, method: Option<&str>) -> Command {
    let mut params = Map::new();
    params.insert("requestId".into(), json!(request_id));
    if let Some(url) = url {
        params.insert("url".into(), json!(url));
    }
    if let Some(method) = method {
        params.insert("method".into(), json!(method));
    }
    Command::new("Fetch.continueRequest", Value::Object(params))
}

/// Abort a paused request.
pub fn fail_request(request_id: &str, reason: ErrorReason) -> Command {
    Command::new(
        "Fetch.failRequest",
        json!({ "requestId": request_id, "errorReason": reason }),
    )
}

/// Answer a paused request with a synthetic response; `body` is base64.
pub fn fulfill_request(
    request_id: &str,
    response_code: u16,
    response_headers: Option<&[Value]>,
    body: Option<&str>,
) -> Command {
    let mut params = Map::new();
    params.insert("requestId".into(), json!(request_id));
    params.insert("responseCode".into(), json!(response_code));
    if let Some(headers) = response_headers {
        params.insert("responseHeaders".into(), json!(headers));
    }
    if let Some(body) = body {
        params.insert("body".into(), json!(body));
    }
    Command::new("Fetch.fulfillRequest", Value::Object(params))
}

/// Body of a paused response (only valid at the response stage).
pub fn get_response_body(request_id: &str) -> Command {
    Command::new("Fetch.getResponseBody", json!({ "requestId": request_id }))
}

/// Answer a paused auth challenge.
pub fn continue_with_auth(
    request_id: &str,
    response: AuthResponse,
    username: Option<&str>,
    password: Option<&str>,
) -> Command {
    let mut challenge = Map::new();
    challenge.insert("response".into(), json!(response));
    if let Some(username) = username {
        challenge.insert("username".into(), json!(username));
    }
    if let Some(password) = password {
        challenge.insert("password".into(), json!(password));
    }
    Command::new(
        "Fetch.continueWithAuth",
        json!({
            "requestId": request_id,
            "authChallengeResponse": Value::Object(challenge),
        }),
    )
}
