//! Constructors for the `Storage` domain.

use serde_json::{Map, Value, json};

use crate::cdp::Command;

fn with_context(mut params: Map<String, Value>, browser_context_id: Option<&str>) -> Value {
    if let Some(context_id) = browser_context_id {
        params.insert("browserContextId".into(), json!(context_id));
    }
    Value::Object(params)
}

/// All cookies of a browser context.
pub fn get_cookies(browser_context_id: Option<&str>) -> Command {
    Command::new(
        "Storage.getCookies",
        with_context(Map::new(), browser_context_id),
    )
}

/// Set cookies on a browser context; entries are CDP `CookieParam`s.
pub fn set_cookies(cookies: &[Value], browser_context_id: Option<&str>) -> Command {
    let mut params = Map::new();
    params.insert("cookies".into(), json!(cookies));
    Command::new("Storage.setCookies", with_context(params, browser_context_id))
}

pub fn clear_cookies(browser_context_id: Option<&str>) -> Command {
    Command::new(
        "Storage.clearCookies",
        with_context(Map::new(), browser_context_id),
    )
}
