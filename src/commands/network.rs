//! Constructors for the `Network` domain.

use serde_json::{Map, Value, json};

use crate::cdp::Command;

pub fn enable() -> Command {
    Command::plain("Network.enable")
}

pub fn disable() -> Command {
    Command::plain("Network.disable")
}

/// Body of a finished response, keyed by request id from the network log.
pub fn get_response_body(request_id: &str) -> Command {
    Command::new(
        "Network.getResponseBody",
        json!({ "requestId": request_id }),
    )
}

/// Cookies visible to the given URLs (current page when `None`).
pub fn get_cookies(urls: Option<&[String]>) -> Command {
    match urls {
        Some(urls) => Command::new("Network.getCookies", json!({ "urls": urls })),
        None => Command::plain("Network.getCookies"),
    }
}

/// Set cookies; each entry is a CDP `CookieParam` object.
pub fn set_cookies(cookies: &[Value]) -> Command {
    Command::new("Network.setCookies", json!({ "cookies": cookies }))
}

pub fn clear_browser_cookies() -> Command {
    Command::plain("Network.clearBrowserCookies")
}

pub fn set_extra_http_headers(headers: &Map<String, Value>) -> Command {
    Command::new(
        "Network.setExtraHTTPHeaders",
        json!({ "headers": headers }),
    )
}

pub fn set_cache_disabled(disabled: bool) -> Command {
    Command::new(
        "Network.setCacheDisabled",
        json!({ "cacheDisabled": disabled }),
    )
}

pub fn set_user_agent_override(user_agent: &str) -> Command {
    Command::new(
        "Network.setUserAgentOverride",
        json!({ "userAgent": user_agent }),
    )
}

/// Block requests whose URLs match any of the given patterns.
pub fn set_blocked_urls(urls: &[String]) -> Command {
    Command::new("Network.setBlockedURLs", json!({ "urls": urls }))
}

/// Throttle the connection. Latency is in milliseconds, throughputs in
/// bytes per second; `-1` disables a throughput limit.
pub fn emulate_network_conditions(
    offline: bool,
    latency: f64,
    download_throughput: f64,
    upload_throughput: f64,
) -> Command {
    Command::new(
        "Network.emulateNetworkConditions",
        json!({
            "offline": offline,
            "latency": latency,
            "downloadThroughput": download_throughput,
            "uploadThroughput": upload_throughput,
        }),
    )
}

/// POST body of a request captured in the network log.
pub fn get_request_post_data(request_id: &str) -> Command {
    Command::new(
        "Network.getRequestPostData",
        json!({ "requestId": request_id }),
    )
}

pub fn set_bypass_service_worker(bypass: bool) -> Command {
    Command::new(
        "Network.setBypassServiceWorker",
        json!({ "bypass": bypass }),
    )
}

/// Search a finished response body for a string or regex.
pub fn search_in_response_body(
    request_id: &str,
    query: &str,
    case_sensitive: bool,
    is_regex: bool,
) -> Command {
    Command::new(
        "Network.searchInResponseBody",
        json!({
            "requestId": request_id,
            "query": query,
            "caseSensitive": case_sensitive,
            "isRegex": is_regex,
        }),
    )
}
