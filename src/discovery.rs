//! CDP endpoint discovery over the browser's HTTP debug interface.
//!
//! Chrome exposes `/json/version` (browser-level WebSocket URL) and
//! `/json` (per-target WebSocket URLs). Endpoint composition is a pure
//! function over `(host, port)`; nothing here is cached or global.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// URL a freshly opened tab reports before navigating anywhere. The
/// per-page session is picked by matching this.
pub const NEW_TAB_URL: &str = "chrome://newtab/";

/// Browser version payload from `/json/version`.
#[derive(Debug, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,

    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,

    /// Browser-level WebSocket debugger URL.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_debugger_url: String,
}

/// One debuggable target from `/json`.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    pub id: String,

    #[serde(rename = "type")]
    pub target_type: String,

    pub title: String,

    pub url: String,

    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_debugger_url: Option<String>,
}

/// `http://<host>:<port>/json/version`
#[must_use]
pub fn version_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/json/version")
}

/// `http://<host>:<port>/json`
#[must_use]
pub fn targets_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/json")
}

/// Query `/json/version`.
///
/// # Errors
///
/// Returns `Error::InvalidBrowserUrl` when the endpoint is unreachable or
/// the payload is malformed.
pub async fn query_version(host: &str, port: u16) -> Result<BrowserVersion, Error> {
    let body = http_get(host, port, "/json/version").await?;
    serde_json::from_str(&body).map_err(|e| Error::InvalidBrowserUrl(e.to_string()))
}

/// Query `/json` for the list of debuggable targets.
///
/// # Errors
///
/// Returns `Error::InvalidBrowserUrl` when the endpoint is unreachable or
/// the payload is malformed.
pub async fn query_targets(host: &str, port: u16) -> Result<Vec<TargetEntry>, Error> {
    let body = http_get(host, port, "/json").await?;
    serde_json::from_str(&body).map_err(|e| Error::InvalidBrowserUrl(e.to_string()))
}

/// WebSocket URL of the browser-level session.
///
/// # Errors
///
/// Returns `Error::InvalidBrowserUrl` when discovery fails.
pub async fn browser_ws_url(host: &str, port: u16) -> Result<String, Error> {
    Ok(query_version(host, port).await?.ws_debugger_url)
}

/// The page target to drive: the entry whose URL is the conventional
/// new-tab URL.
///
/// # Errors
///
/// Returns `Error::InvalidBrowserUrl` when no such target exists or it
/// lacks a WebSocket URL.
pub async fn new_tab_target(host: &str, port: u16) -> Result<TargetEntry, Error> {
    let targets = query_targets(host, port).await?;
    targets
        .into_iter()
        .find(|t| t.url == NEW_TAB_URL && t.ws_debugger_url.is_some())
        .ok_or_else(|| Error::InvalidBrowserUrl(format!("no {NEW_TAB_URL} target available")))
}

/// Select a target by its id.
///
/// # Errors
///
/// Returns `Error::InvalidBrowserUrl` when the id is unknown.
pub async fn target_by_id(host: &str, port: u16, target_id: &str) -> Result<TargetEntry, Error> {
    let targets = query_targets(host, port).await?;
    targets
        .into_iter()
        .find(|t| t.id == target_id)
        .ok_or_else(|| Error::InvalidBrowserUrl(format!("no target with id {target_id}")))
}

// =============================================================================
// Minimal HTTP client
// =============================================================================

/// Whether `buf` holds a complete HTTP response (headers plus the full
/// body per Content-Length).
fn response_complete(buf: &[u8]) -> bool {
    let Some(header_end) = header_end(buf) else {
        return false;
    };
    let body_start = header_end + 4;
    match content_length(&buf[..header_end]) {
        Some(len) => buf.len() >= body_start + len,
        None => true,
    }
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(headers: &[u8]) -> Option<usize> {
    let headers = std::str::from_utf8(headers).ok()?;
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case("content-length")
            .then(|| value.trim().parse().ok())?
    })
}

/// Extract the body of a 200 response from a raw buffer.
fn parse_response(buf: &[u8]) -> Result<String, Error> {
    let header_end =
        header_end(buf).ok_or_else(|| Error::InvalidBrowserUrl("malformed HTTP response".into()))?;
    let body_start = header_end + 4;

    let headers = std::str::from_utf8(&buf[..header_end])
        .map_err(|e| Error::InvalidBrowserUrl(format!("invalid UTF-8 in headers: {e}")))?;
    let status_line = headers
        .lines()
        .next()
        .ok_or_else(|| Error::InvalidBrowserUrl("empty response".into()))?;
    if !status_line.contains(" 200 ") {
        return Err(Error::InvalidBrowserUrl(format!(
            "unexpected HTTP status: {status_line}"
        )));
    }

    let body = match content_length(&buf[..header_end]) {
        Some(len) => &buf[body_start..(body_start + len).min(buf.len())],
        None => &buf[body_start..],
    };
    String::from_utf8(body.to_vec())
        .map_err(|e| Error::InvalidBrowserUrl(format!("invalid UTF-8 in body: {e}")))
}

/// Plain HTTP GET using blocking I/O on the blocking pool. The debug
/// interface answers small JSON payloads; a full HTTP client is not
/// warranted here.
async fn http_get(host: &str, port: u16, path: &str) -> Result<String, Error> {
    let host = host.to_owned();
    let request =
        format!("GET {path} HTTP/1.1\r\nHost: {host}:{port}\r\nConnection: close\r\n\r\n");

    tokio::task::spawn_blocking(move || {
        let addr = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| Error::InvalidBrowserUrl(format!("cannot resolve {host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| Error::InvalidBrowserUrl(format!("cannot resolve {host}:{port}")))?;

        let mut stream = TcpStream::connect_timeout(&addr, Duration::from_secs(2))
            .map_err(|e| Error::InvalidBrowserUrl(format!("connect to {addr} failed: {e}")))?;
        stream.set_read_timeout(Some(Duration::from_secs(5))).ok();

        stream
            .write_all(request.as_bytes())
            .map_err(|e| Error::InvalidBrowserUrl(format!("write failed: {e}")))?;

        let mut buf = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if response_complete(&buf) {
                        break;
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    if response_complete(&buf) {
                        break;
                    }
                    return Err(Error::InvalidBrowserUrl(format!("read timed out: {e}")));
                }
                Err(e) => return Err(Error::InvalidBrowserUrl(format!("read failed: {e}"))),
            }
        }

        parse_response(&buf)
    })
    .await
    .map_err(|e| Error::InvalidBrowserUrl(format!("task join failed: {e}")))?
}
