//! Constructors for the `Browser` domain.

use serde_json::{Map, Value, json};

use super::DownloadBehavior;
use crate::cdp::Command;

pub fn get_version() -> Command {
    Command::plain("Browser.getVersion")
}

pub fn close() -> Command {
    Command::plain("Browser.close")
}

/// Configure download handling; `events_enabled` turns on
/// `Browser.downloadWillBegin` / `Browser.downloadProgress`.
pub fn set_download_behavior(
    behavior: DownloadBehavior,
    download_path: Option<&str>,
    browser_context_id: Option<&str>,
    events_enabled: bool,
) -> Command {
    let mut params = Map::new();
    params.insert("behavior".into(), json!(behavior));
    if let Some(path) = download_path {
        params.insert("downloadPath".into(), json!(path));
    }
    if let Some(context_id) = browser_context_id {
        params.insert("browserContextId".into(), json!(context_id));
    }
    params.insert("eventsEnabled".into(), json!(events_enabled));
    Command::new("Browser.setDownloadBehavior", Value::Object(params))
}

pub fn cancel_download(guid: &str) -> Command {
    Command::new("Browser.cancelDownload", json!({ "guid": guid }))
}

/// Grant permissions (e.g. `geolocation`, `notifications`) to an origin.
pub fn grant_permissions(
    permissions: &[String],
    origin: Option<&str>,
    browser_context_id: Option<&str>,
) -> Command {
    let mut params = Map::new();
    params.insert("permissions".into(), json!(permissions));
    if let Some(origin) = origin {
        params.insert("origin".into(), json!(origin));
    }
    if let Some(context_id) = browser_context_id {
        params.insert("browserContextId".into(), json!(context_id));
    }
    Command::new("Browser.grantPermissions", Value::Object(params))
}

pub fn reset_permissions(browser_context_id: Option<&str>) -> Command {
    match browser_context_id {
        Some(context_id) => Command::new(
            "Browser.resetPermissions",
            json!({ "browserContextId": context_id }),
        ),
        None => Command::plain("Browser.resetPermissions"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_version_is_parameterless() {
        let cmd = get_version();
        assert_eq!(cmd.method, "Browser.getVersion");
        assert!(cmd.params.is_none());
    }

    #[test]
    fn grant_permissions_wire_shape() {
        let permissions = vec!["geolocation".to_owned()];
        let params = grant_permissions(&permissions, Some("https://example.com"), None)
            .params
            .unwrap();
        assert_eq!(params["permissions"][0], "geolocation");
        assert_eq!(params["origin"], "https://example.com");
        assert!(params.get("browserContextId").is_none());
    }

    #[test]
    fn set_download_behavior_full_shape() {
        let params = set_download_behavior(
            DownloadBehavior::AllowAndName,
            Some("/tmp/downloads"),
            None,
            true,
        )
        .params
        .unwrap();
        assert_eq!(params["behavior"], "allowAndName");
        assert_eq!(params["downloadPath"], "/tmp/downloads");
        assert_eq!(params["eventsEnabled"], true);
        assert!(params.get("browserContextId").is_none());
    }
}
