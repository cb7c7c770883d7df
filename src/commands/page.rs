//! Constructors for the `Page` domain.

use serde_json::{Map, Value, json};

use super::{ScreenshotFormat, Viewport};
use crate::cdp::Command;

pub fn enable() -> Command {
    Command::plain("Page.enable")
}

pub fn disable() -> Command {
    Command::plain("Page.disable")
}

pub fn navigate(url: &str) -> Command {
    Command::new("Page.navigate", json!({ "url": url }))
}

pub fn reload(ignore_cache: bool) -> Command {
    Command::new("Page.reload", json!({ "ignoreCache": ignore_cache }))
}

pub fn stop_loading() -> Command {
    Command::plain("Page.stopLoading")
}

pub fn bring_to_front() -> Command {
    Command::plain("Page.bringToFront")
}

pub fn close() -> Command {
    Command::plain("Page.close")
}

/// Frame hierarchy of the page the receiving session is attached to.
pub fn get_frame_tree() -> Command {
    Command::plain("Page.getFrameTree")
}

/// Create an isolated JavaScript world inside a frame: same DOM, own
/// global object.
pub fn create_isolated_world(
    frame_id: &str,
    world_name: Option<&str>,
    grant_universal_access: bool,
) -> Command {
    let mut params = Map::new();
    params.insert("frameId".into(), json!(frame_id));
    if let Some(name) = world_name {
        params.insert("worldName".into(), json!(name));
    }
    params.insert(
        "grantUniversalAccess".into(),
        json!(grant_universal_access),
    );
    Command::new("Page.createIsolatedWorld", Value::Object(params))
}

/// Capture a screenshot, optionally clipped to a region.
pub fn capture_screenshot(
    format: ScreenshotFormat,
    quality: Option<u8>,
    clip: Option<Viewport>,
    capture_beyond_viewport: Option<bool>,
) -> Command {
    let mut params = Map::new();
    params.insert("format".into(), json!(format));
    if let Some(quality) = quality {
        params.insert("quality".into(), json!(quality));
    }
    if let Some(clip) = clip {
        params.insert("clip".into(), json!(clip));
    }
    if let Some(beyond) = capture_beyond_viewport {
        params.insert("captureBeyondViewport".into(), json!(beyond));
    }
    Command::new("Page.captureScreenshot", Value::Object(params))
}

/// Accept or dismiss the currently open JavaScript dialog.
pub fn handle_javascript_dialog(accept: bool, prompt_text: Option<&str>) -> Command {
    let mut params = Map::new();
    params.insert("accept".into(), json!(accept));
    if let Some(text) = prompt_text {
        params.insert("promptText".into(), json!(text));
    }
    Command::new("Page.handleJavaScriptDialog", Value::Object(params))
}

/// Toggle interception of file chooser dialogs.
pub fn set_intercept_file_chooser_dialog(enabled: bool) -> Command {
    Command::new(
        "Page.setInterceptFileChooserDialog",
        json!({ "enabled": enabled }),
    )
}

/// Register a script evaluated on every new document before page scripts.
pub fn add_script_to_evaluate_on_new_document(source: &str) -> Command {
    Command::new(
        "Page.addScriptToEvaluateOnNewDocument",
        json!({ "source": source }),
    )
}

pub fn remove_script_to_evaluate_on_new_document(identifier: &str) -> Command {
    Command::new(
        "Page.removeScriptToEvaluateOnNewDocument",
        json!({ "identifier": identifier }),
    )
}

pub fn get_navigation_history() -> Command {
    Command::plain("Page.getNavigationHistory")
}

pub fn navigate_to_history_entry(entry_id: i64) -> Command {
    Command::new(
        "Page.navigateToHistoryEntry",
        json!({ "entryId": entry_id }),
    )
}

/// Render the page to PDF; the reply carries base64 data.
pub fn print_to_pdf(landscape: bool, print_background: bool) -> Command {
    Command::new(
        "Page.printToPDF",
        json!({
            "landscape": landscape,
            "printBackground": print_background,
        }),
    )
}

/// Bypass the page's content security policy.
pub fn set_bypass_csp(enabled: bool) -> Command {
    Command::new("Page.setBypassCSP", json!({ "enabled": enabled }))
}

/// Replace a frame's document with the given markup.
pub fn set_document_content(frame_id: &str, html: &str) -> Command {
    Command::new(
        "Page.setDocumentContent",
        json!({ "frameId": frame_id, "html": html }),
    )
}

/// Viewport and content size metrics.
pub fn get_layout_metrics() -> Command {
    Command::plain("Page.getLayoutMetrics")
}

pub fn set_lifecycle_events_enabled(enabled: bool) -> Command {
    Command::new(
        "Page.setLifecycleEventsEnabled",
        json!({ "enabled": enabled }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_wire_shape() {
        let cmd = navigate("https://example.com");
        assert_eq!(cmd.method, "Page.navigate");
        assert_eq!(cmd.params.unwrap()["url"], "https://example.com");
    }

    #[test]
    fn create_isolated_world_full_shape() {
        let cmd = create_isolated_world("F1", Some("probe::iframe::F1"), true);
        let params = cmd.params.unwrap();
        assert_eq!(params["frameId"], "F1");
        assert_eq!(params["worldName"], "probe::iframe::F1");
        assert_eq!(params["grantUniversalAccess"], true);
    }

    #[test]
    fn create_isolated_world_omits_unset_name() {
        let params = create_isolated_world("F2", None, false).params.unwrap();
        assert!(params.get("worldName").is_none());
    }

    #[test]
    fn capture_screenshot_with_clip() {
        let clip = Viewport {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 50.0,
            scale: 1.0,
        };
        let params = capture_screenshot(ScreenshotFormat::Jpeg, Some(85), Some(clip), None)
            .params
            .unwrap();
        assert_eq!(params["format"], "jpeg");
        assert_eq!(params["quality"], 85);
        assert_eq!(params["clip"]["width"], 100.0);
        assert!(params.get("captureBeyondViewport").is_none());
    }

    #[test]
    fn handle_dialog_with_prompt_text() {
        let params = handle_javascript_dialog(true, Some("typed answer"))
            .params
            .unwrap();
        assert_eq!(params["accept"], true);
        assert_eq!(params["promptText"], "typed answer");
    }

    #[test]
    fn handle_dialog_dismiss_omits_prompt() {
        let params = handle_javascript_dialog(false, None).params.unwrap();
        assert_eq!(params["accept"], false);
        assert!(params.get("promptText").is_none());
    }

    #[test]
    fn set_document_content_wire_shape() {
        let params = set_document_content("F3", "<html></html>").params.unwrap();
        assert_eq!(params["frameId"], "F3");
        assert_eq!(params["html"], "<html></html>");
    }

    #[test]
    fn print_to_pdf_wire_shape() {
        let params = print_to_pdf(true, false).params.unwrap();
        assert_eq!(params["landscape"], true);
        assert_eq!(params["printBackground"], false);
    }
}
