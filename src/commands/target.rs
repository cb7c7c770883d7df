//! Constructors for the `Target` domain.

use serde_json::json;

use crate::cdp::Command;

/// All targets the browser knows about (pages, workers, iframes).
pub fn get_targets() -> Command {
    Command::plain("Target.getTargets")
}

/// Attach to a target; with `flatten` the resulting session shares this
/// connection and commands are routed by `sessionId`.
pub fn attach_to_target(target_id: &str, flatten: bool) -> Command {
    Command::new(
        "Target.attachToTarget",
        json!({ "targetId": target_id, "flatten": flatten }),
    )
}

pub fn detach_from_target(session_id: &str) -> Command {
    Command::new(
        "Target.detachFromTarget",
        json!({ "sessionId": session_id }),
    )
}

/// Open a new page target.
pub fn create_target(url: &str) -> Command {
    Command::new("Target.createTarget", json!({ "url": url }))
}

pub fn close_target(target_id: &str) -> Command {
    Command::new("Target.closeTarget", json!({ "targetId": target_id }))
}

pub fn activate_target(target_id: &str) -> Command {
    Command::new("Target.activateTarget", json!({ "targetId": target_id }))
}

/// Create an isolated browser context (think incognito profile).
pub fn create_browser_context() -> Command {
    Command::plain("Target.createBrowserContext")
}

/// Toggle `Target.targetCreated`/`targetDestroyed` notifications.
pub fn set_discover_targets(discover: bool) -> Command {
    Command::new("Target.setDiscoverTargets", json!({ "discover": discover }))
}

pub fn get_target_info(target_id: &str) -> Command {
    Command::new("Target.getTargetInfo", json!({ "targetId": target_id }))
}
