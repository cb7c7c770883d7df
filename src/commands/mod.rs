//! Command catalog: one pure constructor per CDP method the crate uses.
//!
//! Constructors take typed arguments, emit camelCase wire parameters,
//! omit unset optionals, and return a [`Command`](crate::cdp::Command)
//! value. This layer holds no state and performs no I/O; it exists so
//! call sites stay free of string literals and wire-format knowledge.

pub mod browser;
pub mod dom;
pub mod fetch;
pub mod input;
pub mod network;
pub mod page;
pub mod runtime;
pub mod storage;
pub mod target;

use serde::Serialize;

/// Mouse event kind for `Input.dispatchMouseEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseEventType {
    MousePressed,
    MouseReleased,
    MouseMoved,
    MouseWheel,
}

/// Mouse button for `Input.dispatchMouseEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    None,
    Left,
    Middle,
    Right,
    Back,
    Forward,
}

/// Key event kind for `Input.dispatchKeyEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventType {
    KeyDown,
    KeyUp,
    RawKeyDown,
    Char,
}

/// Image compression format for `Page.captureScreenshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
    Jpeg,
    Png,
    Webp,
}

/// Download handling policy for `Browser.setDownloadBehavior`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadBehavior {
    Deny,
    Allow,
    AllowAndName,
    Default,
}

/// Network-level error reason for `Fetch.failRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorReason {
    Failed,
    Aborted,
    TimedOut,
    AccessDenied,
    ConnectionClosed,
    ConnectionRefused,
    ConnectionReset,
    InternetDisconnected,
    NameNotResolved,
    BlockedByClient,
    BlockedByResponse,
}

/// Decision for `Fetch.continueWithAuth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum AuthResponse {
    Default,
    CancelAuth,
    ProvideCredentials,
}

/// Rectangular clip region for screenshots, in CSS pixels.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_to_wire_spelling() {
        assert_eq!(
            serde_json::to_value(MouseEventType::MousePressed).unwrap(),
            "mousePressed"
        );
        assert_eq!(serde_json::to_value(MouseButton::Left).unwrap(), "left");
        assert_eq!(serde_json::to_value(KeyEventType::Char).unwrap(), "char");
        assert_eq!(serde_json::to_value(ScreenshotFormat::Jpeg).unwrap(), "jpeg");
        assert_eq!(
            serde_json::to_value(DownloadBehavior::AllowAndName).unwrap(),
            "allowAndName"
        );
        assert_eq!(serde_json::to_value(ErrorReason::TimedOut).unwrap(), "TimedOut");
        assert_eq!(
            serde_json::to_value(AuthResponse::ProvideCredentials).unwrap(),
            "ProvideCredentials"
        );
    }

    #[test]
    fn viewport_serializes_all_fields() {
        let clip = Viewport {
            x: 1.0,
            y: 2.0,
            width: 30.0,
            height: 40.0,
            scale: 1.0,
        };
        let value = serde_json::to_value(clip).unwrap();
        assert_eq!(value["width"], 30.0);
        assert_eq!(value["scale"], 1.0);
    }
}
