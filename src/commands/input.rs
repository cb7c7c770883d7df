//! Constructors for the `Input` domain.

use serde::Serialize;
use serde_json::json;

use super::{KeyEventType, MouseButton, MouseEventType};
use crate::cdp::Command;

/// Parameters for `Input.dispatchKeyEvent`. Unset fields stay off the
/// wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEventParams {
    #[serde(rename = "type")]
    pub event_type: KeyEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows_virtual_key_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_virtual_key_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Synthesize a mouse event at the given viewport coordinates.
pub fn dispatch_mouse_event(
    event_type: MouseEventType,
    x: f64,
    y: f64,
    button: MouseButton,
    click_count: u32,
) -> Command {
    Command::new(
        "Input.dispatchMouseEvent",
        json!({
            "type": event_type,
            "x": x,
            "y": y,
            "button": button,
            "clickCount": click_count,
        }),
    )
}

/// Move the mouse without any button state.
pub fn dispatch_mouse_move(x: f64, y: f64) -> Command {
    Command::new(
        "Input.dispatchMouseEvent",
        json!({
            "type": MouseEventType::MouseMoved,
            "x": x,
            "y": y,
        }),
    )
}

/// Synthesize a keyboard event.
pub fn dispatch_key_event(params: &KeyEventParams) -> Command {
    Command::new(
        "Input.dispatchKeyEvent",
        serde_json::to_value(params).unwrap_or_default(),
    )
}

/// Type a single character as a `char` key event.
pub fn dispatch_char(text: &str) -> Command {
    Command::new(
        "Input.dispatchKeyEvent",
        json!({
            "type": KeyEventType::Char,
            "text": text,
        }),
    )
}

/// Insert text into the focused element in one operation.
pub fn insert_text(text: &str) -> Command {
    Command::new("Input.insertText", json!({ "text": text }))
}

/// Scroll with the mouse wheel at the given position.
pub fn dispatch_mouse_wheel(x: f64, y: f64, delta_x: f64, delta_y: f64) -> Command {
    Command::new(
        "Input.dispatchMouseEvent",
        json!({
            "type": MouseEventType::MouseWheel,
            "x": x,
            "y": y,
            "deltaX": delta_x,
            "deltaY": delta_y,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_press_wire_shape() {
        let cmd = dispatch_mouse_event(MouseEventType::MousePressed, 10.0, 20.0, MouseButton::Left, 1);
        assert_eq!(cmd.method, "Input.dispatchMouseEvent");
        let params = cmd.params.unwrap();
        assert_eq!(params["type"], "mousePressed");
        assert_eq!(params["button"], "left");
        assert_eq!(params["clickCount"], 1);
    }

    #[test]
    fn mouse_move_has_no_button() {
        let params = dispatch_mouse_move(5.0, 6.0).params.unwrap();
        assert_eq!(params["type"], "mouseMoved");
        assert!(params.get("button").is_none());
    }

    #[test]
    fn key_event_omits_unset_fields() {
        let params = KeyEventParams {
            event_type: KeyEventType::KeyDown,
            key: Some("Enter".into()),
            code: Some("Enter".into()),
            windows_virtual_key_code: Some(13),
            native_virtual_key_code: Some(13),
            modifiers: None,
            text: Some("\r".into()),
        };
        let value = serde_json::to_value(dispatch_key_event(&params).params.unwrap()).unwrap();
        assert_eq!(value["type"], "keyDown");
        assert_eq!(value["windowsVirtualKeyCode"], 13);
        assert!(value.get("modifiers").is_none());
    }

    #[test]
    fn char_event_wire_shape() {
        let params = dispatch_char("a").params.unwrap();
        assert_eq!(params["type"], "char");
        assert_eq!(params["text"], "a");
    }

    #[test]
    fn insert_text_wire_shape() {
        let cmd = insert_text("hello");
        assert_eq!(cmd.method, "Input.insertText");
        assert_eq!(cmd.params.unwrap()["text"], "hello");
    }

    #[test]
    fn mouse_wheel_carries_deltas() {
        let params = dispatch_mouse_wheel(50.0, 60.0, 0.0, -120.0).params.unwrap();
        assert_eq!(params["type"], "mouseWheel");
        assert_eq!(params["deltaY"], -120.0);
    }
}
