//! Remote DOM element handles and the interaction engine.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tokio::time::{Duration, Instant, sleep};

use crate::commands::{
    KeyEventType, MouseButton, MouseEventType, ScreenshotFormat, Viewport, dom, input, page,
    runtime,
};
use crate::error::{Error, Result};
use crate::finder::{By, DOM_OPERATION_TIMEOUT, FindElements, materialize};
use crate::keyboard::{self, Key};
use crate::scripts;
use crate::tab::Tab;
use crate::utils;

/// Poll interval of [`ElementHandle::wait_until`].
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Where a click point came from. The box model can be unavailable for
/// elements without layout; the JS bounding rect is the fallback.
#[derive(Debug, Clone, Copy)]
enum ClickPoint {
    BoxModel { x: f64, y: f64 },
    JsRect { x: f64, y: f64 },
}

impl ClickPoint {
    fn coords(self) -> (f64, f64) {
        match self {
            Self::BoxModel { x, y } | Self::JsRect { x, y } => (x, y),
        }
    }
}

/// A handle to one DOM node, wrapping the remote object id the browser
/// assigned to it.
///
/// Handles are not interned: looking the same node up twice produces two
/// handles with distinct remote object ids. A handle is not invalidated
/// by navigation or frame detach; using a stale one surfaces the
/// browser's protocol error.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    object_id: String,
    tab: Tab,
    attributes: HashMap<String, String>,
    /// Strategy and value that produced this handle, for diagnostics.
    search: Option<(By, String)>,
}

impl ElementHandle {
    /// Wrap a remote object id. `attributes` is the flat name/value list
    /// from `DOM.describeNode`; `class` is renamed to `class_name` at
    /// insertion time.
    #[must_use]
    pub(crate) fn new(
        object_id: String,
        tab: Tab,
        search: Option<(By, String)>,
        attributes: &[String],
    ) -> Self {
        let mut map = HashMap::new();
        for pair in attributes.chunks_exact(2) {
            let key = if pair[0] == "class" {
                "class_name".to_owned()
            } else {
                pair[0].clone()
            };
            map.insert(key, pair[1].clone());
        }
        Self {
            object_id,
            tab,
            attributes: map,
            search,
        }
    }

    /// The remote object id backing this handle.
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Attribute snapshot captured at discovery time. Dynamic changes
    /// after discovery are not reflected.
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        self.get_attribute("class_name")
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.get_attribute("value")
    }

    #[must_use]
    pub fn tag_name(&self) -> Option<&str> {
        self.get_attribute("tag_name")
    }

    /// Whether the element carried no `disabled` attribute at discovery.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.attributes.contains_key("disabled")
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Visible text content: outer HTML with markup stripped.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors from the HTML fetch.
    pub async fn text(&self) -> Result<String> {
        let html = self.inner_html().await?;
        Ok(utils::extract_text_from_html(&html, true))
    }

    /// The element's markup (outer HTML).
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn inner_html(&self) -> Result<String> {
        let response = self
            .tab
            .execute(dom::get_outer_html(&self.object_id), Some(DOM_OPERATION_TIMEOUT))
            .await?;
        response["outerHTML"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::InvalidResponse("DOM.getOuterHTML returned no outerHTML".into()))
    }

    /// Content quad from the box model: eight numbers tracing the
    /// content polygon in CSS pixels.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors, including the browser's refusal to
    /// compute a box model for unrendered nodes.
    pub async fn bounds(&self) -> Result<Vec<f64>> {
        let response = self
            .tab
            .execute(dom::get_box_model(&self.object_id), Some(DOM_OPERATION_TIMEOUT))
            .await?;
        let quad = response["model"]["content"]
            .as_array()
            .ok_or_else(|| Error::InvalidResponse("DOM.getBoxModel returned no content quad".into()))?;
        Ok(quad.iter().filter_map(Value::as_f64).collect())
    }

    /// Viewport-relative bounds via `getBoundingClientRect`, for when the
    /// box model is unavailable.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors and malformed script results.
    pub async fn bounds_using_js(&self) -> Result<Rect> {
        let result = self.execute_script(scripts::BOUNDS, true).await?;
        let payload = result["result"]["value"]
            .as_str()
            .ok_or_else(|| Error::InvalidResponse("bounds script returned no value".into()))?;
        serde_json::from_str(payload)
            .map_err(|e| Error::InvalidResponse(format!("malformed bounds payload: {e}")))
    }

    /// Scroll the element into the visible viewport.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn scroll_into_view(&self) -> Result<()> {
        self.tab
            .execute(
                dom::scroll_into_view_if_needed(&self.object_id),
                Some(DOM_OPERATION_TIMEOUT),
            )
            .await?;
        Ok(())
    }

    /// Whether the element is rendered and not hidden by style.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn is_visible(&self) -> Result<bool> {
        self.bool_script(scripts::ELEMENT_VISIBLE).await
    }

    /// Whether the element is the topmost node at its own center point.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn is_on_top(&self) -> Result<bool> {
        self.bool_script(scripts::ELEMENT_ON_TOP).await
    }

    /// Whether the element is visible, on top and not disabled.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn is_interactable(&self) -> Result<bool> {
        self.bool_script(scripts::ELEMENT_INTERACTIVE).await
    }

    async fn bool_script(&self, script: &str) -> Result<bool> {
        let result = self.execute_script(script, true).await?;
        Ok(result["result"]["value"].as_bool().unwrap_or(false))
    }

    /// Poll the requested predicates every 500ms until all hold or the
    /// deadline expires.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when no predicate is requested,
    /// `WaitElementTimeout` when the deadline expires.
    pub async fn wait_until(
        &self,
        visible: bool,
        interactable: bool,
        timeout: Duration,
    ) -> Result<()> {
        if !visible && !interactable {
            return Err(Error::InvalidArgument(
                "at least one of visible or interactable must be requested".into(),
            ));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let mut satisfied = true;
            if visible {
                satisfied &= self.is_visible().await?;
            }
            if interactable && satisfied {
                satisfied &= self.is_interactable().await?;
            }
            if satisfied {
                return Ok(());
            }
            if Instant::now() >= deadline {
                let mut conditions = Vec::new();
                if visible {
                    conditions.push("visible");
                }
                if interactable {
                    conditions.push("interactable");
                }
                return Err(Error::WaitElementTimeout {
                    selector: conditions.join(" and "),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    /// Click the element with simulated mouse events: scroll into view,
    /// pick the click point (box-model centroid, or the JS bounding rect
    /// center when the browser cannot compute a box model), press, hold,
    /// release.
    ///
    /// `<option>` elements cannot take synthetic mouse input; they
    /// delegate to the JavaScript selection path.
    ///
    /// # Errors
    ///
    /// `ElementNotVisible` when the element is hidden; protocol errors
    /// otherwise.
    pub async fn click(&self, x_offset: f64, y_offset: f64, hold_time: Duration) -> Result<()> {
        if self.is_option_tag() {
            return self.click_option_tag().await;
        }

        if !self.is_visible().await? {
            return Err(Error::ElementNotVisible);
        }
        self.scroll_into_view().await?;

        let point = match self.box_model_center().await? {
            Some((x, y)) => ClickPoint::BoxModel { x, y },
            None => {
                let rect = self.bounds_using_js().await?;
                ClickPoint::JsRect {
                    x: rect.x + rect.width / 2.0,
                    y: rect.y + rect.height / 2.0,
                }
            }
        };
        let (x, y) = point.coords();
        let (x, y) = (x + x_offset, y + y_offset);

        self.tab
            .execute(
                input::dispatch_mouse_event(
                    MouseEventType::MousePressed,
                    x,
                    y,
                    MouseButton::Left,
                    1,
                ),
                None,
            )
            .await?;
        sleep(hold_time).await;
        self.tab
            .execute(
                input::dispatch_mouse_event(
                    MouseEventType::MouseReleased,
                    x,
                    y,
                    MouseButton::Left,
                    1,
                ),
                None,
            )
            .await?;
        Ok(())
    }

    /// Click with default offsets and a 100ms hold.
    ///
    /// # Errors
    ///
    /// As [`click`](Self::click).
    pub async fn click_center(&self) -> Result<()> {
        self.click(0.0, 0.0, Duration::from_millis(100)).await
    }

    /// Click through `element.click()` in JavaScript instead of mouse
    /// events.
    ///
    /// # Errors
    ///
    /// `ElementNotVisible` when hidden, `ElementNotInteractable` when the
    /// script reports the click was rejected.
    pub async fn click_using_js(&self) -> Result<()> {
        if self.is_option_tag() {
            return self.click_option_tag().await;
        }

        self.scroll_into_view().await?;
        if !self.is_visible().await? {
            return Err(Error::ElementNotVisible);
        }

        let clicked = self.bool_script(scripts::CLICK).await?;
        if !clicked {
            return Err(Error::ElementNotInteractable);
        }
        Ok(())
    }

    /// Box-model centroid, or `None` when the browser cannot compute a
    /// box model for this node.
    async fn box_model_center(&self) -> Result<Option<(f64, f64)>> {
        match self.bounds().await {
            Ok(quad) if quad.len() >= 8 => Ok(Some(polygon_center(&quad))),
            Ok(_) => Ok(None),
            Err(Error::Protocol { .. } | Error::InvalidResponse(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn is_option_tag(&self) -> bool {
        self.tag_name().is_some_and(|tag| tag.eq_ignore_ascii_case("option"))
    }

    /// Select an `<option>`: set the owning `<select>`'s value and fire
    /// its `change` event.
    async fn click_option_tag(&self) -> Result<()> {
        let selected = self.bool_script(scripts::CLICK_OPTION_TAG).await?;
        if !selected {
            return Err(Error::ElementNotInteractable);
        }
        Ok(())
    }

    /// Insert text into the focused element in a single frame, with no
    /// per-character timing.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.tab.execute(input::insert_text(text), None).await?;
        Ok(())
    }

    /// Click the element, then type `text` one character at a time with
    /// `interval` between keystrokes.
    ///
    /// # Errors
    ///
    /// As [`click`](Self::click); protocol errors from key dispatch.
    pub async fn type_text(&self, text: &str, interval: Duration) -> Result<()> {
        self.click_center().await?;
        for character in text.chars() {
            self.tab
                .execute(input::dispatch_char(&character.to_string()), None)
                .await?;
            sleep(interval).await;
        }
        Ok(())
    }

    /// Press a key down without releasing it.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn key_down(&self, key: Key, modifiers: u8) -> Result<()> {
        let text = keyboard::key_text(key.name, modifiers, key.code);
        let vk = keyboard::shift_special_vk(&text).unwrap_or(key.code);
        let params = input::KeyEventParams {
            event_type: KeyEventType::KeyDown,
            key: Some(key.name.to_owned()),
            code: Some(keyboard::key_code_name(key.name)),
            windows_virtual_key_code: Some(vk),
            native_virtual_key_code: Some(vk),
            modifiers: Some(modifiers),
            text: Some(text),
        };
        self.tab
            .execute(input::dispatch_key_event(&params), None)
            .await?;
        Ok(())
    }

    /// Release a key previously pressed with [`key_down`](Self::key_down).
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn key_up(&self, key: Key) -> Result<()> {
        let params = input::KeyEventParams {
            event_type: KeyEventType::KeyUp,
            key: Some(key.name.to_owned()),
            code: Some(keyboard::key_code_name(key.name)),
            windows_virtual_key_code: Some(key.code),
            native_virtual_key_code: Some(key.code),
            modifiers: None,
            text: None,
        };
        self.tab
            .execute(input::dispatch_key_event(&params), None)
            .await?;
        Ok(())
    }

    /// Press and release a key with `interval` between the two events.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn press_keyboard_key(
        &self,
        key: Key,
        modifiers: u8,
        interval: Duration,
    ) -> Result<()> {
        self.key_down(key, modifiers).await?;
        sleep(interval).await;
        self.key_up(key).await
    }

    /// Attach local files to this `<input type="file">`.
    ///
    /// # Errors
    ///
    /// `ElementNotAFileInput` when the element is anything else.
    pub async fn set_input_files(&self, files: &[String]) -> Result<()> {
        let is_file_input = self
            .tag_name()
            .is_some_and(|tag| tag.eq_ignore_ascii_case("input"))
            && self
                .get_attribute("type")
                .is_some_and(|kind| kind.eq_ignore_ascii_case("file"));
        if !is_file_input {
            return Err(Error::ElementNotAFileInput);
        }
        self.tab
            .execute(
                dom::set_file_input_files(files, &self.object_id),
                Some(DOM_OPERATION_TIMEOUT),
            )
            .await?;
        Ok(())
    }

    // =========================================================================
    // Tree navigation
    // =========================================================================

    /// The element's parent.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` when the element has no parent.
    pub async fn get_parent_element(&self) -> Result<ElementHandle> {
        let result = self.execute_script(scripts::GET_PARENT_NODE, false).await?;
        let object_id = result["result"]["objectId"].as_str().ok_or_else(|| {
            Error::ElementNotFound {
                selector: "parent element".into(),
            }
        })?;
        materialize(&self.tab, object_id.to_owned(), None).await
    }

    /// Child elements down to `max_depth`, optionally restricted to the
    /// given (lowercased) tag names.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn get_children_elements(
        &self,
        max_depth: u32,
        tag_filter: &[String],
    ) -> Result<Vec<ElementHandle>> {
        self.collect_family(&scripts::get_children_nodes(max_depth, tag_filter))
            .await
    }

    /// Sibling elements sharing this element's parent, optionally
    /// restricted to the given (lowercased) tag names.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn get_siblings_elements(&self, tag_filter: &[String]) -> Result<Vec<ElementHandle>> {
        self.collect_family(&scripts::get_sibling_nodes(tag_filter))
            .await
    }

    /// Run a script returning an array of nodes and wrap each entry.
    async fn collect_family(&self, script: &str) -> Result<Vec<ElementHandle>> {
        let result = self.execute_script(script, false).await?;
        let Some(array_object_id) = result["result"]["objectId"].as_str() else {
            return Ok(Vec::new());
        };

        let properties = self
            .tab
            .execute(
                runtime::get_properties(array_object_id),
                Some(DOM_OPERATION_TIMEOUT),
            )
            .await?;

        let mut handles = Vec::new();
        if let Some(entries) = properties["result"].as_array() {
            for entry in entries {
                let is_index = entry["name"]
                    .as_str()
                    .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
                if !is_index {
                    continue;
                }
                let Some(object_id) = entry["value"]["objectId"].as_str() else {
                    continue;
                };
                if let Ok(handle) = materialize(&self.tab, object_id.to_owned(), None).await {
                    handles.push(handle);
                }
            }
        }
        Ok(handles)
    }

    // =========================================================================
    // Scripting and capture
    // =========================================================================

    /// Run a function declaration with this element bound to `this`.
    /// Returns the raw `Runtime.callFunctionOn` result payload.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn execute_script(&self, script: &str, return_by_value: bool) -> Result<Value> {
        self.tab
            .execute(
                runtime::call_function_on(&self.object_id, script, return_by_value),
                Some(DOM_OPERATION_TIMEOUT),
            )
            .await
    }

    /// Capture a JPEG of this element's viewport region and write it to
    /// `path`.
    ///
    /// # Errors
    ///
    /// Propagates protocol, decode, and I/O errors.
    pub async fn take_screenshot(&self, path: impl AsRef<Path>, quality: u8) -> Result<()> {
        let rect = self.bounds_using_js().await?;
        let clip = Viewport {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            scale: 1.0,
        };
        let response = self
            .tab
            .execute(
                page::capture_screenshot(ScreenshotFormat::Jpeg, Some(quality), Some(clip), None),
                None,
            )
            .await?;
        let data = response["data"]
            .as_str()
            .ok_or_else(|| Error::InvalidResponse("screenshot reply carried no data".into()))?;
        let bytes = utils::decode_base64(data)?;
        tokio::fs::write(path.as_ref(), bytes)
            .await
            .map_err(|e| Error::InvalidArgument(format!("cannot write screenshot: {e}")))?;
        Ok(())
    }

    /// Ask the browser to release the remote object behind this handle.
    /// Handles are otherwise never auto-released.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn release(self) -> Result<()> {
        self.tab
            .execute(runtime::release_object(&self.object_id), None)
            .await?;
        Ok(())
    }
}

impl FindElements for ElementHandle {
    fn finder_tab(&self) -> Tab {
        self.tab.clone()
    }

    fn scope_object_id(&self) -> Option<String> {
        Some(self.object_id.clone())
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.search {
            Some((by, value)) => write!(f, "ElementHandle({by}={value})"),
            None => write!(f, "ElementHandle(object_id={})", self.object_id),
        }
    }
}

/// Viewport-relative rectangle as reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Centroid of a polygon given as alternating x/y coordinates.
#[allow(clippy::cast_precision_loss)]
fn polygon_center(quad: &[f64]) -> (f64, f64) {
    let xs: Vec<f64> = quad.iter().copied().step_by(2).collect();
    let ys: Vec<f64> = quad.iter().copied().skip(1).step_by(2).collect();
    (
        xs.iter().sum::<f64>() / xs.len() as f64,
        ys.iter().sum::<f64>() / ys.len() as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_center_of_axis_aligned_quad() {
        // (10,20) (110,20) (110,70) (10,70)
        let quad = [10.0, 20.0, 110.0, 20.0, 110.0, 70.0, 10.0, 70.0];
        let (x, y) = polygon_center(&quad);
        assert!((x - 60.0).abs() < f64::EPSILON);
        assert!((y - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rect_deserializes_from_bounds_payload() {
        let rect: Rect =
            serde_json::from_str(r#"{"x": 1.5, "y": 2.0, "width": 10.0, "height": 4.0}"#).unwrap();
        assert!((rect.width - 10.0).abs() < f64::EPSILON);
    }
}
