//! Constructors for the `DOM` domain.

use serde_json::json;

use crate::cdp::Command;

pub fn enable() -> Command {
    Command::plain("DOM.enable")
}

pub fn disable() -> Command {
    Command::plain("DOM.disable")
}

/// Root document node of the current page.
pub fn get_document() -> Command {
    Command::plain("DOM.getDocument")
}

/// Describe the node behind a remote object id, including its flat
/// attribute list and node name.
pub fn describe_node(object_id: &str) -> Command {
    Command::new("DOM.describeNode", json!({ "objectId": object_id }))
}

/// Describe a node addressed by its DOM node id.
pub fn describe_node_by_id(node_id: i64) -> Command {
    Command::new("DOM.describeNode", json!({ "nodeId": node_id }))
}

/// Box model (content/padding/border/margin quads) for a node.
pub fn get_box_model(object_id: &str) -> Command {
    Command::new("DOM.getBoxModel", json!({ "objectId": object_id }))
}

pub fn get_outer_html(object_id: &str) -> Command {
    Command::new("DOM.getOuterHTML", json!({ "objectId": object_id }))
}

pub fn scroll_into_view_if_needed(object_id: &str) -> Command {
    Command::new(
        "DOM.scrollIntoViewIfNeeded",
        json!({ "objectId": object_id }),
    )
}

/// Attach file paths to an `<input type="file">` element.
pub fn set_file_input_files(files: &[String], object_id: &str) -> Command {
    Command::new(
        "DOM.setFileInputFiles",
        json!({ "files": files, "objectId": object_id }),
    )
}

/// Resolve a DOM node id into a remote object id.
pub fn resolve_node(node_id: i64) -> Command {
    Command::new("DOM.resolveNode", json!({ "nodeId": node_id }))
}

/// Request the DOM node id behind a remote object id.
pub fn request_node(object_id: &str) -> Command {
    Command::new("DOM.requestNode", json!({ "objectId": object_id }))
}

/// Backend node id of the element owning a frame.
pub fn get_frame_owner(frame_id: &str) -> Command {
    Command::new("DOM.getFrameOwner", json!({ "frameId": frame_id }))
}

/// Flat attribute name/value list of a node.
pub fn get_attributes(node_id: i64) -> Command {
    Command::new("DOM.getAttributes", json!({ "nodeId": node_id }))
}

pub fn set_attribute_value(node_id: i64, name: &str, value: &str) -> Command {
    Command::new(
        "DOM.setAttributeValue",
        json!({ "nodeId": node_id, "name": name, "value": value }),
    )
}

pub fn remove_attribute(node_id: i64, name: &str) -> Command {
    Command::new(
        "DOM.removeAttribute",
        json!({ "nodeId": node_id, "name": name }),
    )
}

/// DOM-domain selector query scoped to a node id.
pub fn query_selector(node_id: i64, selector: &str) -> Command {
    Command::new(
        "DOM.querySelector",
        json!({ "nodeId": node_id, "selector": selector }),
    )
}

/// DOM-domain selector query returning every match under a node id.
pub fn query_selector_all(node_id: i64, selector: &str) -> Command {
    Command::new(
        "DOM.querySelectorAll",
        json!({ "nodeId": node_id, "selector": selector }),
    )
}

/// Give keyboard focus to a node.
pub fn focus(object_id: &str) -> Command {
    Command::new("DOM.focus", json!({ "objectId": object_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn describe_node_wire_shape() {
        let cmd = describe_node("obj-1");
        assert_eq!(cmd.method, "DOM.describeNode");
        assert_eq!(cmd.params, Some(json!({"objectId": "obj-1"})));
    }

    #[test]
    fn set_file_input_files_wire_shape() {
        let cmd = set_file_input_files(&["/tmp/a.txt".to_owned()], "obj-2");
        assert_eq!(
            cmd.params,
            Some(json!({"files": ["/tmp/a.txt"], "objectId": "obj-2"}))
        );
    }

    #[test]
    fn enable_has_no_params() {
        assert_eq!(enable().method, "DOM.enable");
        assert!(enable().params.is_none());
    }

    #[test]
    fn get_frame_owner_wire_shape() {
        let cmd = get_frame_owner("FRAME-9");
        assert_eq!(cmd.method, "DOM.getFrameOwner");
        assert_eq!(cmd.params, Some(json!({"frameId": "FRAME-9"})));
    }

    #[test]
    fn query_selector_wire_shape() {
        let cmd = query_selector(12, "div.item");
        assert_eq!(
            cmd.params,
            Some(json!({"nodeId": 12, "selector": "div.item"}))
        );
    }

    #[test]
    fn set_attribute_value_wire_shape() {
        let cmd = set_attribute_value(3, "data-state", "ready");
        assert_eq!(
            cmd.params,
            Some(json!({"nodeId": 3, "name": "data-state", "value": "ready"}))
        );
    }

    #[test]
    fn focus_targets_the_object() {
        assert_eq!(
            focus("obj-4").params,
            Some(json!({"objectId": "obj-4"}))
        );
    }
}
