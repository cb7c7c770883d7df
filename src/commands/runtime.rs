//! Constructors for the `Runtime` domain.

use serde_json::json;

use crate::cdp::Command;

pub fn enable() -> Command {
    Command::plain("Runtime.enable")
}

pub fn disable() -> Command {
    Command::plain("Runtime.disable")
}

/// Evaluate an expression in the page's default execution context.
pub fn evaluate(expression: &str, return_by_value: bool) -> Command {
    Command::new(
        "Runtime.evaluate",
        json!({
            "expression": expression,
            "returnByValue": return_by_value,
        }),
    )
}

/// Evaluate an expression in a specific execution context (isolated
/// worlds, iframes).
pub fn evaluate_in_context(expression: &str, context_id: i64, return_by_value: bool) -> Command {
    Command::new(
        "Runtime.evaluate",
        json!({
            "expression": expression,
            "contextId": context_id,
            "returnByValue": return_by_value,
        }),
    )
}

/// Call a function with the remote object as `this`.
pub fn call_function_on(object_id: &str, declaration: &str, return_by_value: bool) -> Command {
    Command::new(
        "Runtime.callFunctionOn",
        json!({
            "objectId": object_id,
            "functionDeclaration": declaration,
            "returnByValue": return_by_value,
        }),
    )
}

/// Enumerate an object's own properties (used to walk array results).
pub fn get_properties(object_id: &str) -> Command {
    Command::new(
        "Runtime.getProperties",
        json!({
            "objectId": object_id,
            "ownProperties": true,
        }),
    )
}

/// Release a remote object so the browser can reclaim it.
pub fn release_object(object_id: &str) -> Command {
    Command::new("Runtime.releaseObject", json!({ "objectId": object_id }))
}

/// Expose a binding callable from page scripts; calls surface as
/// `Runtime.bindingCalled` events.
pub fn add_binding(name: &str) -> Command {
    Command::new("Runtime.addBinding", json!({ "name": name }))
}

pub fn remove_binding(name: &str) -> Command {
    Command::new("Runtime.removeBinding", json!({ "name": name }))
}
