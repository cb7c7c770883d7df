//! JavaScript snippets evaluated in the page.
//!
//! Snippets used through `Runtime.callFunctionOn` are function
//! declarations receiving the element as `this`; snippets used through
//! `Runtime.evaluate` are plain expressions. Placeholders are substituted
//! by the builder functions below before dispatch.

/// `document.querySelector` at document scope.
pub(crate) fn query_selector(selector: &str) -> String {
    format!(r#"document.querySelector("{selector}")"#)
}

/// `document.querySelectorAll` at document scope.
pub(crate) fn query_selector_all(selector: &str) -> String {
    format!(r#"document.querySelectorAll("{selector}")"#)
}

/// `querySelector` scoped to the receiving element.
pub(crate) fn relative_query_selector(selector: &str) -> String {
    format!(r#"function() {{ return this.querySelector("{selector}"); }}"#)
}

/// `querySelectorAll` scoped to the receiving element.
pub(crate) fn relative_query_selector_all(selector: &str) -> String {
    format!(r#"function() {{ return this.querySelectorAll("{selector}"); }}"#)
}

/// First XPath match at document scope.
pub(crate) fn find_xpath_element(xpath: &str) -> String {
    format!(
        r#"document.evaluate("{xpath}", document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"#
    )
}

/// All XPath matches at document scope, materialized into an array.
pub(crate) fn find_xpath_elements(xpath: &str) -> String {
    format!(
        r#"(function() {{
    const snapshot = document.evaluate("{xpath}", document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    const nodes = [];
    for (let i = 0; i < snapshot.snapshotLength; i++) nodes.push(snapshot.snapshotItem(i));
    return nodes;
}})()"#
    )
}

/// First XPath match relative to the receiving element.
pub(crate) fn find_relative_xpath_element(xpath: &str) -> String {
    format!(
        r#"function() {{ return document.evaluate("{xpath}", this, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; }}"#
    )
}

/// All XPath matches relative to the receiving element.
pub(crate) fn find_relative_xpath_elements(xpath: &str) -> String {
    format!(
        r#"function() {{
    const snapshot = document.evaluate("{xpath}", this, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    const nodes = [];
    for (let i = 0; i < snapshot.snapshotLength; i++) nodes.push(snapshot.snapshotItem(i));
    return nodes;
}}"#
    )
}

/// Bounding client rect as a JSON string.
pub(crate) const BOUNDS: &str = r"function() {
    const rect = this.getBoundingClientRect();
    return JSON.stringify({ x: rect.x, y: rect.y, width: rect.width, height: rect.height });
}";

/// Visibility test: laid out, not hidden, not fully transparent.
pub(crate) const ELEMENT_VISIBLE: &str = r"function() {
    const rect = this.getBoundingClientRect();
    if (rect.width === 0 || rect.height === 0) return false;
    const style = window.getComputedStyle(this);
    return style.display !== 'none' && style.visibility !== 'hidden' && style.opacity !== '0';
}";

/// Whether the element is the topmost node at its own center point.
pub(crate) const ELEMENT_ON_TOP: &str = r"function() {
    const rect = this.getBoundingClientRect();
    const topmost = document.elementFromPoint(rect.x + rect.width / 2, rect.y + rect.height / 2);
    return topmost !== null && (topmost === this || this.contains(topmost) || topmost.contains(this));
}";

/// Interactability: visible, on top, and not disabled.
pub(crate) const ELEMENT_INTERACTIVE: &str = r"function() {
    const rect = this.getBoundingClientRect();
    if (rect.width === 0 || rect.height === 0) return false;
    const style = window.getComputedStyle(this);
    if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return false;
    if (this.disabled) return false;
    const topmost = document.elementFromPoint(rect.x + rect.width / 2, rect.y + rect.height / 2);
    return topmost !== null && (topmost === this || this.contains(topmost) || topmost.contains(this));
}";

/// JavaScript click; reports whether the element accepted it.
pub(crate) const CLICK: &str = r"function() {
    if (typeof this.click !== 'function') return false;
    this.click();
    return true;
}";

/// Selecting an `<option>`: set the owning select's value and fire
/// `change` so framework listeners run.
pub(crate) const CLICK_OPTION_TAG: &str = r"function() {
    const select = this.closest('select');
    if (!select) return false;
    select.value = this.value;
    select.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
}";

pub(crate) const GET_PARENT_NODE: &str = r"function() { return this.parentElement; }";

/// Descendants up to `max_depth`, optionally restricted to `tag_filter`
/// (lowercased tag names).
pub(crate) fn get_children_nodes(max_depth: u32, tag_filter: &[String]) -> String {
    let tags = serde_json::to_string(tag_filter).unwrap_or_else(|_| "[]".into());
    format!(
        r"function() {{
    const maxDepth = {max_depth};
    const tags = {tags};
    const found = [];
    const walk = (node, depth) => {{
        if (depth > maxDepth) return;
        for (const child of node.children) {{
            if (tags.length === 0 || tags.includes(child.tagName.toLowerCase())) found.push(child);
            walk(child, depth + 1);
        }}
    }};
    walk(this, 1);
    return found;
}}"
    )
}

/// Siblings sharing this element's parent, optionally tag-filtered.
pub(crate) fn get_sibling_nodes(tag_filter: &[String]) -> String {
    let tags = serde_json::to_string(tag_filter).unwrap_or_else(|_| "[]".into());
    format!(
        r"function() {{
    const tags = {tags};
    if (!this.parentElement) return [];
    return Array.from(this.parentElement.children).filter((node) =>
        node !== this && (tags.length === 0 || tags.includes(node.tagName.toLowerCase())));
}}"
    )
}
