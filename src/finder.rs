//! DOM element location: selector strategies, XPath construction, and
//! the polling core shared by [`Tab`](crate::tab::Tab) and
//! [`ElementHandle`](crate::element::ElementHandle).

use std::fmt;

use serde_json::Value;
use tokio::time::{Duration, Instant, sleep};

use crate::cdp::Command;
use crate::commands::{dom, runtime};
use crate::element::ElementHandle;
use crate::error::{Error, Result};
use crate::scripts;
use crate::tab::Tab;

/// Poll interval of the waiting finder.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Protocol timeout for DOM-level describe and lookup commands.
pub(crate) const DOM_OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Selector strategy. The set is closed; `query` sniffs one of these
/// from the expression's leading characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum By {
    CssSelector,
    Xpath,
    Id,
    ClassName,
    Name,
    TagName,
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CssSelector => "css selector",
            Self::Xpath => "xpath",
            Self::Id => "id",
            Self::ClassName => "class name",
            Self::Name => "name",
            Self::TagName => "tag name",
        };
        f.write_str(label)
    }
}

/// Attribute-based search criteria. A single simple attribute dispatches
/// with its native strategy; combining several (or using `text` / extra
/// attributes) builds one XPath expression.
#[derive(Debug, Default, Clone)]
pub struct Criteria {
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub name: Option<String>,
    pub tag_name: Option<String>,
    pub text: Option<String>,
    pub attributes: Vec<(String, String)>,
    /// Zero means a single immediate attempt.
    pub timeout: Duration,
}

impl Criteria {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = Some(tag_name.into());
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reduce the criteria to a `(strategy, value)` pair.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` when no filter is set.
    pub fn to_strategy(&self) -> Result<(By, String)> {
        let empty = self.id.is_none()
            && self.class_name.is_none()
            && self.name.is_none()
            && self.tag_name.is_none()
            && self.text.is_none()
            && self.attributes.is_empty();
        if empty {
            return Err(Error::InvalidArgument(
                "at least one of id, class_name, name, tag_name, text or an attribute \
                 must be provided"
                    .into(),
            ));
        }

        let simple: Vec<(By, &String)> = [
            (By::Id, self.id.as_ref()),
            (By::ClassName, self.class_name.as_ref()),
            (By::Name, self.name.as_ref()),
            (By::TagName, self.tag_name.as_ref()),
        ]
        .into_iter()
        .filter_map(|(by, value)| value.map(|v| (by, v)))
        .collect();

        if simple.len() == 1 && self.text.is_none() && self.attributes.is_empty() {
            let (by, value) = simple[0];
            return Ok((by, value.clone()));
        }

        Ok((By::Xpath, self.build_xpath()))
    }

    /// Combine every filter into one XPath expression joined with `and`.
    /// Class names use the whitespace-normalized `contains` idiom so that
    /// `foo` never matches `foobar`; text matches partially.
    fn build_xpath(&self) -> String {
        let base = self
            .tag_name
            .as_ref()
            .map_or_else(|| "//*".to_owned(), |tag| format!("//{tag}"));

        let mut conditions = Vec::new();
        if let Some(id) = &self.id {
            conditions.push(format!(r#"@id="{id}""#));
        }
        if let Some(class_name) = &self.class_name {
            conditions.push(format!(
                r#"contains(concat(" ", normalize-space(@class), " "), " {class_name} ")"#
            ));
        }
        if let Some(name) = &self.name {
            conditions.push(format!(r#"@name="{name}""#));
        }
        if let Some(text) = &self.text {
            conditions.push(format!(r#"contains(text(), "{text}")"#));
        }
        for (attribute, value) in &self.attributes {
            conditions.push(format!(r#"@{attribute}="{value}""#));
        }

        if conditions.is_empty() {
            base
        } else {
            format!("{base}[{}]", conditions.join(" and "))
        }
    }
}

/// Sniff the strategy from a raw expression: leading `/`, `//`, `./` or
/// `.//` means XPath, `#` means id, `.` (but not `./`) means class name,
/// anything else is CSS. Sniffing a sniffed string is a no-op.
#[must_use]
pub fn sniff_expression(expression: &str) -> By {
    if expression.starts_with('/') || expression.starts_with("./") || expression.starts_with(".//")
    {
        return By::Xpath;
    }
    if expression.starts_with('#') {
        return By::Id;
    }
    if expression.starts_with('.') {
        return By::ClassName;
    }
    By::CssSelector
}

/// Make an XPath relative so it evaluates against a context node rather
/// than the document root.
fn ensure_relative_xpath(xpath: &str) -> String {
    if xpath.starts_with('.') {
        xpath.to_owned()
    } else {
        format!(".{xpath}")
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// CSS selector spelling for the simple strategies.
fn css_selector_for(by: By, value: &str) -> String {
    let escaped = escape_quotes(value);
    match by {
        By::ClassName => format!(".{escaped}"),
        By::Id => format!("#{escaped}"),
        _ => escaped,
    }
}

fn xpath_command(xpath: &str, scope: Option<&str>, all: bool) -> Command {
    let escaped = escape_quotes(xpath);
    match scope {
        Some(object_id) => {
            let relative = ensure_relative_xpath(&escaped);
            let script = if all {
                scripts::find_relative_xpath_elements(&relative)
            } else {
                scripts::find_relative_xpath_element(&relative)
            };
            runtime::call_function_on(object_id, &script, false)
        }
        None => {
            let script = if all {
                scripts::find_xpath_elements(&escaped)
            } else {
                scripts::find_xpath_element(&escaped)
            };
            runtime::evaluate(&script, false)
        }
    }
}

/// Build the lookup command for one element.
fn find_element_command(by: By, value: &str, scope: Option<&str>) -> Command {
    match by {
        By::Xpath => xpath_command(value, scope, false),
        By::Name => xpath_command(&format!(r#"//*[@name="{value}"]"#), scope, false),
        _ => {
            let selector = css_selector_for(by, value);
            match scope {
                Some(object_id) => runtime::call_function_on(
                    object_id,
                    &scripts::relative_query_selector(&selector),
                    false,
                ),
                None => runtime::evaluate(&scripts::query_selector(&selector), false),
            }
        }
    }
}

/// Build the lookup command for every matching element.
fn find_elements_command(by: By, value: &str, scope: Option<&str>) -> Command {
    match by {
        By::Xpath => xpath_command(value, scope, true),
        By::Name => xpath_command(&format!(r#"//*[@name="{value}"]"#), scope, true),
        _ => {
            let selector = css_selector_for(by, value);
            match scope {
                Some(object_id) => runtime::call_function_on(
                    object_id,
                    &scripts::relative_query_selector_all(&selector),
                    false,
                ),
                None => runtime::evaluate(&scripts::query_selector_all(&selector), false),
            }
        }
    }
}

/// Wrap a remote object id in an [`ElementHandle`]: describe the node,
/// snapshot its attributes, and record the selector that produced it.
pub(crate) async fn materialize(
    tab: &Tab,
    object_id: String,
    search: Option<(By, String)>,
) -> Result<ElementHandle> {
    let described = tab
        .execute(dom::describe_node(&object_id), Some(DOM_OPERATION_TIMEOUT))
        .await?;
    let node = &described["node"];

    let mut attributes: Vec<String> = node["attributes"]
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(ToOwned::to_owned))
                .collect()
        })
        .unwrap_or_default();
    let tag_name = node["nodeName"].as_str().unwrap_or_default().to_lowercase();
    attributes.push("tag_name".to_owned());
    attributes.push(tag_name);

    Ok(ElementHandle::new(object_id, tab.clone(), search, &attributes))
}

/// Remote object id of the command's result, when it resolved to a node.
fn result_object_id(response: &Value) -> Option<String> {
    response["result"]["objectId"].as_str().map(ToOwned::to_owned)
}

async fn find_one(
    tab: &Tab,
    scope: Option<&str>,
    by: By,
    value: &str,
) -> Result<Option<ElementHandle>> {
    let command = find_element_command(by, value, scope);
    let response = tab.execute(command, Some(DOM_OPERATION_TIMEOUT)).await?;
    let Some(object_id) = result_object_id(&response) else {
        return Ok(None);
    };
    let handle = materialize(tab, object_id, Some((by, value.to_owned()))).await?;
    Ok(Some(handle))
}

async fn find_many(
    tab: &Tab,
    scope: Option<&str>,
    by: By,
    value: &str,
) -> Result<Vec<ElementHandle>> {
    let command = find_elements_command(by, value, scope);
    let response = tab.execute(command, Some(DOM_OPERATION_TIMEOUT)).await?;
    let Some(array_object_id) = result_object_id(&response) else {
        return Ok(Vec::new());
    };

    let properties = tab
        .execute(
            runtime::get_properties(&array_object_id),
            Some(DOM_OPERATION_TIMEOUT),
        )
        .await?;

    let mut handles = Vec::new();
    if let Some(entries) = properties["result"].as_array() {
        for entry in entries {
            let is_index = entry["name"]
                .as_str()
                .is_some_and(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()));
            if !is_index || entry["value"]["type"] != "object" {
                continue;
            }
            let Some(object_id) = entry["value"]["objectId"].as_str() else {
                continue;
            };
            // A node can detach between enumeration and description;
            // skip it rather than failing the whole lookup.
            if let Ok(handle) =
                materialize(tab, object_id.to_owned(), Some((by, value.to_owned()))).await
            {
                handles.push(handle);
            }
        }
    }
    Ok(handles)
}

/// Outcome of the polling core, before the raising policy is applied.
enum Located {
    One(Option<ElementHandle>),
    Many(Vec<ElementHandle>),
}

async fn locate(
    tab: &Tab,
    scope: Option<&str>,
    by: By,
    value: &str,
    timeout: Duration,
    all: bool,
) -> Result<Located> {
    let attempt = || async {
        if all {
            find_many(tab, scope, by, value).await.map(Located::Many)
        } else {
            find_one(tab, scope, by, value).await.map(Located::One)
        }
    };

    if timeout.is_zero() {
        return attempt().await;
    }

    let deadline = Instant::now() + timeout;
    loop {
        match attempt().await? {
            Located::One(Some(handle)) => return Ok(Located::One(Some(handle))),
            Located::Many(handles) if !handles.is_empty() => return Ok(Located::Many(handles)),
            _ => {}
        }
        if Instant::now() >= deadline {
            return Ok(if all {
                Located::Many(Vec::new())
            } else {
                Located::One(None)
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

fn miss_error(by: By, value: &str, waited: bool) -> Error {
    let selector = format!("{by}={value}");
    if waited {
        Error::WaitElementTimeout { selector }
    } else {
        Error::ElementNotFound { selector }
    }
}

/// Element finding shared by the tab facade (document scope) and element
/// handles (subtree scope).
#[allow(async_fn_in_trait)]
pub trait FindElements {
    /// Tab through which lookup commands are dispatched.
    fn finder_tab(&self) -> Tab;

    /// Remote object the search is scoped to; `None` means the document.
    fn scope_object_id(&self) -> Option<String>;

    /// Find the first element matching `criteria`, waiting up to its
    /// timeout.
    ///
    /// # Errors
    ///
    /// `ElementNotFound` for an immediate miss, `WaitElementTimeout` when
    /// the deadline expires, `InvalidArgument` when no filter is set.
    async fn find(&self, criteria: Criteria) -> Result<ElementHandle> {
        let (by, value) = criteria.to_strategy()?;
        self.find_or_wait_element(by, &value, criteria.timeout).await
    }

    /// Like [`find`](Self::find) but a miss yields `Ok(None)`.
    async fn try_find(&self, criteria: Criteria) -> Result<Option<ElementHandle>> {
        let (by, value) = criteria.to_strategy()?;
        let tab = self.finder_tab();
        let scope = self.scope_object_id();
        match locate(&tab, scope.as_deref(), by, &value, criteria.timeout, false).await? {
            Located::One(handle) => Ok(handle),
            Located::Many(_) => unreachable!("single lookup returned many"),
        }
    }

    /// Find every element matching `criteria`.
    ///
    /// # Errors
    ///
    /// As [`find`](Self::find); an empty result set is an error.
    async fn find_all(&self, criteria: Criteria) -> Result<Vec<ElementHandle>> {
        let (by, value) = criteria.to_strategy()?;
        let waited = !criteria.timeout.is_zero();
        let tab = self.finder_tab();
        let scope = self.scope_object_id();
        match locate(&tab, scope.as_deref(), by, &value, criteria.timeout, true).await? {
            Located::Many(handles) if handles.is_empty() => Err(miss_error(by, &value, waited)),
            Located::Many(handles) => Ok(handles),
            Located::One(_) => unreachable!("multi lookup returned one"),
        }
    }

    /// Like [`find_all`](Self::find_all) but an empty result set is
    /// `Ok(vec![])`.
    async fn try_find_all(&self, criteria: Criteria) -> Result<Vec<ElementHandle>> {
        let (by, value) = criteria.to_strategy()?;
        let tab = self.finder_tab();
        let scope = self.scope_object_id();
        match locate(&tab, scope.as_deref(), by, &value, criteria.timeout, true).await? {
            Located::Many(handles) => Ok(handles),
            Located::One(_) => unreachable!("multi lookup returned one"),
        }
    }

    /// Find the first element matching a raw expression; the strategy is
    /// sniffed from its shape.
    ///
    /// # Errors
    ///
    /// As [`find`](Self::find).
    async fn query(&self, expression: &str, timeout: Duration) -> Result<ElementHandle> {
        let by = sniff_expression(expression);
        self.find_or_wait_element(by, expression, timeout).await
    }

    /// Like [`query`](Self::query) but a miss yields `Ok(None)`.
    async fn try_query(
        &self,
        expression: &str,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>> {
        let by = sniff_expression(expression);
        let tab = self.finder_tab();
        let scope = self.scope_object_id();
        match locate(&tab, scope.as_deref(), by, expression, timeout, false).await? {
            Located::One(handle) => Ok(handle),
            Located::Many(_) => unreachable!("single lookup returned many"),
        }
    }

    /// Every element matching a raw expression.
    ///
    /// # Errors
    ///
    /// As [`find_all`](Self::find_all).
    async fn query_all(&self, expression: &str, timeout: Duration) -> Result<Vec<ElementHandle>> {
        let by = sniff_expression(expression);
        let waited = !timeout.is_zero();
        let tab = self.finder_tab();
        let scope = self.scope_object_id();
        match locate(&tab, scope.as_deref(), by, expression, timeout, true).await? {
            Located::Many(handles) if handles.is_empty() => {
                Err(miss_error(by, expression, waited))
            }
            Located::Many(handles) => Ok(handles),
            Located::One(_) => unreachable!("multi lookup returned one"),
        }
    }

    /// Polling core: a zero timeout issues exactly one attempt and a miss
    /// is `ElementNotFound`; otherwise attempts repeat every 500ms until
    /// the deadline, after which the miss is `WaitElementTimeout`.
    async fn find_or_wait_element(
        &self,
        by: By,
        value: &str,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        let tab = self.finder_tab();
        let scope = self.scope_object_id();
        let waited = !timeout.is_zero();
        match locate(&tab, scope.as_deref(), by, value, timeout, false).await? {
            Located::One(Some(handle)) => Ok(handle),
            Located::One(None) => Err(miss_error(by, value, waited)),
            Located::Many(_) => unreachable!("single lookup returned many"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_simple_attribute_dispatches_directly() {
        let (by, value) = Criteria::new().id("submit").to_strategy().unwrap();
        assert_eq!(by, By::Id);
        assert_eq!(value, "submit");

        let (by, _) = Criteria::new().tag_name("input").to_strategy().unwrap();
        assert_eq!(by, By::TagName);
    }

    #[test]
    fn combined_attributes_build_xpath() {
        let (by, value) = Criteria::new()
            .tag_name("button")
            .class_name("primary")
            .to_strategy()
            .unwrap();
        assert_eq!(by, By::Xpath);
        assert_eq!(
            value,
            r#"//button[contains(concat(" ", normalize-space(@class), " "), " primary ")]"#
        );
    }

    #[test]
    fn text_filter_forces_xpath_with_contains() {
        let (by, value) = Criteria::new()
            .tag_name("a")
            .text("Sign in")
            .to_strategy()
            .unwrap();
        assert_eq!(by, By::Xpath);
        assert_eq!(value, r#"//a[contains(text(), "Sign in")]"#);
    }

    #[test]
    fn extra_attributes_force_xpath() {
        let (by, value) = Criteria::new()
            .id("row")
            .attribute("data-kind", "user")
            .to_strategy()
            .unwrap();
        assert_eq!(by, By::Xpath);
        assert_eq!(value, r#"//*[@id="row" and @data-kind="user"]"#);
    }

    #[test]
    fn empty_criteria_is_invalid() {
        assert!(matches!(
            Criteria::new().to_strategy(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn sniffing_covers_the_closed_set() {
        assert_eq!(sniff_expression("//div[@id='x']"), By::Xpath);
        assert_eq!(sniff_expression("/html/body"), By::Xpath);
        assert_eq!(sniff_expression("./div"), By::Xpath);
        assert_eq!(sniff_expression(".//div"), By::Xpath);
        assert_eq!(sniff_expression("#login"), By::Id);
        assert_eq!(sniff_expression(".card"), By::ClassName);
        assert_eq!(sniff_expression("div > span"), By::CssSelector);
    }

    #[test]
    fn sniffing_is_idempotent() {
        for expression in ["//a", "#x", ".y", "main aside"] {
            let first = sniff_expression(expression);
            assert_eq!(first, sniff_expression(expression));
        }
    }

    #[test]
    fn relative_xpath_gains_leading_dot() {
        assert_eq!(ensure_relative_xpath("//div"), ".//div");
        assert_eq!(ensure_relative_xpath(".//div"), ".//div");
        assert_eq!(ensure_relative_xpath("./div"), "./div");
    }

    #[test]
    fn document_scope_css_uses_evaluate() {
        let cmd = find_element_command(By::CssSelector, "div.item", None);
        assert_eq!(cmd.method, "Runtime.evaluate");
        let expr = cmd.params.unwrap()["expression"].as_str().unwrap().to_owned();
        assert!(expr.contains(r#"document.querySelector("div.item")"#));
    }

    #[test]
    fn node_scope_css_uses_call_function_on() {
        let cmd = find_element_command(By::ClassName, "item", Some("obj-1"));
        assert_eq!(cmd.method, "Runtime.callFunctionOn");
        let params = cmd.params.unwrap();
        assert_eq!(params["objectId"], "obj-1");
        assert!(
            params["functionDeclaration"]
                .as_str()
                .unwrap()
                .contains(r#"this.querySelector(".item")"#)
        );
    }

    #[test]
    fn name_strategy_rewrites_to_xpath() {
        let cmd = find_element_command(By::Name, "email", None);
        let expr = cmd.params.unwrap()["expression"].as_str().unwrap().to_owned();
        assert!(expr.contains(r#"//*[@name=\"email\"]"#));
        assert!(expr.contains("FIRST_ORDERED_NODE_TYPE"));
    }

    #[test]
    fn node_scope_xpath_is_made_relative() {
        let cmd = find_element_command(By::Xpath, "//td[1]", Some("obj-2"));
        let params = cmd.params.unwrap();
        assert!(
            params["functionDeclaration"]
                .as_str()
                .unwrap()
                .contains(r#".//td[1]"#)
        );
    }

    #[test]
    fn multi_lookup_uses_snapshot_type() {
        let cmd = find_elements_command(By::Xpath, "//li", None);
        let expr = cmd.params.unwrap()["expression"].as_str().unwrap().to_owned();
        assert!(expr.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
    }

    #[test]
    fn result_object_id_extraction() {
        let response = serde_json::json!({"result": {"type": "object", "objectId": "node-7"}});
        assert_eq!(result_object_id(&response).as_deref(), Some("node-7"));

        let null_result = serde_json::json!({"result": {"type": "object", "subtype": "null"}});
        assert!(result_object_id(&null_result).is_none());
    }
}
