//! The tab facade: one page target, one connection, and the higher-level
//! operations built on top of them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::time::{Duration, Instant, sleep};
use tracing::debug;

use crate::cdp::{Command, Connection, ConnectionConfig, Event};
use crate::commands::{
    AuthResponse, ErrorReason, ScreenshotFormat, dom, fetch, network, page, runtime, storage,
    target,
};
use crate::discovery;
use crate::element::ElementHandle;
use crate::error::{Error, Result};
use crate::finder::{DOM_OPERATION_TIMEOUT, FindElements};
use crate::iframe::{self, FrameMetadata};

/// Poll interval while waiting for document readiness.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default navigation budget.
const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
struct DomainFlags {
    page: bool,
    network: bool,
    dom: bool,
    runtime: bool,
    fetch: bool,
    intercept_file_chooser: bool,
}

#[derive(Default)]
struct FrameCache {
    /// Resolved iframe tabs keyed by child target id (OOPIF) or frame id
    /// (same-process).
    tabs: HashMap<String, Tab>,
    /// Backend node id of the `<iframe>` element to cache key, so a
    /// second resolution of the same element hits the cache even before
    /// its frame id is known.
    backend_alias: HashMap<i64, String>,
}

struct TabInner {
    connection: Connection,
    target_id: String,
    browser_context_id: Option<String>,
    /// HTTP debug endpoint the tab was discovered through; needed to
    /// open the browser-level connection for OOPIF resolution.
    endpoint: Option<(String, u16)>,
    /// Child target session to route commands through, for iframe tabs
    /// backed by an out-of-process frame.
    session_id: Option<String>,
    /// Document element of an iframe tab; scopes finds to the frame.
    root_object_id: Option<String>,
    /// Isolated world of an iframe tab; scopes script evaluation.
    execution_context_id: Option<i64>,
    is_iframe: bool,
    domains: Mutex<DomainFlags>,
    frames: Mutex<FrameCache>,
}

/// A top-level page target (or a resolved iframe inside one).
///
/// Cloning is cheap and clones share all state, including the
/// connection, domain flags, and the iframe cache.
#[derive(Clone)]
pub struct Tab {
    inner: Arc<TabInner>,
}

impl Tab {
    /// Connect to the page target Chrome exposes for a fresh tab on
    /// `host:port`.
    ///
    /// # Errors
    ///
    /// `InvalidBrowserUrl` when discovery fails or the WebSocket cannot
    /// be opened.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(host, port, ConnectionConfig::default()).await
    }

    /// [`connect`](Self::connect) with explicit connection settings.
    ///
    /// # Errors
    ///
    /// As [`connect`](Self::connect).
    pub async fn connect_with_config(
        host: &str,
        port: u16,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let entry = discovery::new_tab_target(host, port).await?;
        let ws_url = entry
            .ws_debugger_url
            .clone()
            .ok_or_else(|| Error::InvalidBrowserUrl("target has no websocket URL".into()))?;
        let connection = Connection::connect(&ws_url, config).await?;
        Ok(Self::from_parts(
            connection,
            entry.id,
            Some((host.to_owned(), port)),
        ))
    }

    /// Attach to a specific target on `host:port` by its id.
    ///
    /// # Errors
    ///
    /// As [`connect`](Self::connect).
    pub async fn connect_to_target(host: &str, port: u16, target_id: &str) -> Result<Self> {
        let entry = discovery::target_by_id(host, port, target_id).await?;
        let ws_url = entry
            .ws_debugger_url
            .clone()
            .ok_or_else(|| Error::InvalidBrowserUrl("target has no websocket URL".into()))?;
        let connection = Connection::connect(&ws_url, ConnectionConfig::default()).await?;
        Ok(Self::from_parts(
            connection,
            entry.id,
            Some((host.to_owned(), port)),
        ))
    }

    /// Attach to a known WebSocket URL directly, bypassing discovery.
    /// Out-of-process iframe resolution is unavailable on such tabs.
    ///
    /// # Errors
    ///
    /// `InvalidBrowserUrl` when the WebSocket cannot be opened.
    pub async fn attach(ws_url: &str, target_id: &str) -> Result<Self> {
        let connection = Connection::connect(ws_url, ConnectionConfig::default()).await?;
        Ok(Self::from_parts(connection, target_id.to_owned(), None))
    }

    fn from_parts(
        connection: Connection,
        target_id: String,
        endpoint: Option<(String, u16)>,
    ) -> Self {
        Self {
            inner: Arc::new(TabInner {
                connection,
                target_id,
                browser_context_id: None,
                endpoint,
                session_id: None,
                root_object_id: None,
                execution_context_id: None,
                is_iframe: false,
                domains: Mutex::new(DomainFlags::default()),
                frames: Mutex::new(FrameCache::default()),
            }),
        }
    }

    fn from_iframe_context(parent: &Tab, context: iframe::IFrameContext) -> Self {
        let connection = context
            .session_connection
            .unwrap_or_else(|| parent.inner.connection.clone());
        let target_id = context
            .child_target_id
            .unwrap_or_else(|| context.frame_id.clone());
        Self {
            inner: Arc::new(TabInner {
                connection,
                target_id,
                browser_context_id: None,
                endpoint: parent.inner.endpoint.clone(),
                session_id: context.session_id,
                root_object_id: Some(context.document_object_id),
                execution_context_id: Some(context.execution_context_id),
                is_iframe: true,
                domains: Mutex::new(DomainFlags::default()),
                frames: Mutex::new(FrameCache::default()),
            }),
        }
    }

    /// Target id of the page (or child target / frame id for iframes).
    #[must_use]
    pub fn target_id(&self) -> &str {
        &self.inner.target_id
    }

    #[must_use]
    pub fn browser_context_id(&self) -> Option<&str> {
        self.inner.browser_context_id.as_deref()
    }

    /// Whether this tab wraps an iframe rather than a top-level page.
    #[must_use]
    pub fn is_iframe(&self) -> bool {
        self.inner.is_iframe
    }

    pub(crate) fn endpoint(&self) -> Option<(String, u16)> {
        self.inner.endpoint.clone()
    }

    /// Dispatch a command over this tab's connection, routed through the
    /// child session when one is attached.
    pub(crate) async fn execute(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let result = match &self.inner.session_id {
            Some(session_id) => {
                self.inner
                    .connection
                    .execute_on_session(command, session_id, timeout)
                    .await
            }
            None => self.inner.connection.execute_command(command, timeout).await,
        };
        result.map_err(Error::from)
    }

    fn require_top_level(&self) -> Result<()> {
        if self.inner.is_iframe {
            return Err(Error::TopLevelTargetRequired);
        }
        Ok(())
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate to `url` and wait until the document is ready. A tab
    /// already sitting on `url` is refreshed instead.
    ///
    /// # Errors
    ///
    /// `PageLoadTimeout` when readiness is not reached within `timeout`
    /// (default 30s).
    pub async fn go_to(&self, url: &str, timeout: Option<Duration>) -> Result<()> {
        if let Ok(current) = self.current_url().await
            && current == url
        {
            return self.refresh(timeout).await;
        }

        self.execute(page::navigate(url), None).await?;
        self.wait_page_load(timeout.unwrap_or(DEFAULT_PAGE_LOAD_TIMEOUT))
            .await
    }

    /// Reload the page and wait until the document is ready.
    ///
    /// # Errors
    ///
    /// As [`go_to`](Self::go_to).
    pub async fn refresh(&self, timeout: Option<Duration>) -> Result<()> {
        self.execute(page::reload(false), None).await?;
        self.wait_page_load(timeout.unwrap_or(DEFAULT_PAGE_LOAD_TIMEOUT))
            .await
    }

    /// Abort in-flight loading.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn stop_loading(&self) -> Result<()> {
        self.execute(page::stop_loading(), None).await?;
        Ok(())
    }

    /// Navigate one entry back in this tab's history.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when there is no earlier entry.
    pub async fn go_back(&self) -> Result<()> {
        self.navigate_history(-1).await
    }

    /// Navigate one entry forward in this tab's history.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when there is no later entry.
    pub async fn go_forward(&self) -> Result<()> {
        self.navigate_history(1).await
    }

    async fn navigate_history(&self, offset: i64) -> Result<()> {
        let history = self.execute(page::get_navigation_history(), None).await?;
        let current = history["currentIndex"]
            .as_i64()
            .ok_or_else(|| Error::InvalidResponse("history reply had no currentIndex".into()))?;
        let entries = history["entries"]
            .as_array()
            .ok_or_else(|| Error::InvalidResponse("history reply had no entries".into()))?;

        let target_index = current + offset;
        let entry = usize::try_from(target_index)
            .ok()
            .and_then(|index| entries.get(index))
            .ok_or_else(|| {
                Error::InvalidArgument(format!("no history entry at offset {offset}"))
            })?;
        let entry_id = entry["id"]
            .as_i64()
            .ok_or_else(|| Error::InvalidResponse("history entry had no id".into()))?;
        self.execute(page::navigate_to_history_entry(entry_id), None)
            .await?;
        Ok(())
    }

    /// Raise this tab's window.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn bring_to_front(&self) -> Result<()> {
        self.execute(page::bring_to_front(), None).await?;
        Ok(())
    }

    /// Override the user agent for requests made by this tab.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.execute(network::set_user_agent_override(user_agent), None)
            .await?;
        Ok(())
    }

    async fn wait_page_load(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self
                .evaluate_expression("document.readyState", true)
                .await?;
            if state["result"]["value"].as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::PageLoadTimeout);
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// URL of the document this tab is scoped to.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn current_url(&self) -> Result<String> {
        let result = match &self.inner.root_object_id {
            Some(root) => {
                self.execute(
                    runtime::call_function_on(
                        root,
                        "function() { return this.ownerDocument.location.href; }",
                        true,
                    ),
                    None,
                )
                .await?
            }
            None => self.evaluate_expression("window.location.href", true).await?,
        };
        result["result"]["value"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::InvalidResponse("location lookup returned no value".into()))
    }

    /// Serialized markup of the document this tab is scoped to.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn page_source(&self) -> Result<String> {
        let result = match &self.inner.root_object_id {
            Some(root) => {
                self.execute(
                    runtime::call_function_on(root, "function() { return this.outerHTML; }", true),
                    None,
                )
                .await?
            }
            None => {
                self.evaluate_expression("document.documentElement.outerHTML", true)
                    .await?
            }
        };
        result["result"]["value"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::InvalidResponse("source lookup returned no value".into()))
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Evaluate in this tab's execution context: the page's default
    /// context, or the iframe's isolated world.
    async fn evaluate_expression(&self, expression: &str, return_by_value: bool) -> Result<Value> {
        let command = match self.inner.execution_context_id {
            Some(context_id) => {
                runtime::evaluate_in_context(expression, context_id, return_by_value)
            }
            None => runtime::evaluate(expression, return_by_value),
        };
        self.execute(command, None).await
    }

    /// Run a script in the page. Scripts referencing `argument` must go
    /// through [`execute_script_with_element`](Self::execute_script_with_element).
    ///
    /// # Errors
    ///
    /// `InvalidScriptWithElement` when the script references `argument`.
    pub async fn execute_script(&self, script: &str) -> Result<Value> {
        if script.contains("argument") {
            return Err(Error::InvalidScriptWithElement(
                "script references `argument` but no element was provided".into(),
            ));
        }
        self.evaluate_expression(script, true).await
    }

    /// Run a script against an element: every `argument` occurrence is
    /// rewritten to `this` and the script runs with the element bound.
    ///
    /// # Errors
    ///
    /// `InvalidScriptWithElement` when the script never references
    /// `argument`.
    pub async fn execute_script_with_element(
        &self,
        script: &str,
        element: &ElementHandle,
    ) -> Result<Value> {
        if !script.contains("argument") {
            return Err(Error::InvalidScriptWithElement(
                "an element was provided but the script never references `argument`".into(),
            ));
        }
        let rewritten = script.replace("argument", "this");
        let declaration = if rewritten.trim_start().starts_with("function") {
            rewritten
        } else {
            format!("function() {{ {rewritten} }}")
        };
        element.execute_script(&declaration, true).await
    }

    // =========================================================================
    // Domain toggles
    // =========================================================================

    fn domain_enabled(&self, read: impl Fn(&DomainFlags) -> bool) -> bool {
        let flags = self.inner.domains.lock().expect("domain flags lock poisoned");
        read(&flags)
    }

    fn set_domain(&self, write: impl Fn(&mut DomainFlags)) {
        let mut flags = self.inner.domains.lock().expect("domain flags lock poisoned");
        write(&mut flags);
    }

    /// Enable `Page` domain events; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn enable_page_events(&self) -> Result<()> {
        if self.domain_enabled(|d| d.page) {
            return Ok(());
        }
        self.execute(page::enable(), None).await?;
        self.set_domain(|d| d.page = true);
        Ok(())
    }

    /// Disable `Page` domain events; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn disable_page_events(&self) -> Result<()> {
        if !self.domain_enabled(|d| d.page) {
            return Ok(());
        }
        self.execute(page::disable(), None).await?;
        self.set_domain(|d| d.page = false);
        Ok(())
    }

    /// Enable `Network` domain events, unlocking the network log and
    /// response body accessors; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn enable_network_events(&self) -> Result<()> {
        if self.domain_enabled(|d| d.network) {
            return Ok(());
        }
        self.execute(network::enable(), None).await?;
        self.set_domain(|d| d.network = true);
        Ok(())
    }

    /// Disable `Network` domain events; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn disable_network_events(&self) -> Result<()> {
        if !self.domain_enabled(|d| d.network) {
            return Ok(());
        }
        self.execute(network::disable(), None).await?;
        self.set_domain(|d| d.network = false);
        Ok(())
    }

    /// Enable `DOM` domain events; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn enable_dom_events(&self) -> Result<()> {
        if self.domain_enabled(|d| d.dom) {
            return Ok(());
        }
        self.execute(dom::enable(), None).await?;
        self.set_domain(|d| d.dom = true);
        Ok(())
    }

    /// Enable `Runtime` domain events; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn enable_runtime_events(&self) -> Result<()> {
        if self.domain_enabled(|d| d.runtime) {
            return Ok(());
        }
        self.execute(runtime::enable(), None).await?;
        self.set_domain(|d| d.runtime = true);
        Ok(())
    }

    /// Enable `Fetch` domain interception; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn enable_fetch_events(&self, handle_auth_requests: bool) -> Result<()> {
        if self.domain_enabled(|d| d.fetch) {
            return Ok(());
        }
        self.execute(fetch::enable(None, handle_auth_requests), None)
            .await?;
        self.set_domain(|d| d.fetch = true);
        Ok(())
    }

    /// Disable `Fetch` domain interception; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn disable_fetch_events(&self) -> Result<()> {
        if !self.domain_enabled(|d| d.fetch) {
            return Ok(());
        }
        self.execute(fetch::disable(), None).await?;
        self.set_domain(|d| d.fetch = false);
        Ok(())
    }

    /// Intercept file chooser dialogs so file inputs can be driven
    /// programmatically; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn enable_intercept_file_chooser_dialog(&self) -> Result<()> {
        if self.domain_enabled(|d| d.intercept_file_chooser) {
            return Ok(());
        }
        self.execute(page::set_intercept_file_chooser_dialog(true), None)
            .await?;
        self.set_domain(|d| d.intercept_file_chooser = true);
        Ok(())
    }

    /// Stop intercepting file chooser dialogs; idempotent.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn disable_intercept_file_chooser_dialog(&self) -> Result<()> {
        if !self.domain_enabled(|d| d.intercept_file_chooser) {
            return Ok(());
        }
        self.execute(page::set_intercept_file_chooser_dialog(false), None)
            .await?;
        self.set_domain(|d| d.intercept_file_chooser = false);
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribe a handler to a protocol event on this tab's connection.
    /// Returns the subscription id.
    pub fn on<F, Fut>(&self, event_name: &str, handler: F, temporary: bool) -> u64
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner
            .connection
            .register_callback(event_name, handler, temporary)
    }

    /// Remove a subscription created with [`on`](Self::on).
    pub fn remove_callback(&self, id: u64) -> bool {
        self.inner.connection.remove_callback(id)
    }

    /// Remove every subscription on this tab's connection.
    pub fn clear_callbacks(&self) {
        self.inner.connection.clear_callbacks();
    }

    // =========================================================================
    // Network introspection
    // =========================================================================

    /// Captured `Network.requestWillBeSent` events, optionally filtered
    /// by a substring of the request URL.
    ///
    /// # Errors
    ///
    /// `NetworkEventsNotEnabled` unless
    /// [`enable_network_events`](Self::enable_network_events) ran first.
    pub fn get_network_logs(&self, url_filter: Option<&str>) -> Result<Vec<Event>> {
        if !self.domain_enabled(|d| d.network) {
            return Err(Error::NetworkEventsNotEnabled);
        }
        let logs = self.inner.connection.network_logs();
        Ok(match url_filter {
            Some(filter) => logs
                .into_iter()
                .filter(|event| {
                    event.params["request"]["url"]
                        .as_str()
                        .is_some_and(|url| url.contains(filter))
                })
                .collect(),
            None => logs,
        })
    }

    /// Response body for a request id taken from the network log.
    ///
    /// # Errors
    ///
    /// `NetworkEventsNotEnabled` unless network events are on;
    /// protocol errors otherwise.
    pub async fn get_network_response_body(&self, request_id: &str) -> Result<String> {
        if !self.domain_enabled(|d| d.network) {
            return Err(Error::NetworkEventsNotEnabled);
        }
        let response = self
            .execute(network::get_response_body(request_id), None)
            .await?;
        let body = response["body"]
            .as_str()
            .ok_or_else(|| Error::InvalidResponse("response body reply carried no body".into()))?;
        if response["base64Encoded"].as_bool() == Some(true) {
            let bytes = crate::utils::decode_base64(body)?;
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(body.to_owned())
    }

    // =========================================================================
    // Request interception
    // =========================================================================

    /// Let a paused request continue unmodified.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn continue_request(&self, request_id: &str) -> Result<()> {
        self.execute(fetch::continue_request(request_id, None, None), None)
            .await?;
        Ok(())
    }

    /// Abort a paused request.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn fail_request(&self, request_id: &str, reason: ErrorReason) -> Result<()> {
        self.execute(fetch::fail_request(request_id, reason), None)
            .await?;
        Ok(())
    }

    /// Answer a paused request with a synthetic response; `body` is
    /// base64-encoded.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn fulfill_request(
        &self,
        request_id: &str,
        response_code: u16,
        body: Option<&str>,
    ) -> Result<()> {
        self.execute(
            fetch::fulfill_request(request_id, response_code, None, body),
            None,
        )
        .await?;
        Ok(())
    }

    /// Answer a paused auth challenge with credentials.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn continue_with_auth(
        &self,
        request_id: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        self.execute(
            fetch::continue_with_auth(
                request_id,
                AuthResponse::ProvideCredentials,
                Some(username),
                Some(password),
            ),
            None,
        )
        .await?;
        Ok(())
    }

    // =========================================================================
    // Dialogs
    // =========================================================================

    /// Whether a JavaScript dialog is currently open. Page events must be
    /// enabled for dialog events to arrive.
    #[must_use]
    pub fn has_dialog(&self) -> bool {
        self.inner.connection.current_dialog().is_some()
    }

    /// Message of the currently open dialog.
    ///
    /// # Errors
    ///
    /// `NoDialogPresent` when no dialog is open.
    pub fn get_dialog_message(&self) -> Result<String> {
        let dialog = self
            .inner
            .connection
            .current_dialog()
            .ok_or(Error::NoDialogPresent)?;
        Ok(dialog.params["message"].as_str().unwrap_or_default().to_owned())
    }

    /// Accept or dismiss the currently open dialog, optionally answering
    /// a prompt.
    ///
    /// # Errors
    ///
    /// `NoDialogPresent` when no dialog is open; protocol errors
    /// otherwise.
    pub async fn handle_dialog(&self, accept: bool, prompt_text: Option<&str>) -> Result<()> {
        if !self.has_dialog() {
            return Err(Error::NoDialogPresent);
        }
        self.execute(page::handle_javascript_dialog(accept, prompt_text), None)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Capture
    // =========================================================================

    /// Capture the page to `path`; the format follows the extension
    /// (`png`, `jpg`, `jpeg`).
    ///
    /// # Errors
    ///
    /// `InvalidFileExtension` for other extensions,
    /// `TopLevelTargetRequired` on iframe tabs.
    pub async fn take_screenshot(
        &self,
        path: impl AsRef<Path>,
        quality: u8,
        full_page: bool,
    ) -> Result<()> {
        self.require_top_level()?;
        let path = path.as_ref();
        let format = screenshot_format_for(path)?;
        let data = self.screenshot_base64(format, quality, full_page).await?;
        let bytes = crate::utils::decode_base64(&data)?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| Error::InvalidArgument(format!("cannot write screenshot: {e}")))?;
        Ok(())
    }

    /// Capture the page and return the base64 payload.
    ///
    /// # Errors
    ///
    /// `TopLevelTargetRequired` on iframe tabs; protocol errors
    /// otherwise.
    pub async fn screenshot_base64(
        &self,
        format: ScreenshotFormat,
        quality: u8,
        full_page: bool,
    ) -> Result<String> {
        self.require_top_level()?;
        let quality = matches!(format, ScreenshotFormat::Jpeg).then_some(quality);
        let response = self
            .execute(
                page::capture_screenshot(format, quality, None, full_page.then_some(true)),
                None,
            )
            .await?;
        response["data"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::InvalidResponse("screenshot reply carried no data".into()))
    }

    /// Render the page to a PDF file.
    ///
    /// # Errors
    ///
    /// `TopLevelTargetRequired` on iframe tabs; protocol, decode, and
    /// I/O errors otherwise.
    pub async fn print_to_pdf(
        &self,
        path: impl AsRef<Path>,
        landscape: bool,
        print_background: bool,
    ) -> Result<()> {
        self.require_top_level()?;
        let response = self
            .execute(page::print_to_pdf(landscape, print_background), None)
            .await?;
        let data = response["data"]
            .as_str()
            .ok_or_else(|| Error::InvalidResponse("pdf reply carried no data".into()))?;
        let bytes = crate::utils::decode_base64(data)?;
        tokio::fs::write(path.as_ref(), bytes)
            .await
            .map_err(|e| Error::InvalidArgument(format!("cannot write pdf: {e}")))?;
        Ok(())
    }

    // =========================================================================
    // Cookies
    // =========================================================================

    /// Cookies visible to the current page.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn get_cookies(&self) -> Result<Vec<Value>> {
        let response = self.execute(network::get_cookies(None), None).await?;
        Ok(response["cookies"].as_array().cloned().unwrap_or_default())
    }

    /// Set cookies; entries are CDP `CookieParam` objects.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn set_cookies(&self, cookies: &[Value]) -> Result<()> {
        self.execute(network::set_cookies(cookies), None).await?;
        Ok(())
    }

    /// Delete every cookie of the browser and this context.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn delete_all_cookies(&self) -> Result<()> {
        self.execute(storage::clear_cookies(self.browser_context_id()), None)
            .await?;
        self.execute(network::clear_browser_cookies(), None).await?;
        Ok(())
    }

    // =========================================================================
    // IFrames
    // =========================================================================

    /// Resolve the tab driving an `<iframe>` element's document. The
    /// result is cached: asking again for the same iframe returns the
    /// same tab, with its isolated world created exactly once.
    ///
    /// # Errors
    ///
    /// `NotAnIFrame` for other elements, `InvalidIFrame` when the frame
    /// cannot be resolved.
    pub async fn get_frame(&self, element: &ElementHandle) -> Result<Tab> {
        if element.tag_name().is_none_or(|tag| !tag.eq_ignore_ascii_case("iframe")) {
            return Err(Error::NotAnIFrame);
        }

        let described = self
            .execute(
                dom::describe_node(element.object_id()),
                Some(DOM_OPERATION_TIMEOUT),
            )
            .await?;
        let meta = FrameMetadata::from_node(&described["node"]);

        {
            let frames = self.inner.frames.lock().expect("frame cache lock poisoned");
            if let Some(frame_id) = &meta.frame_id
                && let Some(tab) = frames.tabs.get(frame_id)
            {
                return Ok(tab.clone());
            }
            if let Some(backend_node_id) = meta.backend_node_id
                && let Some(key) = frames.backend_alias.get(&backend_node_id)
                && let Some(tab) = frames.tabs.get(key)
            {
                return Ok(tab.clone());
            }
        }

        let backend_node_id = meta.backend_node_id;
        let context = iframe::resolve(self, meta).await?;
        debug!(
            frame = %context.frame_id,
            url = ?context.document_url,
            "resolved iframe context"
        );
        let key = context
            .child_target_id
            .clone()
            .unwrap_or_else(|| context.frame_id.clone());
        let frame_id = context.frame_id.clone();
        let tab = Tab::from_iframe_context(self, context);

        let mut frames = self.inner.frames.lock().expect("frame cache lock poisoned");
        let cached = frames
            .tabs
            .entry(key.clone())
            .or_insert_with(|| tab.clone())
            .clone();
        frames.tabs.entry(frame_id).or_insert_with(|| cached.clone());
        if let Some(backend_node_id) = backend_node_id {
            frames.backend_alias.insert(backend_node_id, key);
        }
        debug!(frame = %cached.target_id(), "iframe tab cached");
        Ok(cached)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Best-effort liveness probe of the connection.
    pub async fn ping(&self) -> bool {
        self.inner.connection.ping().await
    }

    /// Close the page target and the connection.
    ///
    /// # Errors
    ///
    /// `TopLevelTargetRequired` on iframe tabs.
    pub async fn close(&self) -> Result<()> {
        self.require_top_level()?;
        let _ = self.execute(page::close(), None).await;
        self.inner.connection.close().await;
        Ok(())
    }

    /// Open a new page target through this tab's connection and return
    /// its id.
    ///
    /// # Errors
    ///
    /// Propagates protocol errors.
    pub async fn open_new_target(&self, url: &str) -> Result<String> {
        let response = self.execute(target::create_target(url), None).await?;
        response["targetId"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::InvalidResponse("createTarget returned no targetId".into()))
    }
}

impl FindElements for Tab {
    fn finder_tab(&self) -> Tab {
        self.clone()
    }

    fn scope_object_id(&self) -> Option<String> {
        self.inner.root_object_id.clone()
    }
}

impl std::fmt::Debug for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tab")
            .field("target_id", &self.inner.target_id)
            .field("is_iframe", &self.inner.is_iframe)
            .finish_non_exhaustive()
    }
}

fn screenshot_format_for(path: &Path) -> Result<ScreenshotFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => Ok(ScreenshotFormat::Png),
        "jpg" | "jpeg" => Ok(ScreenshotFormat::Jpeg),
        other => Err(Error::InvalidFileExtension(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screenshot_format_follows_extension() {
        assert!(matches!(
            screenshot_format_for(Path::new("/tmp/shot.png")),
            Ok(ScreenshotFormat::Png)
        ));
        assert!(matches!(
            screenshot_format_for(Path::new("/tmp/shot.JPG")),
            Ok(ScreenshotFormat::Jpeg)
        ));
        assert!(matches!(
            screenshot_format_for(Path::new("/tmp/shot.jpeg")),
            Ok(ScreenshotFormat::Jpeg)
        ));
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        assert!(matches!(
            screenshot_format_for(Path::new("/tmp/shot.webp")),
            Err(Error::InvalidFileExtension(ext)) if ext == "webp"
        ));
        assert!(matches!(
            screenshot_format_for(Path::new("/tmp/shot")),
            Err(Error::InvalidFileExtension(_))
        ));
    }
}
