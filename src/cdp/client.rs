use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};

use super::error::CdpError;
use super::events::EventRouter;
use super::transport::{ReconnectConfig, TransportCommand, TransportHandle, spawn_transport};
use super::types::{Command, CommandFrame, Event};
use crate::commands::browser;

/// Configuration for a CDP connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for the WebSocket handshake (default: 10s).
    pub connect_timeout: Duration,
    /// Default per-command timeout (default: 10s).
    pub command_timeout: Duration,
    /// Capacity of the internal command channel (default: 256).
    pub channel_capacity: usize,
    /// Reconnection settings.
    pub reconnect: ReconnectConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            channel_capacity: 256,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// One WebSocket to a CDP endpoint: correlates commands with replies by
/// id and routes unsolicited events to the subscription registry.
///
/// Connections are plain values; nothing dedupes them per port or per
/// target. Each tab owns its own.
#[derive(Clone)]
pub struct Connection {
    handle: TransportHandle,
    router: Arc<EventRouter>,
    config: ConnectionConfig,
    url: String,
}

impl Connection {
    /// Connect to a CDP WebSocket endpoint (`ws://host:port/devtools/…`).
    ///
    /// # Errors
    ///
    /// Returns `CdpError::Connect` if the handshake fails or
    /// `CdpError::ConnectTimeout` if it exceeds the configured timeout.
    pub async fn connect(url: &str, config: ConnectionConfig) -> Result<Self, CdpError> {
        let parsed = url::Url::parse(url).map_err(|e| CdpError::Connect(e.to_string()))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(CdpError::Connect(format!(
                "expected a ws:// or wss:// url, got {url}"
            )));
        }

        let router = Arc::new(EventRouter::new());
        let handle = spawn_transport(
            url,
            Arc::clone(&router),
            config.channel_capacity,
            config.reconnect.clone(),
            config.connect_timeout,
        )
        .await?;

        Ok(Self {
            handle,
            router,
            config,
            url: url.to_owned(),
        })
    }

    /// Send a command and wait for its reply.
    ///
    /// A fresh id is assigned at send time; the call resolves when the
    /// reply with that id arrives, or fails with `CommandTimeout` when
    /// `timeout` (the configured default if `None`) lapses first. A
    /// browser-reported error is surfaced as `CdpError::Protocol` with
    /// its code and message preserved.
    ///
    /// # Errors
    ///
    /// `CommandTimeout`, `ConnectionClosed`, `InvalidCommand`, or
    /// `Protocol`.
    pub async fn execute_command(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, CdpError> {
        self.execute_inner(command, None, timeout).await
    }

    /// Send a command routed to a child target session.
    ///
    /// # Errors
    ///
    /// Same as [`execute_command`](Self::execute_command).
    pub async fn execute_on_session(
        &self,
        command: Command,
        session_id: &str,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, CdpError> {
        self.execute_inner(command, Some(session_id.to_owned()), timeout)
            .await
    }

    async fn execute_inner(
        &self,
        command: Command,
        session_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, CdpError> {
        let frame = CommandFrame {
            id: self.handle.next_command_id(),
            method: command.method,
            params: command.params,
            session_id,
        };
        let deadline = Instant::now() + timeout.unwrap_or(self.config.command_timeout);

        let (response_tx, response_rx) = oneshot::channel();
        self.handle
            .send(TransportCommand::Send {
                frame,
                response_tx,
                deadline,
            })
            .await?;

        response_rx.await.map_err(|_| CdpError::ConnectionClosed)?
    }

    /// Register an event handler; see [`EventRouter::register_callback`].
    pub fn register_callback<F, Fut>(&self, event_name: &str, handler: F, temporary: bool) -> u64
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.router.register_callback(event_name, handler, temporary)
    }

    /// Remove a subscription by id; returns whether it existed.
    pub fn remove_callback(&self, id: u64) -> bool {
        self.router.remove_callback(id)
    }

    /// Remove every subscription.
    pub fn clear_callbacks(&self) {
        self.router.clear_callbacks();
    }

    /// Retained `Network.requestWillBeSent` events, oldest first.
    #[must_use]
    pub fn network_logs(&self) -> Vec<Event> {
        self.router.network_logs()
    }

    /// The currently open JavaScript dialog event, if any.
    #[must_use]
    pub fn current_dialog(&self) -> Option<Event> {
        self.router.current_dialog()
    }

    /// Best-effort liveness probe: sends `Browser.getVersion` and maps
    /// every failure to `false`.
    pub async fn ping(&self) -> bool {
        self.execute_command(browser::get_version(), Some(Duration::from_secs(2)))
            .await
            .is_ok()
    }

    /// Clear all subscriptions and close the socket. Safe to call on an
    /// already-closed connection.
    pub async fn close(&self) {
        self.clear_callbacks();
        let _ = self.handle.send(TransportCommand::Shutdown).await;
    }

    /// Whether the underlying socket is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    /// The WebSocket URL this connection was opened against.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
