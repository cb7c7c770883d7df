use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::error::CdpError;
use super::events::EventRouter;
use super::types::{CommandFrame, Incoming, RawMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reconnection policy: a bounded number of attempts with a fixed delay
/// between them. Once exhausted the connection is dead for good and every
/// later command fails immediately.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts (default: 5).
    pub max_retries: u32,
    /// Delay between attempts (default: 5s).
    pub retry_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Instruction sent from the connection handle to the transport task.
pub enum TransportCommand {
    /// Write a command frame and deliver the correlated reply.
    Send {
        frame: CommandFrame,
        response_tx: oneshot::Sender<Result<serde_json::Value, CdpError>>,
        deadline: Instant,
    },
    /// Close the socket and stop the task.
    Shutdown,
}

/// An in-flight command awaiting its reply.
struct PendingCommand {
    response_tx: oneshot::Sender<Result<serde_json::Value, CdpError>>,
    method: &'static str,
    deadline: Instant,
}

/// Cheap-to-clone handle over the background transport task.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    command_tx: mpsc::Sender<TransportCommand>,
    connected: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl TransportHandle {
    /// Hand an instruction to the transport task.
    ///
    /// # Errors
    ///
    /// Returns `CdpError::ConnectionClosed` if the task has exited.
    pub async fn send(&self, cmd: TransportCommand) -> Result<(), CdpError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| CdpError::ConnectionClosed)
    }

    /// Whether the socket is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Assign the next command id. Ids start at 1 and are unique for the
    /// life of the connection.
    pub fn next_command_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Connect the WebSocket and spawn the background transport task.
///
/// Incoming frames are either correlated with a pending command by id or
/// handed to `router` as events.
///
/// # Errors
///
/// Returns `CdpError::Connect` or `CdpError::ConnectTimeout` if the
/// initial connection cannot be established.
pub async fn spawn_transport(
    url: &str,
    router: Arc<EventRouter>,
    channel_capacity: usize,
    reconnect: ReconnectConfig,
    connect_timeout: Duration,
) -> Result<TransportHandle, CdpError> {
    let ws_stream = connect_ws(url, connect_timeout).await?;
    let connected = Arc::new(AtomicBool::new(true));
    let (command_tx, command_rx) = mpsc::channel(channel_capacity);

    let handle = TransportHandle {
        command_tx,
        connected: Arc::clone(&connected),
        next_id: Arc::new(AtomicU64::new(1)),
    };

    let url = url.to_owned();
    tokio::spawn(async move {
        let mut task = TransportTask {
            ws_stream,
            command_rx,
            router,
            pending: HashMap::new(),
            connected,
            url,
            reconnect,
            connect_timeout,
            dead: false,
        };
        task.run().await;
    });

    Ok(handle)
}

/// Establish a WebSocket connection with a timeout.
async fn connect_ws(url: &str, timeout: Duration) -> Result<WsStream, CdpError> {
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(CdpError::Connect(e.to_string())),
        Err(_) => Err(CdpError::ConnectTimeout),
    }
}

/// The background task owning the WebSocket.
struct TransportTask {
    ws_stream: WsStream,
    command_rx: mpsc::Receiver<TransportCommand>,
    router: Arc<EventRouter>,
    pending: HashMap<u64, PendingCommand>,
    connected: Arc<AtomicBool>,
    url: String,
    reconnect: ReconnectConfig,
    connect_timeout: Duration,
    /// Set once reconnection has been exhausted; the task then only
    /// drains commands with `ConnectionClosed` until shutdown.
    dead: bool,
}

impl TransportTask {
    async fn run(&mut self) {
        loop {
            if self.dead {
                match self.command_rx.recv().await {
                    Some(TransportCommand::Send { response_tx, .. }) => {
                        let _ = response_tx.send(Err(CdpError::ConnectionClosed));
                    }
                    Some(TransportCommand::Shutdown) | None => return,
                }
                continue;
            }

            let next_deadline = self.pending.values().map(|p| p.deadline).min();
            let deadline_sleep = async {
                match next_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    // Nothing pending; parked until another branch fires.
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                ws_msg = self.ws_stream.next() => {
                    match ws_msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(&text).await;
                        }
                        Some(Ok(Message::Close(_)) | Err(_)) | None => {
                            self.handle_disconnect().await;
                        }
                        Some(Ok(_)) => {
                            // Binary, Ping, Pong, Frame: not part of CDP.
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(TransportCommand::Send { frame, response_tx, deadline }) => {
                            self.handle_send(frame, response_tx, deadline).await;
                        }
                        Some(TransportCommand::Shutdown) | None => {
                            self.fail_pending();
                            let _ = self.ws_stream.close(None).await;
                            self.connected.store(false, Ordering::Relaxed);
                            return;
                        }
                    }
                }

                () = deadline_sleep => {
                    self.expire_pending();
                }
            }
        }
    }

    /// Route one incoming text frame: correlate by id or dispatch as an
    /// event. Malformed JSON and replies with unknown ids are logged and
    /// dropped.
    async fn handle_frame(&mut self, text: &str) {
        let raw: RawMessage = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "skipping malformed frame");
                return;
            }
        };

        match raw.classify() {
            Some(Incoming::Reply(reply)) => {
                let Some(pending) = self.pending.remove(&reply.id) else {
                    warn!(id = reply.id, "dropping reply with unknown id");
                    return;
                };
                let result = reply.result.map_err(|e| CdpError::Protocol {
                    code: e.code,
                    message: e.message,
                });
                let _ = pending.response_tx.send(result);
            }
            Some(Incoming::Event(event)) => {
                debug!(method = %event.method, "dispatching event");
                self.router.process_event(event).await;
            }
            None => {
                warn!("dropping unclassifiable frame");
            }
        }
    }

    async fn handle_send(
        &mut self,
        frame: CommandFrame,
        response_tx: oneshot::Sender<Result<serde_json::Value, CdpError>>,
        deadline: Instant,
    ) {
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(err) => {
                let _ = response_tx.send(Err(CdpError::InvalidCommand(err.to_string())));
                return;
            }
        };

        if let Err(err) = self.ws_stream.send(Message::Text(json.into())).await {
            warn!(%err, "websocket write failed");
            let _ = response_tx.send(Err(CdpError::ConnectionClosed));
            self.handle_disconnect().await;
            return;
        }

        self.pending.insert(
            frame.id,
            PendingCommand {
                response_tx,
                method: frame.method,
                deadline,
            },
        );
    }

    /// Complete every pending command whose deadline has lapsed. A reply
    /// arriving later finds no pending entry and is dropped.
    fn expire_pending(&mut self) {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(&id, _)| id)
            .collect();

        for id in expired {
            if let Some(pending) = self.pending.remove(&id) {
                let _ = pending.response_tx.send(Err(CdpError::CommandTimeout {
                    method: pending.method.to_owned(),
                }));
            }
        }
    }

    fn fail_pending(&mut self) {
        for (_, pending) in std::mem::take(&mut self.pending) {
            let _ = pending.response_tx.send(Err(CdpError::ConnectionClosed));
        }
    }

    /// Socket loss: every pending awaiter learns of it immediately, then
    /// a fixed-delay retry cycle attempts to bring the socket back for
    /// future commands. On exhaustion the task goes dead and drains all
    /// later sends with `ConnectionClosed`.
    async fn handle_disconnect(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
        self.fail_pending();

        for attempt in 1..=self.reconnect.max_retries {
            tokio::time::sleep(self.reconnect.retry_delay).await;
            match connect_ws(&self.url, self.connect_timeout).await {
                Ok(new_stream) => {
                    debug!(attempt, "websocket reconnected");
                    self.ws_stream = new_stream;
                    self.connected.store(true, Ordering::Relaxed);
                    return;
                }
                Err(err) => {
                    warn!(attempt, %err, "reconnection attempt failed");
                }
            }
        }

        self.dead = true;
    }
}
