//! Integration tests for the connection multiplexer and event router.
//!
//! Each test spins up a mock WebSocket CDP server with configurable
//! behavior, connects a `Connection`, and verifies the expected
//! interactions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chromepilot::cdp::{CdpError, Command, Connection, ConnectionConfig, ReconnectConfig};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

// =============================================================================
// Mock server helpers
// =============================================================================

/// Config with fast failure behavior for tests.
fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        connect_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_secs(5),
        channel_capacity: 64,
        reconnect: ReconnectConfig {
            max_retries: 0,
            retry_delay: Duration::from_millis(50),
        },
    }
}

/// Mock server echoing `{"id": N, "result": {}}` for every command.
async fn start_echo_server() -> (SocketAddr, JoinHandle<()>) {
    start_custom_server(|_| json!({})).await
}

/// Mock server answering every command with `result_fn(&command)`.
async fn start_custom_server(result_fn: fn(&Value) -> Value) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(Message::Text(text))) = source.next().await {
                    let cmd: Value = serde_json::from_str(&text).unwrap();
                    let response = json!({"id": cmd["id"], "result": result_fn(&cmd)});
                    sink.send(Message::Text(response.to_string().into()))
                        .await
                        .unwrap();
                }
            });
        }
    });
    (addr, handle)
}

/// Mock server that accepts commands but never replies.
async fn start_silent_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (_sink, mut source) = ws.split();
                while source.next().await.is_some() {}
            });
        }
    });
    (addr, handle)
}

/// Mock server answering every command with a protocol error.
async fn start_protocol_error_server(code: i64, message: &str) -> (SocketAddr, JoinHandle<()>) {
    let message = message.to_owned();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let message = message.clone();
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(Message::Text(text))) = source.next().await {
                    let cmd: Value = serde_json::from_str(&text).unwrap();
                    let response = json!({
                        "id": cmd["id"],
                        "error": {"code": code, "message": message},
                    });
                    sink.send(Message::Text(response.to_string().into()))
                        .await
                        .unwrap();
                }
            });
        }
    });
    (addr, handle)
}

/// Mock server that answers the first two commands in reverse order.
async fn start_reordering_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            let mut held: Vec<Value> = Vec::new();
            while let Some(Ok(Message::Text(text))) = source.next().await {
                let cmd: Value = serde_json::from_str(&text).unwrap();
                held.push(cmd);
                if held.len() == 2 {
                    for cmd in held.drain(..).rev() {
                        let response = json!({
                            "id": cmd["id"],
                            "result": {"method": cmd["method"]},
                        });
                        sink.send(Message::Text(response.to_string().into()))
                            .await
                            .unwrap();
                    }
                }
            }
        }
    });
    (addr, handle)
}

/// Mock server that pushes the given event frames after replying to each
/// command.
async fn start_event_server(events: Vec<Value>) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            while let Some(Ok(Message::Text(text))) = source.next().await {
                let cmd: Value = serde_json::from_str(&text).unwrap();
                let response = json!({"id": cmd["id"], "result": {}});
                sink.send(Message::Text(response.to_string().into()))
                    .await
                    .unwrap();
                for event in &events {
                    sink.send(Message::Text(event.to_string().into()))
                        .await
                        .unwrap();
                }
            }
        }
    });
    (addr, handle)
}

async fn connect(addr: SocketAddr) -> Connection {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Connection::connect(&format!("ws://{addr}"), test_config())
        .await
        .unwrap()
}

/// Poll `probe` every 10ms until it returns true or ~2s elapse.
async fn eventually(probe: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if probe() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// =============================================================================
// Command correlation
// =============================================================================

#[tokio::test]
async fn command_reply_is_correlated_by_id() {
    let (addr, server) = start_custom_server(|cmd| json!({"echo": cmd["method"]})).await;
    let conn = connect(addr).await;

    let result = conn
        .execute_command(Command::plain("Browser.getVersion"), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(result["echo"], "Browser.getVersion");

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn concurrent_commands_each_receive_their_own_reply() {
    let (addr, server) = start_reordering_server().await;
    let conn = connect(addr).await;

    let first = conn.execute_command(Command::plain("Page.enable"), None);
    let second = conn.execute_command(Command::plain("DOM.enable"), None);
    let (first, second) = tokio::join!(first, second);

    // The server replied in reverse order; each caller still got its own.
    assert_eq!(first.unwrap()["method"], "Page.enable");
    assert_eq!(second.unwrap()["method"], "DOM.enable");

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn command_params_reach_the_wire() {
    let (addr, server) = start_custom_server(|cmd| cmd["params"].clone()).await;
    let conn = connect(addr).await;

    let result = conn
        .execute_command(
            Command::new("Page.navigate", json!({"url": "https://example.com"})),
            None,
        )
        .await
        .unwrap();
    assert_eq!(result["url"], "https://example.com");

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn command_timeout_elapses_without_reply() {
    let (addr, server) = start_silent_server().await;
    let conn = connect(addr).await;

    let result = conn
        .execute_command(
            Command::plain("Browser.getVersion"),
            Some(Duration::from_millis(100)),
        )
        .await;
    assert!(matches!(
        result,
        Err(CdpError::CommandTimeout { ref method }) if method == "Browser.getVersion"
    ));

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn protocol_error_is_mirrored_with_code_and_message() {
    let (addr, server) = start_protocol_error_server(-32000, "No node with given id found").await;
    let conn = connect(addr).await;

    let result = conn
        .execute_command(Command::plain("DOM.describeNode"), None)
        .await;
    match result {
        Err(CdpError::Protocol { code, message }) => {
            assert_eq!(code, -32000);
            assert_eq!(message, "No node with given id found");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn late_replies_after_timeout_do_not_disturb_later_commands() {
    // Server delays the first reply past its deadline; the late frame has
    // an id no longer pending and must be dropped.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            let mut first = true;
            while let Some(Ok(Message::Text(text))) = source.next().await {
                let cmd: Value = serde_json::from_str(&text).unwrap();
                if first {
                    first = false;
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
                let response = json!({"id": cmd["id"], "result": {"ok": true}});
                sink.send(Message::Text(response.to_string().into()))
                    .await
                    .unwrap();
            }
        }
    });
    let conn = connect(addr).await;

    let timed_out = conn
        .execute_command(Command::plain("Page.enable"), Some(Duration::from_millis(50)))
        .await;
    assert!(matches!(timed_out, Err(CdpError::CommandTimeout { .. })));

    // The late reply for the first command arrives while this one is in
    // flight and must not be delivered to it.
    let ok = conn
        .execute_command(Command::plain("DOM.enable"), Some(Duration::from_secs(2)))
        .await
        .unwrap();
    assert_eq!(ok["ok"], true);

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    // Server prepends garbage before every reply.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            while let Some(Ok(Message::Text(text))) = source.next().await {
                let cmd: Value = serde_json::from_str(&text).unwrap();
                sink.send(Message::Text("{not json".to_string().into()))
                    .await
                    .unwrap();
                sink.send(Message::Text("{}".to_string().into())).await.unwrap();
                let response = json!({"id": cmd["id"], "result": {"ok": true}});
                sink.send(Message::Text(response.to_string().into()))
                    .await
                    .unwrap();
            }
        }
    });
    let conn = connect(addr).await;

    let result = conn
        .execute_command(Command::plain("Browser.getVersion"), None)
        .await
        .unwrap();
    assert_eq!(result["ok"], true);

    conn.close().await;
    server.abort();
}

// =============================================================================
// Event routing
// =============================================================================

#[tokio::test]
async fn temporary_callback_fires_exactly_once() {
    let events = vec![
        json!({"method": "Page.loadEventFired", "params": {"timestamp": 1.0}}),
        json!({"method": "Page.loadEventFired", "params": {"timestamp": 2.0}}),
    ];
    let (addr, server) = start_event_server(events).await;
    let conn = connect(addr).await;

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    let id = conn.register_callback(
        "Page.loadEventFired",
        move |_| {
            let hits = Arc::clone(&hits_clone);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        },
        true,
    );

    // Any command triggers the two events.
    conn.execute_command(Command::plain("Page.enable"), None)
        .await
        .unwrap();

    assert!(eventually(|| hits.load(Ordering::SeqCst) == 1).await);
    // After both events, the subscription is gone.
    assert!(!conn.remove_callback(id));

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn handlers_fire_in_registration_order() {
    let events = vec![json!({"method": "Custom.marker", "params": {}})];
    let (addr, server) = start_event_server(events).await;
    let conn = connect(addr).await;

    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    for tag in 1..=3 {
        let order = Arc::clone(&order);
        conn.register_callback(
            "Custom.marker",
            move |_| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(tag);
                }
            },
            false,
        );
    }

    conn.execute_command(Command::plain("Page.enable"), None)
        .await
        .unwrap();

    assert!(eventually(|| order.lock().unwrap().len() == 3).await);
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn removed_callback_no_longer_fires() {
    let events = vec![json!({"method": "Custom.marker", "params": {}})];
    let (addr, server) = start_event_server(events).await;
    let conn = connect(addr).await;

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    let id = conn.register_callback(
        "Custom.marker",
        move |_| {
            let hits = Arc::clone(&hits_clone);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        },
        false,
    );

    assert!(conn.remove_callback(id));
    assert!(!conn.remove_callback(id));

    conn.execute_command(Command::plain("Page.enable"), None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn clear_callbacks_empties_the_registry() {
    let (addr, server) = start_echo_server().await;
    let conn = connect(addr).await;

    let id1 = conn.register_callback("A", |_| async {}, false);
    let id2 = conn.register_callback("B", |_| async {}, false);
    conn.clear_callbacks();
    assert!(!conn.remove_callback(id1));
    assert!(!conn.remove_callback(id2));

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn network_events_are_captured_in_the_log() {
    let events = vec![
        json!({
            "method": "Network.requestWillBeSent",
            "params": {"requestId": "r1", "request": {"url": "https://example.com/a"}},
        }),
        json!({
            "method": "Network.requestWillBeSent",
            "params": {"requestId": "r2", "request": {"url": "https://example.com/b"}},
        }),
    ];
    let (addr, server) = start_event_server(events).await;
    let conn = connect(addr).await;

    conn.execute_command(Command::plain("Network.enable"), None)
        .await
        .unwrap();

    assert!(eventually(|| conn.network_logs().len() == 2).await);
    let logs = conn.network_logs();
    assert_eq!(logs[0].params["requestId"], "r1");
    assert_eq!(logs[1].params["requestId"], "r2");

    conn.close().await;
    server.abort();
}

#[tokio::test]
async fn dialog_slot_follows_opening_and_closing_events() {
    let events = vec![json!({
        "method": "Page.javascriptDialogOpening",
        "params": {"message": "proceed?", "type": "confirm"},
    })];
    let (addr, server) = start_event_server(events).await;
    let conn = connect(addr).await;

    assert!(conn.current_dialog().is_none());
    conn.execute_command(Command::plain("Page.enable"), None)
        .await
        .unwrap();

    assert!(eventually(|| conn.current_dialog().is_some()).await);
    let dialog = conn.current_dialog().unwrap();
    assert_eq!(dialog.params["message"], "proceed?");

    conn.close().await;
    server.abort();
}

// =============================================================================
// Liveness and shutdown
// =============================================================================

#[tokio::test]
async fn ping_reports_liveness() {
    let (addr, server) = start_echo_server().await;
    let conn = connect(addr).await;
    assert!(conn.ping().await);

    conn.close().await;
    assert!(!conn.ping().await);
    server.abort();
}

#[tokio::test]
async fn close_is_idempotent_and_fails_later_commands() {
    let (addr, server) = start_echo_server().await;
    let conn = connect(addr).await;

    conn.close().await;
    conn.close().await;

    let result = conn
        .execute_command(Command::plain("Browser.getVersion"), None)
        .await;
    assert!(matches!(result, Err(CdpError::ConnectionClosed)));
    server.abort();
}

#[tokio::test]
async fn connect_to_unreachable_endpoint_fails() {
    let result = Connection::connect("ws://127.0.0.1:9/devtools", test_config()).await;
    assert!(matches!(result, Err(CdpError::Connect(_))));
}

// =============================================================================
// Reconnection
// =============================================================================

/// Server that drops its first connection after one command without
/// replying, then serves echo on later connections.
async fn start_flaky_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        // First connection: read one frame, then drop.
        if let Ok((stream, _)) = listener.accept().await {
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (_sink, mut source) = ws.split();
            let _ = source.next().await;
            drop(source);
        }
        // Later connections: echo.
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(Message::Text(text))) = source.next().await {
                    let cmd: Value = serde_json::from_str(&text).unwrap();
                    let response = json!({"id": cmd["id"], "result": {"reconnected": true}});
                    sink.send(Message::Text(response.to_string().into()))
                        .await
                        .unwrap();
                }
            });
        }
    });
    (addr, handle)
}

#[tokio::test]
async fn pending_command_fails_when_socket_drops() {
    let (addr, server) = start_flaky_server().await;
    let config = ConnectionConfig {
        reconnect: ReconnectConfig {
            max_retries: 0,
            retry_delay: Duration::from_millis(10),
        },
        ..test_config()
    };
    let conn = Connection::connect(&format!("ws://{addr}"), config)
        .await
        .unwrap();

    let result = conn
        .execute_command(Command::plain("Page.enable"), Some(Duration::from_secs(2)))
        .await;
    assert!(matches!(result, Err(CdpError::ConnectionClosed)));

    // Retries exhausted (there were none): the connection stays dead.
    let result = conn
        .execute_command(Command::plain("Page.enable"), None)
        .await;
    assert!(matches!(result, Err(CdpError::ConnectionClosed)));
    server.abort();
}

#[tokio::test]
async fn connection_recovers_after_reconnect() {
    let (addr, server) = start_flaky_server().await;
    let config = ConnectionConfig {
        reconnect: ReconnectConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(50),
        },
        ..test_config()
    };
    let conn = Connection::connect(&format!("ws://{addr}"), config)
        .await
        .unwrap();

    // The first command is lost with the first socket.
    let lost = conn
        .execute_command(Command::plain("Page.enable"), Some(Duration::from_secs(2)))
        .await;
    assert!(matches!(lost, Err(CdpError::ConnectionClosed)));

    // After the retry delay the transport is on a fresh socket.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let result = conn
        .execute_command(Command::plain("DOM.enable"), Some(Duration::from_secs(2)))
        .await
        .unwrap();
    assert_eq!(result["reconnected"], true);

    conn.close().await;
    server.abort();
}

// =============================================================================
// Event payload integrity
// =============================================================================

#[tokio::test]
async fn handler_receives_full_event_payload() {
    let events = vec![json!({
        "method": "Custom.payload",
        "params": {"nested": {"value": 42}},
        "sessionId": "sess-9",
    })];
    let (addr, server) = start_event_server(events).await;
    let conn = connect(addr).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    conn.register_callback(
        "Custom.payload",
        move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        },
        true,
    );

    conn.execute_command(Command::plain("Page.enable"), None)
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.method, "Custom.payload");
    assert_eq!(event.params["nested"]["value"], 42);
    assert_eq!(event.session_id.as_deref(), Some("sess-9"));

    conn.close().await;
    server.abort();
}
