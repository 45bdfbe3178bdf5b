//! CDP (Chrome DevTools Protocol) transport over a WebSocket.
//!
//! One connection is multiplexed between every caller: commands carry
//! auto-incrementing ids and a background reader routes each response back
//! to the task awaiting that id. Messages without an id are events and go
//! to a single event channel, which the page adapter consumes for lifecycle
//! notifications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::BrowserError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

/// Fallback per-command timeout when none is configured.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// A CDP event received from the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// The event method name (e.g. "Runtime.executionContextsCleared").
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, serde::Serialize)]
struct CdpCommand<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

/// A CDP response from the browser.
#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpResponseError>,
}

/// Error object in a CDP response.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CdpResponseError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

impl From<CdpResponseError> for BrowserError {
    fn from(err: CdpResponseError) -> Self {
        BrowserError::CdpError {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

/// Anything that can carry a CDP command and return its result.
///
/// [`CdpClient`] is the production implementation; the page adapter only
/// depends on this trait.
#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn send_command(&self, method: &str, params: Value) -> Result<Value, BrowserError>;
}

/// WebSocket client for one DevTools target.
pub struct CdpClient {
    next_id: AtomicU64,
    pending: PendingMap,
    writer: Mutex<WsSink>,
    event_rx: Option<mpsc::UnboundedReceiver<CdpEvent>>,
    command_timeout: Duration,
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a DevTools WebSocket endpoint of the form
    /// `ws://localhost:{port}/devtools/page/{target_id}`.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        tracing::info!(url = ws_url, "connecting to Chrome DevTools WebSocket");

        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            })?;

        let (writer, reader) = ws_stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader_pending = Arc::clone(&pending);
        let reader_handle = tokio::spawn(async move {
            Self::read_loop(reader, reader_pending, event_tx).await;
        });

        tracing::info!(url = ws_url, "CDP WebSocket connection established");

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            event_rx: Some(event_rx),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            _reader_handle: reader_handle,
        })
    }

    /// Override the timeout applied by [`CdpTransport::send_command`].
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Take the event stream. Only the first caller gets it.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<CdpEvent>> {
        self.event_rx.take()
    }

    /// Send a CDP command with an explicit timeout.
    pub async fn send_command_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpCommand { id, method, params }).map_err(|e| {
            BrowserError::Protocol {
                detail: format!("failed to serialize command: {e}"),
            }
        })?;

        tracing::debug!(id = id, method = method, "sending CDP command");

        // Register before sending so a fast response cannot be missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let sent = self.writer.lock().await.send(Message::Text(json.into())).await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(BrowserError::Protocol {
                detail: format!("failed to send WebSocket message: {e}"),
            });
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(BrowserError::Protocol {
                    detail: "response channel closed unexpectedly".to_string(),
                })
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(BrowserError::Timeout {
                    method: method.to_string(),
                    duration: timeout,
                });
            }
        };

        if let Some(err) = response.error {
            return Err(err.into());
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Enable a CDP domain (e.g. "Page", "DOM", "Runtime").
    pub async fn enable_domain(&self, domain: &str) -> Result<(), BrowserError> {
        let method = format!("{domain}.enable");
        self.send_command(&method, serde_json::json!({})).await?;
        Ok(())
    }

    async fn read_loop(
        mut reader: SplitStream<WsStream>,
        pending: PendingMap,
        event_tx: mpsc::UnboundedSender<CdpEvent>,
    ) {
        while let Some(msg_result) = reader.next().await {
            let msg = match msg_result {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket read error, stopping reader");
                    break;
                }
            };

            let text = match msg {
                Message::Text(t) => t.to_string(),
                Message::Binary(b) => match String::from_utf8(b.to_vec()) {
                    Ok(s) => s,
                    Err(_) => continue,
                },
                Message::Close(_) => {
                    tracing::info!("WebSocket closed by remote");
                    break;
                }
                _ => continue,
            };

            let json: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse CDP message as JSON");
                    continue;
                }
            };

            route_message(&json, &pending, &event_tx).await;
        }

        fail_pending(&pending, "WebSocket connection closed").await;
    }
}

#[async_trait]
impl CdpTransport for CdpClient {
    async fn send_command(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.send_command_with_timeout(method, params, self.command_timeout)
            .await
    }
}

/// Deliver one decoded message: responses to their waiter, events to the
/// event channel. Returns `false` if the message was neither.
async fn route_message(
    json: &Value,
    pending: &PendingMap,
    event_tx: &mpsc::UnboundedSender<CdpEvent>,
) -> bool {
    if let Some(response) = parse_cdp_response(json) {
        let waiter = pending.lock().await.remove(&response.id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::debug!(id = response.id, "received response for unknown command ID"),
        }
        return true;
    }
    if let Some(event) = parse_cdp_event(json) {
        // Nobody listening is fine.
        let _ = event_tx.send(event);
        return true;
    }
    false
}

/// Fail every in-flight command, e.g. when the connection drops.
async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut guard = pending.lock().await;
    for (id, tx) in guard.drain() {
        let _ = tx.send(CdpResponse {
            id,
            result: None,
            error: Some(CdpResponseError {
                code: -1,
                message: reason.to_string(),
                data: None,
            }),
        });
    }
}

/// Build a CDP JSON-RPC message.
pub fn build_cdp_message(id: u64, method: &str, params: Value) -> Value {
    serde_json::json!({
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Parse a CDP response (a message carrying an `id`).
pub fn parse_cdp_response(json: &Value) -> Option<CdpResponse> {
    let id = json.get("id")?.as_u64()?;
    Some(CdpResponse {
        id,
        result: json.get("result").cloned(),
        error: json
            .get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok()),
    })
}

/// Parse a CDP event (a message with `method` and no `id`).
pub fn parse_cdp_event(json: &Value) -> Option<CdpEvent> {
    if json.get("id").is_some() {
        return None;
    }
    let method = json.get("method")?.as_str()?.to_string();
    let params = json.get("params").cloned().unwrap_or(Value::Null);
    Some(CdpEvent { method, params })
}
