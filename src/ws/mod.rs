//! The WebSocket session (C3): connect, authenticate private channels,
//! heartbeat, subscribe/unsubscribe, and dispatch parsed frames by channel
//! tag. Generalizes `nord::ws::NordWebSocketClient`'s single-task-per-connection
//! design from dispatch-by-top-level-JSON-key to OKX's
//! `{"arg":{"channel":...},"data":[...]}` envelope.

pub mod events;
pub mod subscriber;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::OkxConfig;
use crate::error::{OkxError, Result};
use events::{WsArg, WsEvent};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_HEARTBEATS: u32 = 3;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A handler invoked for every data push arriving on a given channel. The
/// handler receives the routing arg and the raw per-element JSON value; it
/// is expected to decode and forward it into a bounded queue itself so the
/// dispatcher never blocks.
pub type ChannelHandler = Arc<dyn Fn(WsArg, Value) + Send + Sync>;

#[derive(Clone, PartialEq, Eq, Hash)]
struct SubKey {
    channel: String,
    inst_id: Option<String>,
}

/// One connection to a single OKX endpoint group (public / private /
/// business).
pub struct Session {
    url: String,
    credentials: Option<OkxConfig>,
    handlers: Arc<RwLock<HashMap<String, ChannelHandler>>>,
    live_subscriptions: Arc<Mutex<HashSet<SubKey>>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Session {
    /// A public-endpoint session.
    pub fn public(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            live_subscriptions: Arc::new(Mutex::new(HashSet::new())),
            outbound: None,
            shutdown: None,
        }
    }

    /// A private-endpoint session: login is sent immediately after
    /// connect, and no subscribe is issued until it succeeds.
    pub fn private(url: impl Into<String>, credentials: OkxConfig) -> Self {
        Self {
            url: url.into(),
            credentials: Some(credentials),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            live_subscriptions: Arc::new(Mutex::new(HashSet::new())),
            outbound: None,
            shutdown: None,
        }
    }

    /// Registers a handler for all data pushes tagged with `channel`.
    /// Replaces any handler previously registered for the same channel.
    pub fn on_channel(&self, channel: impl Into<String>, handler: ChannelHandler) {
        self.handlers.write().unwrap().insert(channel.into(), handler);
    }

    /// Connects and spawns the background dispatch task. Reconnects with
    /// exponential backoff (capped at 30s) on any connection error,
    /// re-issuing every live subscription after a successful reconnect.
    pub fn connect(&mut self) {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        self.shutdown = Some(shutdown_tx);
        self.outbound = Some(outbound_tx.clone());

        let url = self.url.clone();
        let credentials = self.credentials.clone();
        let handlers = self.handlers.clone();
        let live_subscriptions = self.live_subscriptions.clone();

        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("websocket session shutting down");
                        return;
                    }
                    result = run_connection(&url, credentials.as_ref(), &handlers, &live_subscriptions, &mut outbound_rx) => {
                        match result {
                            Ok(()) => return,
                            Err(err) => {
                                warn!(%err, backoff_secs = backoff.as_secs(), "websocket session dropped, reconnecting");
                                tokio::time::sleep(backoff).await;
                                backoff = (backoff * 2).min(MAX_BACKOFF);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Subscribes to `channel` (optionally scoped to `inst_id`) and
    /// remembers it for replay on reconnect.
    pub fn subscribe(&self, channel: &str, inst_id: Option<&str>) -> Result<()> {
        self.live_subscriptions.lock().unwrap().insert(SubKey {
            channel: channel.to_string(),
            inst_id: inst_id.map(str::to_string),
        });
        self.send_sub_frame("subscribe", channel, inst_id)
    }

    pub fn unsubscribe(&self, channel: &str, inst_id: Option<&str>) -> Result<()> {
        self.live_subscriptions.lock().unwrap().remove(&SubKey {
            channel: channel.to_string(),
            inst_id: inst_id.map(str::to_string),
        });
        self.send_sub_frame("unsubscribe", channel, inst_id)
    }

    fn send_sub_frame(&self, op: &str, channel: &str, inst_id: Option<&str>) -> Result<()> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| OkxError::WebSocket("session not connected".into()))?;
        let mut arg = serde_json::json!({ "channel": channel });
        if let Some(inst_id) = inst_id {
            arg["instId"] = serde_json::Value::String(inst_id.to_string());
        }
        let frame = serde_json::json!({ "op": op, "args": [arg] }).to_string();
        tx.send(frame)
            .map_err(|_| OkxError::WebSocket("session outbound channel closed".into()))
    }

    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn run_connection(
    url: &str,
    credentials: Option<&OkxConfig>,
    handlers: &Arc<RwLock<HashMap<String, ChannelHandler>>>,
    live_subscriptions: &Arc<Mutex<HashSet<SubKey>>>,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let (ws_stream, _) = tokio::time::timeout(Duration::from_secs(10), tokio_tungstenite::connect_async(url))
        .await
        .map_err(|_| OkxError::Timeout(Duration::from_secs(10)))?
        .map_err(|e| OkxError::WebSocket(format!("connect failed: {e}")))?;
    info!(url, "websocket connected");
    let (mut write, mut read) = ws_stream.split();

    if let Some(config) = credentials {
        let (timestamp, signature) = crate::rest::signing::sign_ws_login(config);
        let login = serde_json::json!({
            "op": "login",
            "args": [{
                "apiKey": config.api_key,
                "passphrase": config.passphrase,
                "timestamp": timestamp,
                "sign": signature,
            }]
        });
        write
            .send(Message::Text(login.to_string()))
            .await
            .map_err(|e| OkxError::WebSocket(format!("login send failed: {e}")))?;

        let logged_in = wait_for_login(&mut read).await?;
        if !logged_in {
            return Err(OkxError::WebSocket("login rejected".into()));
        }
    }

    // replay every subscription this session had before the (re)connect
    for key in live_subscriptions.lock().unwrap().iter() {
        let mut arg = serde_json::json!({ "channel": key.channel });
        if let Some(inst_id) = &key.inst_id {
            arg["instId"] = serde_json::Value::String(inst_id.clone());
        }
        let frame = serde_json::json!({ "op": "subscribe", "args": [arg] }).to_string();
        write
            .send(Message::Text(frame))
            .await
            .map_err(|e| OkxError::WebSocket(format!("resubscribe failed: {e}")))?;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(frame) => {
                        write.send(Message::Text(frame)).await
                            .map_err(|e| OkxError::WebSocket(format!("send failed: {e}")))?;
                    }
                    None => return Ok(()),
                }
            }
            _ = heartbeat.tick() => {
                if missed >= MAX_MISSED_HEARTBEATS {
                    return Err(OkxError::WebSocket("missed too many heartbeats".into()));
                }
                write.send(Message::Text("ping".into())).await
                    .map_err(|e| OkxError::WebSocket(format!("ping failed: {e}")))?;
                missed += 1;
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text == "pong" {
                            missed = 0;
                            continue;
                        }
                        dispatch_frame(&text, handlers);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        missed = 0;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Err(OkxError::WebSocket("connection closed by peer".into()));
                    }
                    Some(Err(e)) => {
                        return Err(OkxError::WebSocket(format!("read error: {e}")));
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn wait_for_login<S>(read: &mut S) -> Result<bool>
where
    S: futures_util::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return Err(OkxError::Timeout(Duration::from_secs(10))),
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(event) = serde_json::from_str::<WsEvent>(&text) {
                        if event.event == "login" {
                            return Ok(event.is_login_success());
                        }
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(OkxError::WebSocket(format!("read error during login: {e}"))),
                None => return Err(OkxError::WebSocket("connection closed during login".into())),
            }
        }
    }
}

/// Parses one text frame and routes it to the handler registered for its
/// channel. Event-type frames ({"event": ...}) and unrecognized/unparseable
/// frames are dropped (the latter at `debug`, matching the tolerant
/// `dispatch_message` pattern in `nord::ws`).
fn dispatch_frame(text: &str, handlers: &Arc<RwLock<HashMap<String, ChannelHandler>>>) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(%e, frame = text, "unparseable websocket frame");
            return;
        }
    };

    if value.get("event").is_some() {
        debug!(frame = text, "websocket event frame");
        return;
    }

    let Some(arg_value) = value.get("arg") else {
        debug!(frame = text, "websocket frame missing arg, dropped");
        return;
    };
    let mut arg: WsArg = match serde_json::from_value(arg_value.clone()) {
        Ok(a) => a,
        Err(_) => return,
    };
    arg.action = value
        .get("action")
        .and_then(|a| serde_json::from_value(a.clone()).ok());
    let Some(data) = value.get("data").and_then(Value::as_array) else {
        return;
    };

    let handler = handlers.read().unwrap().get(&arg.channel).cloned();
    let Some(handler) = handler else {
        return;
    };
    for element in data {
        handler(arg.clone(), element.clone());
    }
}
