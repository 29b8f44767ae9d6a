//! WebSocket session client: connects to the messaging network bridge, pairs or resumes with the
//! stored device identity, delivers inbound messages, and sends text.
//!
//! Handshake: the server opens with a `connect.challenge` event carrying a nonce; the client
//! answers with a `connect` request holding either its device token (resume) or a signed
//! device identity (pairing). After the `connect` response, a reader task owns the stream and
//! routes responses to pending requests and events to the pairing stream or the handler.

use crate::channels::client::{ClientError, MessageHandler, ProtocolClient};
use crate::channels::dispatch::SenderLanes;
use crate::channels::frames::{
    Challenge, ConnectAuth, ConnectDevice, ConnectParams, Frame, MessagePayload, PairCode,
    PairSuccess, SendParams,
};
use crate::channels::inbound::{InboundMessage, PairingEvent};
use crate::device;
use crate::store::SessionStore;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const SEND_ACK_TIMEOUT: Duration = Duration::from_secs(30);
const PAIRING_BUFFER: usize = 16;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type Pending = HashMap<String, oneshot::Sender<Result<serde_json::Value, String>>>;

/// State shared between the client and its reader task.
struct Shared {
    store: Arc<SessionStore>,
    sink: Mutex<Option<WsSink>>,
    connected: watch::Sender<bool>,
    pending: Mutex<Pending>,
    pairing_tx: Mutex<Option<mpsc::Sender<PairingEvent>>>,
    lanes: RwLock<Option<Arc<SenderLanes>>>,
}

pub struct WsClient {
    url: String,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WsClient {
    pub fn new(url: impl Into<String>, store: Arc<SessionStore>) -> Self {
        Self {
            url: url.into(),
            shared: Arc::new(Shared {
                store,
                sink: Mutex::new(None),
                connected: watch::channel(false).0,
                pending: Mutex::new(HashMap::new()),
                pairing_tx: Mutex::new(None),
                lanes: RwLock::new(None),
            }),
            reader: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// Build connect params: device token when paired, otherwise a signed device identity.
    async fn connect_params(&self, nonce: &str) -> Result<ConnectParams, ClientError> {
        if let Some(device_token) = self.shared.store.device_token().await {
            return Ok(ConnectParams {
                auth: Some(ConnectAuth { device_token }),
                device: None,
            });
        }
        let identity = self.shared.store.identity_or_generate().await?;
        let signed_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let payload = device::pairing_payload(&identity.device_id, nonce, signed_at);
        let signature = identity
            .sign(&payload)
            .map_err(|e| ClientError::Connect(format!("signing pairing payload: {}", e)))?;
        Ok(ConnectParams {
            auth: None,
            device: Some(ConnectDevice {
                id: identity.device_id,
                public_key: identity.public_key,
                signature,
                signed_at,
                nonce: nonce.to_string(),
            }),
        })
    }

    async fn handshake(&self, sink: &mut WsSink, stream: &mut WsSource) -> Result<(), ClientError> {
        let nonce = match next_frame(stream).await? {
            Frame::Event { event, payload } if event == "connect.challenge" => {
                serde_json::from_value::<Challenge>(payload)
                    .map_err(|e| ClientError::Connect(format!("malformed challenge: {}", e)))?
                    .nonce
            }
            other => {
                return Err(ClientError::Connect(format!(
                    "expected connect.challenge, got {:?}",
                    other
                )))
            }
        };
        let params = self.connect_params(&nonce).await?;
        let params = serde_json::to_value(params)
            .map_err(|e| ClientError::Connect(format!("encoding connect params: {}", e)))?;
        let (id, req) = Frame::request("connect", params);
        send_frame(sink, &req)
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        loop {
            match next_frame(stream).await? {
                Frame::Res {
                    id: res_id,
                    ok,
                    payload,
                    error,
                } if res_id == id => {
                    if !ok {
                        return Err(ClientError::Rejected(
                            error.unwrap_or_else(|| "connect failed".to_string()),
                        ));
                    }
                    let token = payload
                        .as_ref()
                        .and_then(|p| p.get("deviceToken"))
                        .and_then(|v| v.as_str());
                    if let Some(token) = token {
                        self.shared.store.set_device_token(token).await?;
                    }
                    return Ok(());
                }
                other => self.shared.handle_frame(other).await,
            }
        }
    }
}

/// Read frames until a text frame arrives; used only during the handshake.
async fn next_frame(stream: &mut WsSource) -> Result<Frame, ClientError> {
    while let Some(msg) = stream.next().await {
        match msg.map_err(|e| ClientError::Connect(e.to_string()))? {
            Message::Text(text) => {
                return serde_json::from_str(&text)
                    .map_err(|e| ClientError::Connect(format!("malformed frame: {}", e)))
            }
            Message::Close(_) => break,
            _ => continue,
        }
    }
    Err(ClientError::Connect(
        "connection closed during handshake".to_string(),
    ))
}

async fn send_frame(sink: &mut WsSink, frame: &Frame) -> Result<(), ClientError> {
    let text = serde_json::to_string(frame).map_err(|e| ClientError::Send(e.to_string()))?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| ClientError::Send(e.to_string()))
}

impl Shared {
    async fn handle_frame(&self, frame: Frame) {
        match frame {
            Frame::Res {
                id,
                ok,
                payload,
                error,
            } => {
                let waiter = self.pending.lock().await.remove(&id);
                match waiter {
                    Some(tx) => {
                        let result = if ok {
                            Ok(payload.unwrap_or(serde_json::Value::Null))
                        } else {
                            Err(error.unwrap_or_else(|| "request failed".to_string()))
                        };
                        let _ = tx.send(result);
                    }
                    None => log::debug!("network: response for unknown request {}", id),
                }
            }
            Frame::Event { event, payload } => self.handle_event(&event, payload).await,
            Frame::Req { method, .. } => {
                log::debug!("network: ignoring server request {}", method);
            }
        }
    }

    async fn handle_event(&self, event: &str, payload: serde_json::Value) {
        match event {
            "message" => {
                let msg: MessagePayload = match serde_json::from_value(payload) {
                    Ok(m) => m,
                    Err(e) => {
                        log::debug!("network: malformed message event: {}", e);
                        return;
                    }
                };
                let lanes = self.lanes.read().await.clone();
                match lanes {
                    Some(lanes) => {
                        lanes
                            .dispatch(InboundMessage {
                                sender: msg.sender,
                                text: msg.text,
                                from_me: msg.from_me,
                            })
                            .await
                    }
                    None => log::debug!("network: no handler subscribed, dropping message"),
                }
            }
            "pair.code" => match serde_json::from_value::<PairCode>(payload) {
                Ok(p) => self.emit_pairing(PairingEvent::Code(p.code)).await,
                Err(e) => log::debug!("network: malformed pair.code event: {}", e),
            },
            "pair.success" => {
                match serde_json::from_value::<PairSuccess>(payload) {
                    Ok(p) => {
                        if let Err(e) = self.store.set_device_token(&p.device_token).await {
                            log::error!("pairing succeeded but saving the device token failed: {}", e);
                        }
                    }
                    Err(e) => log::warn!("network: pair.success without device token: {}", e),
                }
                self.emit_pairing(PairingEvent::Other("success".to_string()))
                    .await;
                self.pairing_tx.lock().await.take();
            }
            other if other.starts_with("pair.") => {
                let name = other.trim_start_matches("pair.").to_string();
                let terminal = matches!(name.as_str(), "timeout" | "error");
                self.emit_pairing(PairingEvent::Other(name)).await;
                if terminal {
                    self.pairing_tx.lock().await.take();
                }
            }
            other => log::debug!("network: ignoring event {}", other),
        }
    }

    async fn emit_pairing(&self, event: PairingEvent) {
        let tx = self.pairing_tx.lock().await.clone();
        match tx {
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    log::debug!("network: pairing stream receiver dropped");
                }
            }
            None => log::debug!("network: pairing event with no pairing stream: {:?}", event),
        }
    }

    /// Connection gone: end the pairing stream and fail every waiting request.
    async fn close(&self) {
        self.pairing_tx.lock().await.take();
        let pending = std::mem::take(&mut *self.pending.lock().await);
        for (_, tx) in pending {
            let _ = tx.send(Err("connection closed".to_string()));
        }
    }
}

async fn read_loop(mut stream: WsSource, shared: Arc<Shared>) {
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("network: connection error: {}", e);
                break;
            }
        };
        match serde_json::from_str::<Frame>(&text) {
            Ok(frame) => shared.handle_frame(frame).await,
            Err(e) => log::debug!("network: ignoring malformed frame: {}", e),
        }
    }
    // sink goes before the state flips, so a reconnect finds the slot empty
    shared.sink.lock().await.take();
    shared.close().await;
    if shared.connected.send_replace(false) {
        log::warn!("network closed the session");
    }
}

#[async_trait]
impl ProtocolClient for WsClient {
    async fn has_identity(&self) -> Result<bool, ClientError> {
        Ok(self.shared.store.has_identity().await)
    }

    async fn pairing_events(&self) -> Result<mpsc::Receiver<PairingEvent>, ClientError> {
        let (tx, rx) = mpsc::channel(PAIRING_BUFFER);
        *self.shared.pairing_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn connect(&self) -> Result<(), ClientError> {
        if self.is_connected() {
            log::debug!("network: already connected");
            return Ok(());
        }
        log::info!("connecting to {}", self.url);
        let (ws, _) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();
        tokio::time::timeout(HANDSHAKE_TIMEOUT, self.handshake(&mut sink, &mut stream))
            .await
            .map_err(|_| ClientError::Connect("handshake timed out".to_string()))??;
        *self.shared.sink.lock().await = Some(sink);
        self.shared.connected.send_replace(true);
        let handle = tokio::spawn(read_loop(stream, self.shared.clone()));
        *self.reader.lock().await = Some(handle);
        log::info!("connected to {}", self.url);
        Ok(())
    }

    async fn disconnect(&self) {
        let was_connected = self.shared.connected.send_replace(false);
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        if let Some(mut sink) = self.shared.sink.lock().await.take() {
            if let Err(e) = sink.close().await {
                log::debug!("network: close failed: {}", e);
            }
        }
        self.shared.close().await;
        // drops the handler, which holds a reference back to this client
        self.shared.lanes.write().await.take();
        if was_connected {
            log::info!("disconnected from {}", self.url);
        }
    }

    async fn closed(&self) {
        let mut rx = self.shared.connected.subscribe();
        loop {
            let up = *rx.borrow_and_update();
            if !up || rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ClientError> {
        let params = serde_json::to_value(SendParams {
            to: recipient.to_string(),
            text: text.to_string(),
        })
        .map_err(|e| ClientError::Send(e.to_string()))?;
        let (id, req) = Frame::request("send", params);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id.clone(), tx);
        let sent = {
            let mut sink = self.shared.sink.lock().await;
            match sink.as_mut() {
                Some(sink) => send_frame(sink, &req).await,
                None => Err(ClientError::NotConnected),
            }
        };
        if let Err(e) = sent {
            self.shared.pending.lock().await.remove(&id);
            return Err(e);
        }
        match tokio::time::timeout(SEND_ACK_TIMEOUT, rx).await {
            Ok(Ok(Ok(_))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ClientError::Send(e)),
            Ok(Err(_)) => Err(ClientError::Send(
                "connection closed before acknowledgement".to_string(),
            )),
            Err(_) => {
                self.shared.pending.lock().await.remove(&id);
                Err(ClientError::Send(
                    "timed out waiting for acknowledgement".to_string(),
                ))
            }
        }
    }

    async fn subscribe(&self, handler: Arc<dyn MessageHandler>) {
        *self.shared.lanes.write().await = Some(Arc::new(SenderLanes::new(handler)));
    }
}
