//! Shared test helpers: a recording protocol client and a local webhook server.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use bridge::channels::{ClientError, MessageHandler, PairingEvent, ProtocolClient};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Protocol client double: records calls and sends, scripts pairing.
#[derive(Default)]
pub struct MockClient {
    identity: AtomicBool,
    /// Codes streamed by `pairing_events`, followed by a "success" event.
    pairing_codes: Vec<String>,
    /// Whether finishing the pairing stream creates an identity.
    pairing_succeeds: bool,
    fail_connect: bool,
    fail_sends: bool,
    /// How many times `closed` resolves, as if the network dropped the session.
    drops: AtomicUsize,
    calls: Mutex<Vec<&'static str>>,
    sent: Mutex<Vec<(String, String)>>,
    disconnects: AtomicUsize,
    handler: Mutex<Option<Arc<dyn MessageHandler>>>,
}

impl MockClient {
    pub fn paired() -> Self {
        let client = Self::default();
        client.identity.store(true, Ordering::SeqCst);
        client
    }

    pub fn unpaired(codes: &[&str], pairing_succeeds: bool) -> Self {
        Self {
            pairing_codes: codes.iter().map(|c| c.to_string()).collect(),
            pairing_succeeds,
            ..Self::default()
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn losing_connection(self, times: usize) -> Self {
        self.drops.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    async fn has_identity(&self) -> Result<bool, ClientError> {
        self.record("has_identity");
        Ok(self.identity.load(Ordering::SeqCst))
    }

    async fn pairing_events(&self) -> Result<mpsc::Receiver<PairingEvent>, ClientError> {
        self.record("pairing_events");
        let (tx, rx) = mpsc::channel(self.pairing_codes.len() + 1);
        for code in &self.pairing_codes {
            tx.try_send(PairingEvent::Code(code.clone())).unwrap();
        }
        if self.pairing_succeeds {
            tx.try_send(PairingEvent::Other("success".to_string())).unwrap();
            self.identity.store(true, Ordering::SeqCst);
        }
        Ok(rx)
    }

    async fn connect(&self) -> Result<(), ClientError> {
        self.record("connect");
        if self.fail_connect {
            return Err(ClientError::Connect("network unreachable".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.record("disconnect");
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn closed(&self) {
        let dropped = self
            .drops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !dropped {
            std::future::pending::<()>().await;
        }
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ClientError> {
        self.record("send_text");
        if self.fail_sends {
            return Err(ClientError::Send("recipient unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }

    async fn subscribe(&self, handler: Arc<dyn MessageHandler>) {
        self.record("subscribe");
        *self.handler.lock().unwrap() = Some(handler);
    }
}

/// One request as seen by the fake webhook.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

struct HookState {
    status: StatusCode,
    body: String,
    delay: Duration,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Local webhook answering every POST with a fixed status and body.
pub struct FakeWebhook {
    pub url: String,
    state: Arc<HookState>,
}

impl FakeWebhook {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn hook(
    State(state): State<Arc<HookState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
    state
        .requests
        .lock()
        .unwrap()
        .push(RecordedRequest { content_type, body });
    tokio::time::sleep(state.delay).await;
    (state.status, state.body.clone())
}

pub async fn spawn_webhook(status: u16, body: &str) -> FakeWebhook {
    spawn_slow_webhook(status, body, Duration::ZERO).await
}

pub async fn spawn_slow_webhook(status: u16, body: &str, delay: Duration) -> FakeWebhook {
    let state = Arc::new(HookState {
        status: StatusCode::from_u16(status).expect("valid status"),
        body: body.to_string(),
        delay,
        requests: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/hook", post(hook))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind webhook");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    FakeWebhook {
        url: format!("http://{}/hook", addr),
        state,
    }
}

/// URL on a port nothing listens on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let port = listener.local_addr().expect("local_addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}/hook", port)
}

pub fn temp_store_path() -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("msgbridge-test-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}
