//! Test utilities and common fixtures for pixelwar integration tests.

#![allow(dead_code)]

use ed25519_dalek::{Signer, SigningKey};
use futures::{SinkExt, StreamExt};
use pixelwar::auth::{Credentials, Ed25519Verifier};
use pixelwar::server::{self, AppState};
use pixelwar::store::MemoryStore;
use pixelwar::ServerConfig;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Default timeout for test operations.
pub const TEST_TIMEOUT_MS: u64 = 5000;

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Setup tracing for tests.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,pixelwar=debug")
        .try_init();
}

/// A wallet with a real ed25519 key.
pub struct TestWallet {
    key: SigningKey,
    pub address: String,
}

impl TestWallet {
    pub fn new(seed: u8) -> Self {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let address = bs58::encode(key.verifying_key().as_bytes()).into_string();
        Self { key, address }
    }

    pub fn sign(&self, message: &str) -> String {
        bs58::encode(self.key.sign(message.as_bytes()).to_bytes()).into_string()
    }

    pub fn creds(&self, message: &str) -> Credentials {
        Credentials::new(self.address.clone(), self.sign(message), message)
    }

    /// `walletAddress`, `signature` and `message` fields, merged into `extra`.
    pub fn signed_body(&self, message: &str, mut extra: Value) -> Value {
        if let Value::Object(map) = &mut extra {
            map.insert("walletAddress".into(), Value::String(self.address.clone()));
            map.insert("signature".into(), Value::String(self.sign(message)));
            map.insert("message".into(), Value::String(message.into()));
        }
        extra
    }
}

/// A running server on an ephemeral port backed by a [`MemoryStore`].
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(Arc::new(MemoryStore::new()), ServerConfig::default()).await
    }

    pub async fn start_with(store: Arc<MemoryStore>, config: ServerConfig) -> Self {
        init_test_tracing();
        let state = AppState::build(store.clone(), Arc::new(Ed25519Verifier), config)
            .await
            .expect("engine start");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let (tx, rx) = oneshot::channel::<()>();
        let serve_state = state.clone();
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.await;
            };
            if let Err(e) = server::serve(listener, serve_state, shutdown).await {
                tracing::error!("test server failed: {}", e);
            }
        });

        Self {
            addr,
            store,
            state,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> TestSocket {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", self.addr))
            .await
            .expect("ws connect");
        ws
    }

    /// Trigger graceful shutdown and wait for the flush to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_millis(TEST_TIMEOUT_MS), &mut self.handle).await;
    }
}

/// Send a `{"event", "data"}` frame.
pub async fn send_event(ws: &mut TestSocket, event: &str, data: Value) {
    let frame = serde_json::json!({ "event": event, "data": data });
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("ws send");
}

/// Send a raw text frame.
pub async fn send_raw(ws: &mut TestSocket, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("ws send");
}

/// Next JSON event frame, skipping control frames. Panics on timeout.
pub async fn next_event(ws: &mut TestSocket) -> Value {
    let deadline = Duration::from_millis(TEST_TIMEOUT_MS);
    tokio::time::timeout(deadline, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<Value>(text.as_str()).expect("json frame");
                }
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Read frames until one named `event` arrives.
pub async fn next_named(ws: &mut TestSocket, event: &str) -> Value {
    loop {
        let frame = next_event(ws).await;
        if frame["event"] == event {
            return frame;
        }
    }
}

/// Wait for a condition to become true, with timeout.
pub async fn wait_for_condition<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let duration = Duration::from_millis(timeout_ms);
    let check_interval = Duration::from_millis(10);

    while start.elapsed() < duration {
        if condition() {
            return true;
        }
        tokio::time::sleep(check_interval).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_condition() {
        let mut counter = 0u32;
        let result = wait_for_condition(1000, || {
            counter += 1;
            counter >= 5
        })
        .await;
        assert!(result);
    }

    #[tokio::test]
    async fn test_wait_for_condition_timeout() {
        assert!(!wait_for_condition(50, || false).await);
    }
}
