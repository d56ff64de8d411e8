//! Mock gateway server
//!
//! Serves `GET /api/v3/gateway/index` and a WebSocket route at `/gateway`.
//! The same index path under `/api/stalled` accepts the request and never answers.
//! Every accepted socket is handed to the test as a [`ServerConnection`], which
//! sends envelopes to the client and reads what the client sent.

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use flate2::{write::ZlibEncoder, Compression};
use futures_util::{SinkExt, StreamExt};
use gamebot_gateway::protocol::{Envelope, HelloPayload, ReconnectPayload, ResumeAckPayload};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long helpers wait on the client before giving up
pub const WAIT: Duration = Duration::from_secs(10);

/// Bot token the mock expects
pub const TEST_TOKEN: &str = "test-token";

/// A recorded call to the endpoint index
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub authorization: Option<String>,
    pub compress: Option<String>,
}

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    connections: mpsc::UnboundedSender<ServerConnection>,
    index_requests: Arc<Mutex<Vec<IndexRequest>>>,
    index_failures: Arc<AtomicU32>,
}

/// In-process gateway for end-to-end tests
pub struct MockGateway {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    index_requests: Arc<Mutex<Vec<IndexRequest>>>,
    index_failures: Arc<AtomicU32>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Bind to an ephemeral port and start serving
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (connections_tx, connections_rx) = mpsc::unbounded_channel();
        let index_requests = Arc::new(Mutex::new(Vec::new()));
        let index_failures = Arc::new(AtomicU32::new(0));

        let state = MockState {
            addr,
            connections: connections_tx,
            index_requests: Arc::clone(&index_requests),
            index_failures: Arc::clone(&index_failures),
        };

        let app = Router::new()
            .route("/api/v3/gateway/index", get(gateway_index))
            .route("/api/stalled/gateway/index", get(stalled_index))
            .route("/gateway", get(gateway_socket))
            .with_state(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            connections: connections_rx,
            index_requests,
            index_failures,
            _handle: handle,
        })
    }

    /// Base URL for [`gamebot_gateway::HttpEndpointResolver`]
    pub fn api_base_url(&self) -> String {
        format!("http://{}/api/v3", self.addr)
    }

    /// Base URL whose index route never responds
    pub fn stalled_api_base_url(&self) -> String {
        format!("http://{}/api/stalled", self.addr)
    }

    /// WebSocket endpoint URL
    pub fn ws_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Make the next `count` index calls answer with an error code
    pub fn fail_index_requests(&self, count: u32) {
        self.index_failures.store(count, Ordering::SeqCst);
    }

    /// Index calls received so far
    pub fn index_requests(&self) -> Vec<IndexRequest> {
        self.index_requests.lock().clone()
    }

    /// Wait for the client to open a socket
    pub async fn accept(&mut self) -> ServerConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("mock gateway stopped")
    }

    /// Accept a socket and complete the handshake with `session_id`
    pub async fn accept_hello(&mut self, session_id: &str) -> ServerConnection {
        let connection = self.accept().await;
        connection.hello(session_id);
        connection
    }
}

/// Server side of one accepted socket
///
/// Dropping it closes the socket.
pub struct ServerConnection {
    /// Query parameters the client connected with
    pub query: HashMap<String, String>,
    outbound: mpsc::UnboundedSender<Message>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
}

impl ServerConnection {
    /// Check if the client asked to resume
    pub fn is_resume(&self) -> bool {
        self.query.get("resume").map(String::as_str) == Some("1")
    }

    /// Send an envelope as a text frame
    pub fn send(&self, envelope: &Envelope) {
        let json = envelope.to_json().expect("envelope serializes");
        let _ = self.outbound.send(Message::Text(json.into()));
    }

    /// Send an envelope as a zlib-compressed binary frame
    pub fn send_compressed(&self, envelope: &Envelope) {
        let json = envelope.to_json().expect("envelope serializes");
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(json.as_bytes()).expect("deflate");
        let bytes = encoder.finish().expect("deflate");
        let _ = self.outbound.send(Message::Binary(bytes.into()));
    }

    pub fn hello(&self, session_id: &str) {
        self.send(&Envelope::hello(&HelloPayload::success(session_id)));
    }

    pub fn reject(&self, code: i64) {
        self.send(&Envelope::hello(&HelloPayload::rejected(code)));
    }

    pub fn event(&self, sn: u64, content: &str) {
        self.send(&text_event(sn, content));
    }

    pub fn pong(&self) {
        self.send(&Envelope::pong());
    }

    pub fn reconnect(&self, code: i64, err: &str) {
        self.send(&Envelope::reconnect(&ReconnectPayload {
            code,
            err: err.to_string(),
        }));
    }

    pub fn resume_ack(&self, session_id: &str) {
        self.send(&Envelope::resume_ack(&ResumeAckPayload {
            session_id: Some(session_id.to_string()),
        }));
    }

    /// Next envelope from the client; `None` once the socket closed
    pub async fn recv(&mut self) -> Option<Envelope> {
        tokio::time::timeout(WAIT, self.inbound.recv())
            .await
            .expect("timed out waiting for a client frame")
    }
}

/// A message event (type 1) in channel `1000`
pub fn text_event(sn: u64, content: &str) -> Envelope {
    Envelope::event(
        sn,
        json!({
            "channel_type": "GROUP",
            "type": 1,
            "target_id": "1000",
            "author_id": "2000",
            "content": content,
            "msg_id": uuid::Uuid::new_v4().to_string(),
            "extra": {}
        }),
    )
}

async fn gateway_index(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    state.index_requests.lock().push(IndexRequest {
        authorization: authorization.clone(),
        compress: query.get("compress").cloned(),
    });

    let failing = state
        .index_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return Json(json!({ "code": 50000, "message": "gateway index unavailable", "data": {} }));
    }

    let expected = format!("Bot {TEST_TOKEN}");
    if authorization.as_deref() != Some(expected.as_str()) {
        return Json(json!({ "code": 40100, "message": "invalid token", "data": {} }));
    }

    Json(json!({
        "code": 0,
        "message": "",
        "data": { "url": format!("ws://{}/gateway", state.addr) }
    }))
}

async fn stalled_index() -> Json<Value> {
    std::future::pending().await
}

async fn gateway_socket(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, query, state.connections))
}

async fn serve_socket(
    socket: WebSocket,
    query: HashMap<String, String>,
    connections: mpsc::UnboundedSender<ServerConnection>,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Envelope>();

    let connection = ServerConnection {
        query,
        outbound: out_tx,
        inbound: in_rx,
    };
    if connections.send(connection).is_err() {
        return;
    }

    loop {
        tokio::select! {
            message = out_rx.recv() => match message {
                Some(message) => {
                    if ws_sink.send(message).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
            },
            message = ws_stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(envelope) = Envelope::from_json(&text) {
                        let _ = in_tx.send(envelope);
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
