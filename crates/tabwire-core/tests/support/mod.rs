//! In-memory browser for connection and session tests.
//!
//! Every socket opened through [`FakeClient`] is a pair of unbounded channels.
//! The browser side of each socket is handed to the test as a [`FakeSocket`].

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tabwire_core::{CdpError, Connection, HttpClient, HttpResponse, Socket};
use tokio::task::JoinHandle;
use url::Url;

pub const WS_URL: &str = "ws://127.0.0.1:9222/devtools/browser/fake";

/// Browser end of one socket.
pub struct FakeSocket {
    /// Frames written by the connection.
    pub outbound: mpsc::UnboundedReceiver<String>,
    /// Frames delivered to the connection. Dropping it closes the socket.
    pub inbound: mpsc::UnboundedSender<Result<String, CdpError>>,
}

impl FakeSocket {
    /// Next frame written by the connection, parsed.
    pub async fn next_frame(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(5), self.outbound.next())
            .await
            .expect("no frame written within 5s")
            .expect("connection dropped its writer");
        serde_json::from_str(&text).expect("connection wrote invalid JSON")
    }

    pub fn push_text(&self, text: &str) {
        self.inbound
            .unbounded_send(Ok(text.to_string()))
            .expect("connection dropped its reader");
    }

    pub fn push(&self, frame: Value) {
        self.push_text(&frame.to_string());
    }

    pub fn reply(&self, id: u64, result: Value) {
        self.push(json!({"id": id, "result": result}));
    }

    pub fn reply_error(&self, id: u64, code: i64, message: &str) {
        self.push(json!({"id": id, "error": {"code": code, "message": message}}));
    }

    pub fn event(&self, method: &str, params: Value) {
        self.push(json!({"method": method, "params": params}));
    }

    /// Answer every frame with `handler` until the connection goes away.
    ///
    /// Every frame seen is appended to the returned log.
    pub fn respond_with<F>(mut self, handler: F) -> (Arc<Mutex<Vec<Value>>>, JoinHandle<()>)
    where
        F: Fn(&Value) -> Option<Value> + Send + 'static,
    {
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        let task = tokio::spawn(async move {
            while let Some(text) = self.outbound.next().await {
                let frame: Value = serde_json::from_str(&text).expect("connection wrote invalid JSON");
                seen.lock().unwrap().push(frame.clone());
                if let Some(response) = handler(&frame) {
                    let _ = self.inbound.unbounded_send(Ok(response.to_string()));
                }
            }
        });
        (log, task)
    }
}

/// Canned browser behavior: two pages and a worker, attach returns
/// `S-<targetId>`, everything else succeeds with `{}`.
pub fn browser(frame: &Value) -> Option<Value> {
    let id = frame["id"].as_u64()?;
    let result = match frame["method"].as_str()? {
        "Target.getTargets" => json!({"targetInfos": [
            {"targetId": "W1", "type": "service_worker", "title": "", "url": ""},
            {"targetId": "P1", "type": "page", "title": "One", "url": "https://one.test/"},
            {"targetId": "P2", "type": "page", "title": "Two", "url": "https://two.test/"}
        ]}),
        "Target.attachToTarget" => {
            let target = frame["params"]["targetId"].as_str()?;
            json!({"sessionId": format!("S-{}", target)})
        }
        _ => json!({}),
    };
    Some(json!({"id": id, "result": result}))
}

pub fn error_reply(frame: &Value, code: i64, message: &str) -> Option<Value> {
    Some(json!({"id": frame["id"], "error": {"code": code, "message": message}}))
}

/// [`HttpClient`] whose sockets are in-memory channel pairs.
pub struct FakeClient {
    sockets: mpsc::UnboundedSender<FakeSocket>,
    version_response: Mutex<Option<HttpResponse>>,
    fail_open: AtomicBool,
    opened: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeSocket>) {
        let (tx, rx) = mpsc::unbounded();
        let client = Arc::new(Self {
            sockets: tx,
            version_response: Mutex::new(None),
            fail_open: AtomicBool::new(false),
            opened: AtomicUsize::new(0),
        });
        (client, rx)
    }

    pub fn set_version_response(&self, status: u16, body: Value) {
        *self.version_response.lock().unwrap() = Some(HttpResponse {
            status,
            body: body.to_string(),
        });
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for FakeClient {
    async fn get(&self, _url: &Url) -> Result<HttpResponse, CdpError> {
        Ok(self
            .version_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(HttpResponse {
                status: 404,
                body: String::new(),
            }))
    }

    async fn open_socket(&self, url: &Url) -> Result<Socket, CdpError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(CdpError::ConnectionFailed(format!("{}: refused", url)));
        }

        let (out_tx, out_rx) = mpsc::unbounded::<String>();
        let (in_tx, in_rx) = mpsc::unbounded::<Result<String, CdpError>>();
        self.sockets
            .unbounded_send(FakeSocket {
                outbound: out_rx,
                inbound: in_tx,
            })
            .map_err(|e| CdpError::ConnectionFailed(e.to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);

        let sink = out_tx.sink_map_err(|e| CdpError::WebSocket(e.to_string()));
        Ok(Socket::new(sink, in_rx))
    }
}

/// A connection to a fake browser and the browser end of its first socket.
pub struct Harness {
    pub client: Arc<FakeClient>,
    pub connection: Arc<Connection>,
    pub sockets: mpsc::UnboundedReceiver<FakeSocket>,
}

impl Harness {
    pub async fn open() -> (Self, FakeSocket) {
        let (client, mut sockets) = FakeClient::new();
        let url = Url::parse(WS_URL).unwrap();
        let connection = Connection::open(client.clone(), url).await.unwrap();
        let socket = sockets.next().await.unwrap();
        let harness = Self {
            client,
            connection: Arc::new(connection),
            sockets,
        };
        (harness, socket)
    }

    /// Browser end of the next socket the connection opens.
    pub async fn next_socket(&mut self) -> FakeSocket {
        tokio::time::timeout(Duration::from_secs(5), self.sockets.next())
            .await
            .expect("no socket opened within 5s")
            .expect("client dropped")
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
