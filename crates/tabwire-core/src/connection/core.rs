//! Connection struct, command dispatch and the socket read loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tabwire_protocol::{CdpError, Command, Event, InboundFrame, OutboundFrame, ReplyOutcome, SessionId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;

use super::listeners::ListenerRegistry;
use super::pending::{PendingReply, PendingRequest};
use crate::transport::{FrameSink, FrameStream, HttpClient};

/// Counters for frames the read loop has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub frames_received: u64,
    /// Replies whose id had no pending request (timed out or duplicate).
    pub late_replies: u64,
    /// Unparseable, unrecognized, or params-less event frames.
    pub dropped_frames: u64,
}

/// State shared between the connection handle and its read loop.
struct Shared {
    next_id: AtomicU64,
    next_sequence: AtomicU64,
    /// Bumped on every close/reopen; a read loop only tears down its own.
    generation: AtomicU64,
    closed: AtomicBool,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    listeners: Arc<ListenerRegistry>,
    frames_received: AtomicU64,
    late_replies: AtomicU64,
    dropped_frames: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            next_sequence: AtomicU64::new(1),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            pending: Mutex::new(HashMap::new()),
            listeners: Arc::new(ListenerRegistry::default()),
            frames_received: AtomicU64::new(0),
            late_replies: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
        }
    }

    fn handle_text(&self, text: &str) {
        trace!("CDP recv: {}", text);
        self.frames_received.fetch_add(1, Ordering::Relaxed);

        match InboundFrame::parse(text) {
            Ok(InboundFrame::Reply { id, outcome }) => self.resolve(id, outcome),
            Ok(InboundFrame::Event {
                method,
                params: Some(params),
                ..
            }) => {
                let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
                self.listeners.dispatch(&method, sequence, params);
            }
            Ok(InboundFrame::Event { method, params: None, .. }) => {
                debug!("Suppressing {} event without params", method);
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }
            Ok(InboundFrame::Unrecognized(value)) => {
                warn!("Dropping unrecognized CDP frame: {}", value);
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("Failed to parse CDP message: {}", e);
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn resolve(&self, id: u64, outcome: ReplyOutcome) {
        let Some(request) = self.pending.lock().remove(&id) else {
            self.late_replies.fetch_add(1, Ordering::Relaxed);
            debug!("Discarding reply {} with no pending request", id);
            return;
        };

        let result = match outcome {
            ReplyOutcome::Result(value) => Ok(value),
            ReplyOutcome::Error(raw) => Err(CdpError::from_error_payload(raw)),
        };
        if request.tx.send(result).is_err() {
            trace!("Reply {} for {} had no waiting caller", id, request.method);
        }
    }

    /// Fail every pending request of `generation` and mark the connection closed.
    ///
    /// `None` closes unconditionally. Returns false when a newer socket
    /// generation is already live.
    fn shut_down(&self, generation: Option<u64>) -> bool {
        let orphaned: Vec<PendingRequest> = {
            let mut pending = self.pending.lock();
            if let Some(generation) = generation {
                if self.generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
            } else {
                self.generation.fetch_add(1, Ordering::SeqCst);
            }
            self.closed.store(true, Ordering::SeqCst);
            pending.drain().map(|(_, request)| request).collect()
        };

        if !orphaned.is_empty() {
            debug!("Failing {} pending request(s) after socket close", orphaned.len());
        }
        for request in orphaned {
            let _ = request.tx.send(Err(CdpError::ConnectionClosed));
        }
        true
    }
}

/// Owns one debugging socket to one browser endpoint.
///
/// Commands are correlated to replies by id; events are fanned out to the
/// listeners registered for their method. The connection survives a dropped
/// socket: [`Connection::reopen`] dials the same URL again.
pub struct Connection {
    url: Url,
    client: Arc<dyn HttpClient>,
    writer: tokio::sync::Mutex<Option<FrameSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl Connection {
    /// Open a socket to `url` through `client` and start reading.
    ///
    /// The connection takes ownership of the client and reuses it on reopen.
    pub async fn open(client: Arc<dyn HttpClient>, url: Url) -> Result<Self, CdpError> {
        let socket = client.open_socket(&url).await?;
        let (sink, stream) = socket.into_parts();

        let shared = Arc::new(Shared::new());
        let reader = Self::spawn_reader(Arc::clone(&shared), stream, 0);

        debug!("CDP connection opened to {}", url);

        Ok(Self {
            url,
            client,
            writer: tokio::sync::Mutex::new(Some(sink)),
            reader: Mutex::new(Some(reader)),
            shared,
        })
    }

    fn spawn_reader(shared: Arc<Shared>, mut stream: FrameStream, generation: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(text) => shared.handle_text(&text),
                    Err(e) => {
                        warn!("CDP socket error: {}", e);
                        break;
                    }
                }
            }
            if shared.shut_down(Some(generation)) {
                debug!("CDP socket closed");
            }
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Send a command and return the future of its reply.
    ///
    /// Write errors are returned here. For a fire-and-forget command the frame
    /// is written and the returned reply is already resolved.
    pub async fn send<T: Send + 'static>(
        &self,
        session_id: Option<&SessionId>,
        command: &Command<T>,
    ) -> Result<PendingReply<T>, CdpError> {
        if self.is_closed() {
            return Err(CdpError::ConnectionClosed);
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let text = OutboundFrame {
            id,
            method: command.method(),
            params: command.params(),
            session_id,
        }
        .to_text()?;

        let reply = match command.unreplied_result() {
            Some(result) => PendingReply::ready(id, result),
            None => {
                let (tx, rx) = oneshot::channel();
                {
                    // registered before the write so the read loop cannot miss it
                    let mut pending = self.shared.pending.lock();
                    if self.shared.closed.load(Ordering::SeqCst) {
                        return Err(CdpError::ConnectionClosed);
                    }
                    pending.insert(
                        id,
                        PendingRequest {
                            method: command.method().to_string(),
                            tx,
                        },
                    );
                }
                PendingReply::waiting(id, rx, command.decoder())
            }
        };

        trace!("CDP send: {}", text);
        if let Err(e) = self.write(text).await {
            self.shared.pending.lock().remove(&id);
            return Err(e);
        }

        Ok(reply)
    }

    async fn write(&self, text: String) -> Result<(), CdpError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(CdpError::ConnectionClosed)?;
        sink.send(text).await
    }

    /// Send a command and wait up to `timeout` for its reply.
    ///
    /// The deadline is client-side only: the browser keeps working on the
    /// command, and a reply arriving later is discarded.
    pub async fn send_and_wait<T: Send + 'static>(
        &self,
        session_id: Option<&SessionId>,
        command: &Command<T>,
        timeout: Duration,
    ) -> Result<T, CdpError> {
        let reply = self.send(session_id, command).await?;
        let id = reply.id();

        match tokio::time::timeout(timeout, reply).await {
            Ok(result) => result,
            Err(_) => {
                self.shared.pending.lock().remove(&id);
                Err(CdpError::Timeout {
                    method: command.method().to_string(),
                    timeout,
                })
            }
        }
    }

    /// Register a callback for every `event` frame.
    ///
    /// Callbacks get a per-connection delivery sequence number and the decoded
    /// params. They run on the event's delivery lane, not on the read loop,
    /// and should not block.
    pub fn add_listener<T, F>(&self, event: &Event<T>, callback: F)
    where
        T: 'static,
        F: Fn(u64, T) + Send + Sync + 'static,
    {
        self.shared.listeners.add(event, callback);
    }

    /// Stream `event` payloads through a channel.
    pub fn listen<T: Send + 'static>(&self, event: &Event<T>) -> mpsc::UnboundedReceiver<(u64, T)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_listener(event, move |sequence, payload| {
            let _ = tx.send((sequence, payload));
        });
        rx
    }

    pub fn clear_listeners(&self) {
        self.shared.listeners.clear();
    }

    pub fn listener_count(&self, event_method: &str) -> usize {
        self.shared.listeners.count(event_method)
    }

    /// Number of commands still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.lock().len()
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.shared.pending.lock().contains_key(&id)
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            frames_received: self.shared.frames_received.load(Ordering::Relaxed),
            late_replies: self.shared.late_replies.load(Ordering::Relaxed),
            dropped_frames: self.shared.dropped_frames.load(Ordering::Relaxed),
        }
    }

    /// Replace a dropped socket with a fresh one to the same URL.
    ///
    /// Requests outstanding on the old socket are not replayed.
    pub async fn reopen(&self) -> Result<(), CdpError> {
        let socket = self.client.open_socket(&self.url).await?;
        let (sink, stream) = socket.into_parts();

        let mut writer = self.writer.lock().await;
        if let Some(old) = self.reader.lock().take() {
            old.abort();
        }

        let (generation, orphaned) = {
            let mut pending = self.shared.pending.lock();
            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.shared.closed.store(false, Ordering::SeqCst);
            let orphaned: Vec<PendingRequest> = pending.drain().map(|(_, request)| request).collect();
            (generation, orphaned)
        };
        for request in orphaned {
            let _ = request.tx.send(Err(CdpError::ConnectionClosed));
        }

        *writer = Some(sink);
        let reader = Self::spawn_reader(Arc::clone(&self.shared), stream, generation);
        *self.reader.lock() = Some(reader);

        debug!("CDP connection reopened to {}", self.url);
        Ok(())
    }

    /// Close the socket. Pending requests fail with `ConnectionClosed`.
    pub async fn close(&self) {
        self.shared.shut_down(None);

        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        if let Some(mut sink) = self.writer.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!("Error closing CDP socket: {}", e);
            }
        }
        self.shared.listeners.stop_lanes();

        debug!("CDP connection to {} closed", self.url);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}
