//! Pending request slots and the caller-side reply future.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tabwire_protocol::{CdpError, Decoder};
use tokio::sync::oneshot;

/// Raw reply payload delivered by the read loop.
pub(crate) type RawReply = Result<Value, CdpError>;

/// Pending request waiting for response.
pub(crate) struct PendingRequest {
    pub method: String,
    pub tx: oneshot::Sender<RawReply>,
}

enum ReplyState<T> {
    /// Fire-and-forget command, resolved at send time.
    Ready(Option<T>),
    Waiting {
        rx: oneshot::Receiver<RawReply>,
        decode: Decoder<T>,
    },
}

/// Future resolving to the decoded reply of one sent command.
///
/// Decoding runs in the task awaiting this future, never on the read loop.
/// Resolves to [`CdpError::ConnectionClosed`] when the socket that carried the
/// command goes away first.
pub struct PendingReply<T> {
    id: u64,
    state: ReplyState<T>,
}

// No field is structurally pinned.
impl<T> Unpin for PendingReply<T> {}

impl<T> PendingReply<T> {
    pub(crate) fn ready(id: u64, value: T) -> Self {
        Self {
            id,
            state: ReplyState::Ready(Some(value)),
        }
    }

    pub(crate) fn waiting(id: u64, rx: oneshot::Receiver<RawReply>, decode: Decoder<T>) -> Self {
        Self {
            id,
            state: ReplyState::Waiting { rx, decode },
        }
    }

    /// Command id the reply is correlated by.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Future for PendingReply<T> {
    type Output = Result<T, CdpError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let id = this.id;
        match &mut this.state {
            ReplyState::Ready(value) => Poll::Ready(
                value
                    .take()
                    .ok_or_else(|| CdpError::InvalidResponse(format!("reply {} already taken", id))),
            ),
            ReplyState::Waiting { rx, decode } => match Pin::new(rx).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(Ok(value))) => Poll::Ready(decode(value)),
                Poll::Ready(Ok(Err(e))) => Poll::Ready(Err(e)),
                Poll::Ready(Err(_)) => Poll::Ready(Err(CdpError::ConnectionClosed)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn int_decoder() -> Decoder<i64> {
        Arc::new(|v: Value| {
            v["n"]
                .as_i64()
                .ok_or_else(|| CdpError::InvalidResponse("missing n".to_string()))
        })
    }

    #[tokio::test]
    async fn test_ready_reply() {
        let reply = PendingReply::ready(3, "done");
        assert_eq!(reply.id(), 3);
        assert_eq!(reply.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_waiting_reply_decodes() {
        let (tx, rx) = oneshot::channel();
        let reply = PendingReply::waiting(1, rx, int_decoder());
        tx.send(Ok(json!({"n": 5}))).unwrap();
        assert_eq!(reply.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_decode_error_stays_local() {
        let (tx, rx) = oneshot::channel();
        let reply = PendingReply::waiting(1, rx, int_decoder());
        tx.send(Ok(json!({}))).unwrap();
        assert!(matches!(reply.await, Err(CdpError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_dropped_slot_is_connection_closed() {
        let (tx, rx) = oneshot::channel::<RawReply>();
        let reply = PendingReply::waiting(1, rx, int_decoder());
        drop(tx);
        assert!(matches!(reply.await, Err(CdpError::ConnectionClosed)));
    }
}
