//! The in-memory connection record (§3 Data Model) and the frames that
//! flow across its writer channel.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::token::Token;

/// One value or an ordered sequence of values for a single header name,
/// mirroring the "string or ordered sequence of strings" shape §3 asks
/// for so that multi-value headers survive the round trip to the
/// controller.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

/// Byte-verbatim snapshot of the inbound request, taken once at connect
/// time and forwarded to the controller on every callback for this
/// token.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RequestSnapshot {
    pub url: String,
    pub headers: HashMap<String, HeaderValue>,
}

impl RequestSnapshot {
    pub const FALLBACK_URL: &'static str = "/sse/unknown";
}

/// A unit of work sent to the task driving the client's response body.
///
/// `Close` is a sentinel distinct from the channel simply running dry:
/// a long-lived disconnect watcher also holds a `Sender` clone, so the
/// channel would never close on its own while that watcher is parked in
/// `closed().await`. Ending the stream therefore requires sending this
/// value explicitly rather than relying on every sender being dropped.
#[derive(Debug)]
pub enum Frame {
    Data(Vec<u8>),
    Close,
}

#[derive(Debug, Default)]
struct Inner {
    disconnected: bool,
    in_map: bool,
    heartbeat: Option<JoinHandle<()>>,
}

/// The live state for one SSE connection. Owned exclusively by the
/// registry once inserted; the connect handler holds it (and an `Arc`
/// clone for its own bookkeeping) transiently before that happens.
#[derive(Debug)]
pub struct ConnectionRecord {
    pub token: Token,
    pub request: RequestSnapshot,
    tx: mpsc::Sender<Frame>,
    inner: Mutex<Inner>,
}

impl ConnectionRecord {
    pub fn new(token: Token, request: RequestSnapshot, tx: mpsc::Sender<Frame>) -> Self {
        ConnectionRecord {
            token,
            request,
            tx,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Disconnect-listener side effect (§4.D step 5): if the record has
    /// already been inserted, report that the unifier must run; otherwise
    /// mark it disconnected so the connect handler aborts before insert.
    /// Returns `true` iff the caller must now run the disconnect unifier.
    pub async fn on_stream_closed(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.in_map {
            true
        } else {
            inner.disconnected = true;
            false
        }
    }

    /// The connect handler's insertion gate (§4.D steps 7.a/7.c collapsed
    /// into one atomic check, which the design notes explicitly permit).
    /// Returns `true` and marks the record `in_map` iff it was not
    /// already disconnected.
    pub async fn finalize_insert(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.disconnected {
            false
        } else {
            inner.in_map = true;
            true
        }
    }

    pub async fn is_disconnected(&self) -> bool {
        self.inner.lock().await.disconnected
    }

    pub async fn was_in_map(&self) -> bool {
        self.inner.lock().await.in_map
    }

    pub async fn set_heartbeat(&self, handle: JoinHandle<()>) {
        self.inner.lock().await.heartbeat = Some(handle);
    }

    /// Cancel the heartbeat timer, idempotently (I3). Safe to call more
    /// than once; only the first call finds a handle to abort.
    pub async fn cancel_heartbeat(&self) {
        if let Some(handle) = self.inner.lock().await.heartbeat.take() {
            handle.abort();
        }
    }

    pub async fn write_data(&self, bytes: Vec<u8>) -> Result<(), crate::error::SendError> {
        self.tx
            .send(Frame::Data(bytes))
            .await
            .map_err(|_| crate::error::SendError::WriterGone)
    }

    /// Best-effort stream close: a channel `send` error here just means
    /// the client already went away, which is not itself a failure.
    pub async fn close_writer(&self) {
        let _ = self.tx.send(Frame::Close).await;
    }

    /// Cheap `Sender` clone for the heartbeat task, which needs to
    /// perform its own non-blocking `try_send` independent of any lock
    /// held by request-handling tasks.
    pub fn sender(&self) -> mpsc::Sender<Frame> {
        self.tx.clone()
    }
}
