//! Periodic keep-alive loop (component F).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::framing::HEARTBEAT;
use crate::record::{ConnectionRecord, Frame};
use crate::registry::Registry;
use crate::token::Token;

/// Spawn the heartbeat task for `token` and return its handle so the
/// caller can store it on the record for later cancellation (I3).
///
/// The task looks the record up by token on every tick rather than
/// capturing the `Arc` directly, so a race with removal is resolved the
/// same way a fresh send would see it: the record is just gone.
pub fn spawn(registry: Arc<Registry>, token: Token, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; discard it
        loop {
            ticker.tick().await;
            let Some(record) = registry.get(token).await else {
                return;
            };
            send_heartbeat(&record, token);
        }
    })
}

/// Non-blocking best-effort write, per §4.F.4 ("do not block the event
/// loop"). Never runs the disconnect unifier from here — a dead writer
/// will surface through the stream-close listener instead (§4.F.3).
fn send_heartbeat(record: &ConnectionRecord, token: Token) {
    match record.sender().try_send(Frame::Data(HEARTBEAT.to_vec())) {
        Ok(()) => {}
        Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(token = %token, "heartbeat dropped: client is backpressured");
        }
        Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!(token = %token, "heartbeat skipped: writer already closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::mpsc;

    use super::*;
    use crate::record::RequestSnapshot;

    fn record(token: Token) -> (Arc<ConnectionRecord>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Arc::new(ConnectionRecord::new(
                token,
                RequestSnapshot {
                    url: "/sse/room".into(),
                    headers: HashMap::new(),
                },
                tx,
            )),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_write_the_literal_heartbeat_frame() {
        let registry = Arc::new(Registry::new());
        let token = Token::generate();
        let (record, mut rx) = record(token);
        registry.add(token, record.clone()).await;

        let handle = spawn(registry.clone(), token, Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(1100)).await;

        let frame = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("a heartbeat frame should arrive")
            .expect("channel should still be open");
        match frame {
            Frame::Data(bytes) => assert_eq!(bytes, HEARTBEAT),
            Frame::Close => panic!("heartbeat must not close the stream"),
        }
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_silently_once_the_record_is_removed() {
        let registry = Arc::new(Registry::new());
        let token = Token::generate();
        let (record, _rx) = record(token);
        registry.add(token, record).await;
        registry.remove(token).await;

        let handle = spawn(registry, token, Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_finished());
    }
}
