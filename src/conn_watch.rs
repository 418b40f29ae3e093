//! Raw-socket liveness watching that backs the connect handler's
//! pre-response race guard (component D, §4.D steps 5/7.a/7.c).
//!
//! The per-connection `mpsc` channel used for the SSE body can't help
//! here: its `Receiver` isn't wired into anything pollable until the
//! response is actually built, which happens *after* the connect
//! callback returns. A client that aborts while that callback is still
//! in flight is invisible to anything watching the channel. This module
//! watches the socket itself instead, so the abort is visible the
//! moment the OS reports it, independent of whether a response exists
//! yet.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::CancellationToken;

/// Wraps an `AsyncRead + AsyncWrite` transport and cancels `token` the
/// moment the underlying I/O reports the peer is gone: a read that
/// returns EOF, or an error on either the read or write half.
pub struct WatchedIo<T> {
    inner: T,
    token: CancellationToken,
}

impl<T> WatchedIo<T> {
    pub fn new(inner: T, token: CancellationToken) -> Self {
        WatchedIo { inner, token }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for WatchedIo<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let had_remaining = buf.remaining() > 0;
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        match &poll {
            Poll::Ready(Ok(())) if had_remaining && buf.filled().len() == before => {
                this.token.cancel();
            }
            Poll::Ready(Err(_)) => this.token.cancel(),
            _ => {}
        }
        poll
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for WatchedIo<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Err(_)) = &poll {
            this.token.cancel();
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_flush(cx);
        if let Poll::Ready(Err(_)) = &poll {
            this.token.cancel();
        }
        poll
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
