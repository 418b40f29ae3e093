//! Manual connection-accept loop, replacing `axum::serve`.
//!
//! `axum::serve` owns the `TcpStream`-to-service wiring itself and gives
//! callers no hook to see the raw socket, so there is no way to notice a
//! client disconnecting before a response exists. Accepting connections
//! by hand and wrapping each socket in [`crate::conn_watch::WatchedIo`]
//! gets that hook back: every accepted connection carries its own
//! [`CancellationToken`], inserted as a request extension, that fires
//! the instant the socket reports the peer gone. `handle_connect` races
//! this against the connect callback to close the pre-insert race the
//! channel-based listener alone can't see (component D, §4.D).

use axum::body::Body;
use axum::extract::Request;
use axum::Router;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::conn_watch::WatchedIo;

/// Accept connections on `listener` forever, serving each with a clone
/// of `router`. Never returns under normal operation; callers race it
/// against a shutdown signal with `tokio::select!`.
pub async fn serve(listener: TcpListener, router: Router) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept connection");
                continue;
            }
        };

        let token = CancellationToken::new();
        let io = TokioIo::new(WatchedIo::new(stream, token.clone()));
        let tower_service = router.clone().layer(axum::Extension(token));

        tokio::spawn(async move {
            let hyper_service = service_fn(move |request: Request<hyper::body::Incoming>| {
                tower_service.clone().call(request.map(Body::new))
            });

            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, hyper_service)
                .with_upgrades()
                .await
            {
                tracing::debug!(error = %err, peer = %peer_addr, "connection ended with an error");
            }
        });
    }
}
