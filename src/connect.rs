//! `GET /sse/*` (component D): the connect protocol state machine.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Extension, OriginalUri, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::callback::DisconnectReason;
use crate::disconnect;
use crate::error::CallbackError;
use crate::record::{ConnectionRecord, Frame, HeaderValue as RecordHeaderValue, RequestSnapshot};
use crate::response;
use crate::send::apply_event_and_close;
use crate::heartbeat;
use crate::state::AppState;
use crate::token::Token;

/// Bound on the per-connection outbound frame channel. Heartbeats use
/// `try_send` so a full channel just drops a tick (§4.F.4); event/close
/// writes use `send().await` so they back-pressure the caller instead of
/// being silently lost.
const CHANNEL_CAPACITY: usize = 32;

pub async fn handle_connect(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Extension(conn_token): Extension<CancellationToken>,
    headers: HeaderMap,
) -> Response {
    let Some(callback_client) = state.callback_client.clone() else {
        return response::service_unavailable("controller callback is not configured");
    };

    let token = Token::generate();
    let snapshot = snapshot_request(&uri, &headers);

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let record = std::sync::Arc::new(ConnectionRecord::new(token, snapshot.clone(), tx));

    arm_disconnect_listener(
        record.clone(),
        state.registry.clone(),
        callback_client.clone(),
        conn_token,
    );

    let result = callback_client.connect(token, &snapshot).await;

    if !result.success {
        let Some(err) = result.error else {
            unreachable!("a failed CallbackResult always carries an error");
        };
        tracing::info!(token = %token, kind = err.kind(), "connect callback did not succeed");
        return map_callback_failure(err, result.status_code);
    }

    if record.is_disconnected().await {
        tracing::info!(token = %token, "client disconnected during connect callback");
        return StatusCode::NO_CONTENT.into_response();
    }

    if !record.finalize_insert().await {
        tracing::info!(token = %token, "client disconnected just before insertion");
        return StatusCode::NO_CONTENT.into_response();
    }

    state.registry.add(token, record.clone()).await;
    tracing::info!(token = %token, "connection accepted");

    let heartbeat_handle = heartbeat::spawn(state.registry.clone(), token, state.config.heartbeat_interval);
    record.set_heartbeat(heartbeat_handle).await;

    let sse_response = build_sse_response(rx);

    if let Some(body) = result.response_body {
        if body.event.is_some() || body.close {
            apply_event_and_close(&state.registry, &callback_client, &record, body.event, body.close)
                .await;
        }
    }

    sse_response
}

/// Arms a single listener, before the connect callback is ever awaited
/// (§4.D step 5), that races two independent disconnect signals:
///
/// - `conn_token` cancels the moment the raw socket reports the peer
///   gone (see [`crate::conn_watch`]), which is the only signal capable
///   of firing while the connect callback is still in flight and the
///   response body doesn't exist yet.
/// - `record.sender().closed()` resolves once the outbound frame
///   channel's receiver is dropped, which only happens after the
///   record has been handed off into a real SSE response body — the
///   existing post-insert detection path.
///
/// Whichever fires first drives the same `on_stream_closed` state
/// transition, so the rest of the insert-vs-disconnect race guard
/// (`is_disconnected`/`finalize_insert` in the handler below) doesn't
/// need to know which one it was.
fn arm_disconnect_listener(
    record: std::sync::Arc<ConnectionRecord>,
    registry: std::sync::Arc<crate::registry::Registry>,
    callback_client: crate::callback::CallbackClient,
    conn_token: CancellationToken,
) {
    tokio::spawn(async move {
        tokio::select! {
            () = conn_token.cancelled() => {}
            () = record.sender().closed() => {}
        }
        if record.on_stream_closed().await {
            disconnect::unify(&registry, &callback_client, record.token, DisconnectReason::ClientClosed).await;
        }
    });
}

fn map_callback_failure(err: CallbackError, status_code: Option<u16>) -> Response {
    match err {
        CallbackError::Timeout => response::gateway_timeout("controller callback timed out"),
        CallbackError::Network(_) => response::service_unavailable("controller is unreachable"),
        CallbackError::HttpStatus(_) => {
            let status = status_code
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            status.into_response()
        }
    }
}

fn build_sse_response(rx: mpsc::Receiver<Frame>) -> Response {
    let stream = ReceiverStream::new(rx).map_while(|frame| match frame {
        Frame::Data(bytes) => Some(Ok::<_, std::io::Error>(bytes)),
        Frame::Close => None,
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(stream))
        .expect("response built from static header values cannot fail to construct")
}

fn snapshot_request(uri: &axum::http::Uri, headers: &HeaderMap) -> RequestSnapshot {
    let url = uri
        .path_and_query()
        .map(std::string::ToString::to_string)
        .unwrap_or_else(|| RequestSnapshot::FALLBACK_URL.to_string());

    let mut map = HashMap::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(std::string::ToString::to_string)
            .collect();
        if values.is_empty() {
            continue;
        }
        let value = if values.len() == 1 {
            RecordHeaderValue::Single(values.into_iter().next().expect("len checked above"))
        } else {
            RecordHeaderValue::Multi(values)
        };
        map.insert(name.as_str().to_string(), value);
    }

    RequestSnapshot { url, headers: map }
}
