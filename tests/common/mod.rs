use std::time::Duration;

use sse_gateway::config::Config;
use sse_gateway::state::AppState;

/// Spawn a real gateway instance on an ephemeral port and return its base
/// URL. Uses the crate's own low-level `serve` loop rather than bare
/// `axum::serve`, so tests exercise the same connection-level disconnect
/// detection the connect handler's race guard depends on.
pub async fn spawn_gateway(callback_url: Option<String>, heartbeat_secs: u64) -> String {
    let config = Config {
        callback_url,
        heartbeat_interval: Duration::from_secs(heartbeat_secs),
        bind_addr: "127.0.0.1:0".to_string(),
    };
    let state = AppState::new(config);
    let router = sse_gateway::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("binding an ephemeral port should never fail");
    let addr = listener
        .local_addr()
        .expect("a bound listener always has a local address");

    tokio::spawn(async move {
        sse_gateway::serve::serve(listener, router).await;
    });

    format!("http://{addr}")
}
