use sse_gateway::config::Config;
use sse_gateway::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
                .expect("the fallback filter directive is always valid"),
        )
        .init();

    let config = Config::from_env();
    if config.callback_url.is_none() {
        tracing::warn!("CALLBACK_URL is not set; GET /sse/* and POST /internal/send will return 503");
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config);
    let router = sse_gateway::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {bind_addr}: {err}"));
    tracing::info!(addr = %bind_addr, "sse-gateway listening");

    tokio::select! {
        () = sse_gateway::serve::serve(listener, router) => {}
        () = shutdown_signal() => {
            tracing::info!("shutdown signal received; no longer accepting new connections");
        }
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}
