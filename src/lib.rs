pub mod callback;
pub mod conn_watch;
pub mod config;
pub mod connect;
pub mod disconnect;
pub mod error;
pub mod framing;
pub mod health;
pub mod heartbeat;
pub mod record;
pub mod registry;
pub mod response;
pub mod send;
pub mod serve;
pub mod state;
pub mod token;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/sse/*path", get(connect::handle_connect))
        .route("/internal/send", post(send::handle_send))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .with_state(state)
}
