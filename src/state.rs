//! Shared application state, handed to every handler via axum's
//! `State` extractor.

use std::sync::Arc;
use std::time::Duration;

use crate::callback::CallbackClient;
use crate::config::Config;
use crate::registry::Registry;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub callback_client: Option<CallbackClient>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let callback_client = config.callback_url.clone().map(|url| {
            CallbackClient::new(reqwest::Client::new(), url, CALLBACK_TIMEOUT)
        });
        AppState {
            registry: Arc::new(Registry::new()),
            callback_client,
            config,
        }
    }
}
