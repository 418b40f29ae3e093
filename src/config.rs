//! Environment-variable configuration loading (§6's config-loader
//! interface). Three values, loaded once at startup into an immutable
//! struct — no need for a TOML/figment layer here.

use std::time::Duration;

const DEFAULT_HEARTBEAT_INTERVAL_SECONDS: u64 = 15;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute URL of the controller's callback endpoint. `None` means
    /// the service is unconfigured: both client endpoints answer 503.
    pub callback_url: Option<String>,
    pub heartbeat_interval: Duration,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        let callback_url = std::env::var("CALLBACK_URL")
            .ok()
            .filter(|v| !v.is_empty());

        let heartbeat_interval = std::env::var("HEARTBEAT_INTERVAL_SECONDS")
            .ok()
            .and_then(|raw| match raw.parse::<u64>() {
                Ok(seconds) if seconds >= 1 => Some(seconds),
                Ok(_) => {
                    tracing::error!(
                        value = %raw,
                        "HEARTBEAT_INTERVAL_SECONDS must be >= 1; using default"
                    );
                    None
                }
                Err(_) => {
                    tracing::error!(
                        value = %raw,
                        "HEARTBEAT_INTERVAL_SECONDS is not an integer; using default"
                    );
                    None
                }
            })
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECONDS);

        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        Config {
            callback_url,
            heartbeat_interval: Duration::from_secs(heartbeat_interval),
            bind_addr,
        }
    }
}
