//! Single cleanup entry point for every terminal reason (component G).

use crate::callback::{CallbackClient, DisconnectReason};
use crate::registry::Registry;
use crate::token::Token;

/// Run the disconnect cleanup sequence for `token`, if it hasn't already
/// run. `registry.take` is the dedup barrier: a second caller for the
/// same token finds nothing and returns immediately, which is what
/// guarantees I4 (at most one disconnect callback per record).
pub async fn unify(
    registry: &Registry,
    callback_client: &CallbackClient,
    token: Token,
    reason: DisconnectReason,
) {
    let Some(record) = registry.take(token).await else {
        return;
    };

    record.cancel_heartbeat().await;
    record.close_writer().await;

    let result = callback_client.disconnect(token, reason, &record.request).await;
    if let Some(err) = result.error {
        tracing::warn!(token = %token, error = %err, "disconnect callback failed; not retrying");
    } else {
        tracing::info!(token = %token, reason = ?reason, "disconnect callback delivered");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::record::{ConnectionRecord, RequestSnapshot};

    async fn callback_client(server: &MockServer) -> CallbackClient {
        CallbackClient::new(
            reqwest::Client::new(),
            format!("{}/callback", server.uri()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn second_unify_for_the_same_token_is_a_no_op() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let registry = Registry::new();
        let token = Token::generate();
        let (tx, _rx) = mpsc::channel(8);
        let record = std::sync::Arc::new(ConnectionRecord::new(
            token,
            RequestSnapshot {
                url: "/sse/room".into(),
                headers: HashMap::new(),
            },
            tx,
        ));
        registry.add(token, record).await;

        let client = callback_client(&server).await;
        unify(&registry, &client, token, DisconnectReason::ClientClosed).await;
        unify(&registry, &client, token, DisconnectReason::ClientClosed).await;

        server.verify().await;
    }
}
