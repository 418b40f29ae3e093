//! `POST /internal/send` (component E) and the shared event-then-close
//! routine it shares with the connect handler (§4.D step 7.f).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

use crate::callback::{CallbackClient, DisconnectReason, EventBody};
use crate::disconnect;
use crate::framing;
use crate::record::ConnectionRecord;
use crate::registry::Registry;
use crate::response;
use crate::state::AppState;
use crate::token::Token;

struct SendRequest {
    token: Token,
    event: Option<EventBody>,
    close: bool,
}

/// Manual validation rather than a derived `Deserialize`: the spec wants
/// specific 400 messages per malformed field (§4.E), which a single
/// struct-level parse failure can't distinguish.
fn parse_send_request(value: &Value) -> Result<SendRequest, &'static str> {
    let Value::Object(map) = value else {
        return Err("request body must be a JSON object");
    };

    let token = match map.get("token") {
        Some(Value::String(s)) => {
            s.parse::<Token>().map_err(|_| "token is not a valid token")?
        }
        Some(_) => return Err("token must be a string"),
        None => return Err("token is required"),
    };

    let event = match map.get("event") {
        None | Some(Value::Null) => None,
        Some(Value::Object(event_obj)) => {
            let data = match event_obj.get("data") {
                Some(Value::String(s)) => s.clone(),
                Some(_) => return Err("event.data must be a string"),
                None => return Err("event.data is required when event is present"),
            };
            let name = match event_obj.get("name") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(_) => return Err("event.name must be a string"),
            };
            Some(EventBody { name, data })
        }
        Some(_) => return Err("event must be an object"),
    };

    let close = match map.get("close") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err("close must be a boolean"),
    };

    Ok(SendRequest { token, event, close })
}

pub async fn handle_send(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return response::bad_request("request body is not valid JSON"),
    };

    let request = match parse_send_request(&value) {
        Ok(request) => request,
        Err(message) => return response::bad_request(message),
    };

    let Some(callback_client) = state.callback_client.clone() else {
        return response::service_unavailable("controller callback is not configured");
    };

    let Some(record) = state.registry.get(request.token).await else {
        return response::not_found("unknown or already-closed token");
    };

    match apply_event_and_close(
        &state.registry,
        &callback_client,
        &record,
        request.event,
        request.close,
    )
    .await
    {
        ApplyOutcome::Ok => Json(serde_json::json!({"status": "ok"})).into_response(),
        ApplyOutcome::WriteFailed => response::internal_error("failed to write event to client"),
    }
}

pub enum ApplyOutcome {
    Ok,
    WriteFailed,
}

/// Shared by `POST /internal/send` and the connect handler's "apply the
/// connect callback's piggy-backed event/close" step.
///
/// Ordering contract (hard, §4.E): the event write always precedes any
/// close action, because step 2 is `.await`ed to completion before step
/// 4 ever runs.
pub async fn apply_event_and_close(
    registry: &Registry,
    callback_client: &CallbackClient,
    record: &Arc<ConnectionRecord>,
    event: Option<EventBody>,
    close: bool,
) -> ApplyOutcome {
    if let Some(event) = event {
        let bytes = framing::format(event.name.as_deref(), &event.data);
        if record.write_data(bytes).await.is_err() {
            disconnect::unify(registry, callback_client, record.token, DisconnectReason::Error)
                .await;
            return ApplyOutcome::WriteFailed;
        }
    }

    if close {
        disconnect::unify(
            registry,
            callback_client,
            record.token,
            DisconnectReason::ServerClosed,
        )
        .await;
    }

    ApplyOutcome::Ok
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::record::RequestSnapshot;

    /// §8 scenario 5: a write that fails (here, simulated by dropping the
    /// receiver half of the channel before the write) runs the unifier
    /// with reason `"error"`, removes the record, and never reaches the
    /// close step even when `close` was also requested.
    #[tokio::test]
    async fn write_failure_removes_the_record_and_reports_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let registry = Registry::new();
        let callback_client = CallbackClient::new(
            reqwest::Client::new(),
            format!("{}/callback", mock_server.uri()),
            Duration::from_secs(5),
        );

        let token = Token::generate();
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx); // the client is already gone; any send on `tx` now fails
        let record = Arc::new(ConnectionRecord::new(
            token,
            RequestSnapshot {
                url: "/sse/room".into(),
                headers: HashMap::new(),
            },
            tx,
        ));
        registry.add(token, record.clone()).await;

        let outcome = apply_event_and_close(
            &registry,
            &callback_client,
            &record,
            Some(EventBody { name: None, data: "x".into() }),
            true, // close was also requested; must not be reached
        )
        .await;

        assert!(matches!(outcome, ApplyOutcome::WriteFailed));
        assert!(!registry.has(token).await, "the failed record must be removed");

        mock_server.verify().await;
        let requests = mock_server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        assert_eq!(body["reason"], "error");
    }

    #[test]
    fn missing_token_is_rejected() {
        let value = serde_json::json!({});
        assert_eq!(parse_send_request(&value).unwrap_err(), "token is required");
    }

    #[test]
    fn wrong_type_token_is_rejected() {
        let value = serde_json::json!({"token": 5});
        assert_eq!(parse_send_request(&value).unwrap_err(), "token must be a string");
    }

    #[test]
    fn close_must_be_boolean() {
        let value = serde_json::json!({"token": Token::generate().to_string(), "close": "yes"});
        assert_eq!(parse_send_request(&value).unwrap_err(), "close must be a boolean");
    }

    #[test]
    fn event_without_data_is_rejected() {
        let value =
            serde_json::json!({"token": Token::generate().to_string(), "event": {"name": "m"}});
        assert_eq!(
            parse_send_request(&value).unwrap_err(),
            "event.data is required when event is present"
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let token = Token::generate();
        let value = serde_json::json!({"token": token.to_string(), "extra": "ignored"});
        let parsed = parse_send_request(&value).unwrap();
        assert_eq!(parsed.token, token);
        assert!(parsed.event.is_none());
        assert!(!parsed.close);
    }

    #[test]
    fn well_formed_event_and_close_parse() {
        let token = Token::generate();
        let value = serde_json::json!({
            "token": token.to_string(),
            "event": {"name": "m", "data": "hi"},
            "close": true,
        });
        let parsed = parse_send_request(&value).unwrap();
        assert_eq!(parsed.event.unwrap().data, "hi");
        assert!(parsed.close);
    }
}
