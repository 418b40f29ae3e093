//! Outbound HTTP client for the two controller callbacks (component C).

use std::time::Duration;

use serde_json::{json, Value};

use crate::error::CallbackError;
use crate::record::RequestSnapshot;
use crate::token::Token;

/// Why a disconnect callback is being issued, per §4.C's `reason` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    ClientClosed,
    ServerClosed,
    Error,
}

impl DisconnectReason {
    fn as_str(self) -> &'static str {
        match self {
            DisconnectReason::ClientClosed => "client_closed",
            DisconnectReason::ServerClosed => "server_closed",
            DisconnectReason::Error => "error",
        }
    }
}

/// `event`/`close` the controller's connect-callback response may
/// piggy-back, per §6's optional response body.
#[derive(Debug, Clone, Default)]
pub struct CallbackResponseBody {
    pub event: Option<EventBody>,
    pub close: bool,
}

#[derive(Debug, Clone)]
pub struct EventBody {
    pub name: Option<String>,
    pub data: String,
}

/// Outcome of a single callback request (§4.C).
pub struct CallbackResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<CallbackError>,
    pub response_body: Option<CallbackResponseBody>,
}

/// Thin wrapper around a shared `reqwest::Client`. Cloneable and safe for
/// concurrent use, matching §5's "may be a shared pool" guidance.
#[derive(Clone)]
pub struct CallbackClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl CallbackClient {
    pub fn new(http: reqwest::Client, url: String, timeout: Duration) -> Self {
        CallbackClient { http, url, timeout }
    }

    pub async fn connect(&self, token: Token, request: &RequestSnapshot) -> CallbackResult {
        let payload = json!({
            "action": "connect",
            "token": token.to_string(),
            "request": request,
        });
        self.dispatch(payload, token, "connect", true).await
    }

    pub async fn disconnect(
        &self,
        token: Token,
        reason: DisconnectReason,
        request: &RequestSnapshot,
    ) -> CallbackResult {
        let payload = json!({
            "action": "disconnect",
            "reason": reason.as_str(),
            "token": token.to_string(),
            "request": request,
        });
        let result = self.dispatch(payload, token, "disconnect", false).await;
        if let Some(body) = &result.response_body {
            if body.event.is_some() || body.close {
                tracing::warn!(
                    token = %token,
                    "disconnect callback returned a body; ignoring it"
                );
            }
        }
        result
    }

    /// `parse_body` distinguishes the connect callback (whose body
    /// drives §4.D.7.f) from the disconnect callback (whose body is
    /// parsed only so we can log the warn case above, then discarded).
    /// `token`/`action` are carried through purely for the unparseable-
    /// body log line §4.C requires (they correlate that error back to a
    /// specific connection).
    async fn dispatch(
        &self,
        payload: Value,
        token: Token,
        action: &'static str,
        parse_body: bool,
    ) -> CallbackResult {
        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return CallbackResult {
                    success: false,
                    status_code: None,
                    error: Some(CallbackError::Timeout),
                    response_body: None,
                };
            }
            Err(err) => {
                return CallbackResult {
                    success: false,
                    status_code: None,
                    error: Some(CallbackError::Network(err)),
                    response_body: None,
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            return CallbackResult {
                success: false,
                status_code: Some(status.as_u16()),
                error: Some(CallbackError::HttpStatus(status)),
                response_body: None,
            };
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) if err.is_timeout() => {
                return CallbackResult {
                    success: false,
                    status_code: Some(status.as_u16()),
                    error: Some(CallbackError::Timeout),
                    response_body: None,
                };
            }
            Err(err) => {
                return CallbackResult {
                    success: false,
                    status_code: Some(status.as_u16()),
                    error: Some(CallbackError::Network(err)),
                    response_body: None,
                };
            }
        };

        let response_body = if parse_body {
            parse_response_body(&bytes, token, action)
        } else if bytes.is_empty() {
            None
        } else {
            parse_response_body(&bytes, token, action)
        };

        CallbackResult {
            success: true,
            status_code: Some(status.as_u16()),
            error: None,
            response_body,
        }
    }
}

/// Lenient parse of a connect- or disconnect-callback response body
/// (§4.C).
///
/// - Not a JSON object, or invalid JSON → logs an error with `token`
///   and `action` for correlation and returns `None`, distinct from a
///   body that parsed to a valid-but-empty object.
/// - Wrong field types are dropped individually, with the other field
///   kept if valid.
/// - `{}` parses to `Some(CallbackResponseBody::default())` — present,
///   just empty.
fn parse_response_body(
    bytes: &[u8],
    token: Token,
    action: &'static str,
) -> Option<CallbackResponseBody> {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(
                token = %token,
                action = action,
                error = %err,
                "callback response body is not valid JSON"
            );
            return None;
        }
    };

    let Value::Object(map) = value else {
        tracing::error!(
            token = %token,
            action = action,
            "callback response body is not a JSON object"
        );
        return None;
    };

    let event = match map.get("event") {
        None | Some(Value::Null) => None,
        Some(Value::Object(event_obj)) => {
            let data = match event_obj.get("data") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(_) => {
                    tracing::error!("callback event.data has the wrong type; dropping event");
                    None
                }
                None => {
                    tracing::error!("callback event is missing required field data; dropping event");
                    None
                }
            };
            data.map(|data| {
                let name = match event_obj.get("name") {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Null) | None => None,
                    Some(_) => {
                        tracing::error!("callback event.name has the wrong type; dropping name");
                        None
                    }
                };
                EventBody { name, data }
            })
        }
        Some(_) => {
            tracing::error!("callback event field has the wrong type; dropping it");
            None
        }
    };

    let close = match map.get("close") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            tracing::error!("callback close field has the wrong type; dropping it");
            false
        }
    };

    Some(CallbackResponseBody { event, close })
}
