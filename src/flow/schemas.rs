//! # Flow Endpoint Schemas
//!
//! Wire structures exchanged with Meta on the Flow data endpoint, plus the
//! classification of decrypted request bodies.

use crate::consts;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Encrypted body Meta posts to the Flow endpoint
///
/// Fields are optional on the wire so that a missing one surfaces as a
/// malformed payload rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FlowEncryptedRequestPayload {
    /// RSA-OAEP encrypted AES-128 key (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_aes_key: Option<String>,
    /// AES-GCM ciphertext followed by the 16 byte tag (base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_flow_data: Option<String>,
    /// Request IV (base64, 16 bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_vector: Option<String>,
}

/// Kind of a decrypted Flow request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRequestKind {
    Ping,
    ErrorNotification,
    DataExchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    Ping,
    Init,
    Back,
    DataExchange,
}

fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

fn is_ping(body: &Value) -> bool {
    str_field(body, "action") == Some("ping")
}

fn is_error_notification(body: &Value) -> bool {
    let action_matches = matches!(str_field(body, "action"), Some("data_exchange" | "init"));
    let data_matches = body.get("data").and_then(Value::as_object).is_some_and(|data| {
        data.get("error").is_some_and(Value::is_string)
            && data.get("error_message").is_some_and(Value::is_string)
    });

    action_matches
        && str_field(body, "flow_token").is_some()
        && str_field(body, "screen").is_some()
        && data_matches
}

fn is_data_exchange(body: &Value) -> bool {
    let Some(action) = str_field(body, "action") else {
        return false;
    };
    if !matches!(action, "data_exchange" | "init" | "back") {
        return false;
    }

    let screen_matches = match body.get("screen") {
        None => true,
        Some(Value::String(screen)) => screen != consts::FLOW_SUCCESS_SCREEN,
        Some(_) => false,
    };

    str_field(body, "version") == Some(consts::FLOW_DATA_API_VERSION)
        && str_field(body, "flow_token").is_some()
        && screen_matches
        && (action == "data_exchange" || body.get("data").is_some())
}

/// Classifies a decrypted Flow request body.
///
/// Checks run in a fixed order (ping, error notification, data exchange), so a
/// body never belongs to more than one kind. `None` means the body is not a
/// valid Flow request and must be rejected.
pub fn classify_flow_request(body: &Value) -> Option<FlowRequestKind> {
    if is_ping(body) {
        Some(FlowRequestKind::Ping)
    } else if is_error_notification(body) {
        Some(FlowRequestKind::ErrorNotification)
    } else if is_data_exchange(body) {
        Some(FlowRequestKind::DataExchange)
    } else {
        None
    }
}

pub fn is_flow_ping_request(body: &Value) -> bool {
    classify_flow_request(body) == Some(FlowRequestKind::Ping)
}

pub fn is_flow_data_exchange_request(body: &Value) -> bool {
    classify_flow_request(body) == Some(FlowRequestKind::DataExchange)
}

pub fn is_flow_error_request(body: &Value) -> bool {
    classify_flow_request(body) == Some(FlowRequestKind::ErrorNotification)
}

/// Health check sent by Meta
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlowPingRequest {
    /// Not validated for pings, kept as sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    pub action: FlowAction,
}

/// Screen navigation or form submission
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlowDataExchangeRequest {
    pub version: String,
    pub action: FlowAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub flow_token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlowErrorData {
    pub error: String,
    pub error_message: String,
}

/// Client-side error reported after a previous endpoint response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlowErrorNotification {
    /// Not validated for error notifications, kept as sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    pub action: FlowAction,
    pub flow_token: String,
    pub screen: String,
    pub data: FlowErrorData,
}

/// A classified, typed Flow request
#[derive(Debug, Clone, PartialEq)]
pub enum FlowRequest {
    Ping(FlowPingRequest),
    DataExchange(FlowDataExchangeRequest),
    ErrorNotification(FlowErrorNotification),
}

impl FlowRequest {
    /// Classifies `body` and converts it into the matching typed request
    pub fn from_value(body: Value) -> Option<Self> {
        match classify_flow_request(&body)? {
            FlowRequestKind::Ping => serde_json::from_value(body).ok().map(Self::Ping),
            FlowRequestKind::DataExchange => {
                serde_json::from_value(body).ok().map(Self::DataExchange)
            }
            FlowRequestKind::ErrorNotification => {
                serde_json::from_value(body).ok().map(Self::ErrorNotification)
            }
        }
    }

    pub fn kind(&self) -> FlowRequestKind {
        match self {
            Self::Ping(_) => FlowRequestKind::Ping,
            Self::DataExchange(_) => FlowRequestKind::DataExchange,
            Self::ErrorNotification(_) => FlowRequestKind::ErrorNotification,
        }
    }

    pub fn flow_token(&self) -> Option<&str> {
        match self {
            Self::Ping(_) => None,
            Self::DataExchange(request) => Some(&request.flow_token),
            Self::ErrorNotification(notification) => Some(&notification.flow_token),
        }
    }
}

/// Plaintext response returned to Meta (encrypted before sending)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlowResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub data: Value,
}

impl FlowResponse {
    /// Answer to a ping
    pub fn health_check() -> Self {
        Self {
            screen: None,
            data: json!({ "status": "active" }),
        }
    }

    /// Answer to an error notification
    pub fn acknowledge_error() -> Self {
        Self {
            screen: None,
            data: json!({ "acknowledged": true }),
        }
    }

    /// Navigates the user to `screen` with `data` as its input
    pub fn next_screen(screen: impl Into<String>, data: Value) -> Self {
        Self {
            screen: Some(screen.into()),
            data,
        }
    }

    /// Completes the flow, sending `params` back to the chat with the flow token
    pub fn close_flow(flow_token: &str, params: Value) -> Self {
        let mut params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        params.insert("flow_token".into(), Value::String(flow_token.to_string()));

        Self {
            screen: Some(consts::FLOW_SUCCESS_SCREEN.to_string()),
            data: json!({ "extension_message_response": { "params": params } }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(body: &Value) -> [bool; 3] {
        [
            is_flow_ping_request(body),
            is_flow_data_exchange_request(body),
            is_flow_error_request(body),
        ]
    }

    #[test]
    fn test_ping_request() {
        let body = json!({"action": "ping"});
        assert_eq!(kinds(&body), [true, false, false]);
    }

    #[test]
    fn test_data_exchange_without_data() {
        let body = json!({"version": "3.0", "action": "data_exchange", "flow_token": "tok1", "data": {}});
        assert_eq!(kinds(&body), [false, true, false]);

        let no_data = json!({"version": "3.0", "action": "data_exchange", "flow_token": "tok1"});
        assert!(is_flow_data_exchange_request(&no_data));
    }

    #[test]
    fn test_init_and_back_require_data() {
        let init = json!({"version": "3.0", "action": "init", "flow_token": "tok1"});
        assert_eq!(classify_flow_request(&init), None);

        let back = json!({"version": "3.0", "action": "back", "flow_token": "tok1", "data": {}});
        assert_eq!(classify_flow_request(&back), Some(FlowRequestKind::DataExchange));
    }

    #[test]
    fn test_data_exchange_rejections() {
        let wrong_version = json!({"version": "2.1", "action": "data_exchange", "flow_token": "t"});
        let success_screen = json!({"version": "3.0", "action": "data_exchange", "flow_token": "t", "screen": "SUCCESS"});
        let numeric_token = json!({"version": "3.0", "action": "data_exchange", "flow_token": 7});
        let numeric_screen = json!({"version": "3.0", "action": "data_exchange", "flow_token": "t", "screen": 3});

        for body in [wrong_version, success_screen, numeric_token, numeric_screen] {
            assert_eq!(classify_flow_request(&body), None, "{body}");
        }
    }

    #[test]
    fn test_error_notification_is_exclusive() {
        let body = json!({
            "version": "3.0",
            "action": "data_exchange",
            "flow_token": "tok1",
            "screen": "APPOINTMENT",
            "data": {"error": "invalid_date", "error_message": "Date is in the past"}
        });
        assert_eq!(kinds(&body), [false, false, true]);
    }

    #[test]
    fn test_error_notification_requires_string_fields() {
        let body = json!({
            "action": "init",
            "flow_token": "tok1",
            "screen": "APPOINTMENT",
            "data": {"error": "invalid_date", "error_message": 5}
        });
        assert!(!is_flow_error_request(&body));
    }

    #[test]
    fn test_unclassified_body() {
        for body in [json!({}), json!({"action": "complete"}), json!([1, 2]), json!("ping")] {
            assert_eq!(kinds(&body), [false, false, false]);
            assert!(FlowRequest::from_value(body).is_none());
        }
    }

    #[test]
    fn test_flow_request_from_value() {
        let request = FlowRequest::from_value(json!({
            "version": "3.0",
            "action": "init",
            "flow_token": "tok1",
            "screen": "WELCOME",
            "data": {"name": "Ada"}
        }))
        .unwrap();

        assert_eq!(request.kind(), FlowRequestKind::DataExchange);
        assert_eq!(request.flow_token(), Some("tok1"));
        let FlowRequest::DataExchange(request) = request else {
            panic!("expected data exchange");
        };
        assert_eq!(request.action, FlowAction::Init);
        assert_eq!(request.screen.as_deref(), Some("WELCOME"));
    }

    #[test]
    fn test_every_classified_body_converts() {
        let bodies = [
            json!({"action": "ping"}),
            json!({"action": "ping", "version": 3}),
            json!({"action": "ping", "version": null, "extra": [1]}),
            json!({
                "version": 3.0,
                "action": "init",
                "flow_token": "tok1",
                "screen": "SUCCESS",
                "data": {"error": "e", "error_message": "m", "extra": true}
            }),
            json!({"version": "3.0", "action": "data_exchange", "flow_token": "tok1", "data": null}),
            json!({"version": "3.0", "action": "back", "flow_token": "tok1", "data": 5}),
        ];

        for body in bodies {
            let kind = classify_flow_request(&body).unwrap();
            let request = FlowRequest::from_value(body.clone());
            assert_eq!(request.map(|request| request.kind()), Some(kind), "{body}");
        }
    }

    #[test]
    fn test_close_flow_response_shape() {
        let response = FlowResponse::close_flow("tok1", json!({"order_id": "A-1"}));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "screen": "SUCCESS",
                "data": {"extension_message_response": {"params": {"order_id": "A-1", "flow_token": "tok1"}}}
            })
        );
    }

    #[test]
    fn test_health_check_response_shape() {
        assert_eq!(
            serde_json::to_value(FlowResponse::health_check()).unwrap(),
            json!({"data": {"status": "active"}})
        );
    }
}
