//! Request and response envelopes for the editor REST protocol.
//!
//! Responses always travel as HTTP 200; the outcome is the `status` field
//! of the envelope. Bodies start with [`XSSI_PREFIX`] so they cannot be
//! evaluated as a script from another origin.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use courseware_common::JsonMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Guard prepended to every JSON response body.
pub const XSSI_PREFIX: &str = ")]}'\n";

/// Strip the XSSI guard, if present.
pub fn strip_xssi_prefix(body: &str) -> &str {
    body.strip_prefix(XSSI_PREFIX).unwrap_or(body)
}

/// Body of a PUT, carried in the `request` form field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorRequest {
    /// Key of the item being updated; absent for new items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    /// The attribute mapping, normally as a JSON-encoded string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsrf_token: Option<String>,
}

impl EditorRequest {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_xssi_prefix(raw))
    }

    /// Build a request for `payload`, the way the form front end does.
    pub fn new(key: Option<&str>, payload: &JsonMap, xsrf_token: &str) -> Self {
        Self {
            key: key.map(|k| Value::String(k.to_string())),
            payload: Some(Value::String(Value::Object(payload.clone()).to_string())),
            xsrf_token: Some(xsrf_token.to_string()),
        }
    }

    /// The item key as a string. Empty strings and null mean "no key".
    pub fn key(&self) -> Option<String> {
        match self.key.as_ref()? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Decode the payload into a mapping.
    pub fn payload_map(&self) -> Result<JsonMap, String> {
        let decoded = match &self.payload {
            None => return Err("Missing payload".to_string()),
            Some(Value::String(encoded)) => serde_json::from_str::<Value>(encoded)
                .map_err(|e| format!("Payload is not valid JSON: {}", e))?,
            Some(other) => other.clone(),
        };
        match decoded {
            Value::Object(map) => Ok(map),
            _ => Err("Payload must be a JSON object".to_string()),
        }
    }
}

/// The response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonResponse {
    pub status: u16,
    pub message: String,
    /// JSON-encoded mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsrf_token: Option<String>,
}

impl JsonResponse {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: None,
            xsrf_token: None,
        }
    }

    /// Attach a payload. An empty mapping is left out of the envelope.
    pub fn with_payload(mut self, payload: JsonMap) -> Self {
        if !payload.is_empty() {
            self.payload = Some(Value::Object(payload).to_string());
        }
        self
    }

    pub fn with_xsrf_token(mut self, token: String) -> Self {
        self.xsrf_token = Some(token);
        self
    }

    /// The decoded payload, if any.
    pub fn payload_map(&self) -> Option<JsonMap> {
        let encoded = self.payload.as_deref()?;
        match serde_json::from_str(encoded) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Serialized body including the XSSI guard.
    pub fn body(&self) -> String {
        let json = serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"status":500,"message":"Server error."}"#.to_string());
        format!("{}{}", XSSI_PREFIX, json)
    }

    /// Parse a body produced by [`JsonResponse::body`].
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_xssi_prefix(body))
    }
}

/// Payload naming the item a response is about.
pub fn key_payload(key: Option<&str>) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert(
        "key".to_string(),
        key.map(|k| Value::String(k.to_string())).unwrap_or(Value::Null),
    );
    map
}

impl IntoResponse for JsonResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
                (header::CONTENT_DISPOSITION, "attachment"),
            ],
            self.body(),
        )
            .into_response()
    }
}
