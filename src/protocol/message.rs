//! # Message Model
//!
//! Typed envelope for every unit of wire traffic, with one builder per
//! message kind.
//!
//! The builders are the single source of truth for payload shape: encoder
//! and decoder can never drift because both sides go through the same
//! constructors and the same serde derive. The envelope is serialized as
//! UTF-8 JSON inside a length-prefixed frame (see [`crate::protocol::codec`]).
//!
//! Unknown `type` tags decode successfully with their payload preserved;
//! rejecting them is an application-layer decision made by the connection
//! handler, not the codec.

use crate::config::PROTOCOL_VERSION;
use crate::error::{constants, BrokerError, Result};
use crate::utils::time;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Known message type tags.
///
/// The set is open: peers may send tags outside this list and the envelope
/// still decodes. The connection handler answers unrecognized tags with an
/// `error{400}` response.
pub mod kind {
    pub const AUTH_REQUEST: &str = "auth_req";
    pub const AUTH_RESPONSE: &str = "auth_res";
    pub const SCREEN_CAPTURE: &str = "screen_cap";
    pub const MOUSE_EVENT: &str = "mouse_evt";
    pub const KEY_EVENT: &str = "key_evt";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const DISCONNECT: &str = "disconnect";
    pub const ERROR: &str = "error";
    pub const NOTIFICATION: &str = "notification";
}

/// Protocol message envelope.
///
/// `session_id` is `None` only for pre-authentication traffic (an
/// `auth_req`, or an unauthenticated `ping`). `timestamp` is stringified
/// Unix milliseconds and is informative only; the broker never bases expiry
/// decisions on peer-supplied timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub data: Map<String, Value>,
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl Message {
    /// Construct a message with an arbitrary kind tag.
    ///
    /// Prefer the per-kind builders below; this exists for forwarding
    /// unknown-but-valid traffic and for tests.
    pub fn new(kind: impl Into<String>, session_id: Option<String>, data: Map<String, Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            kind: kind.into(),
            session_id,
            timestamp: time::timestamp_string(),
            data,
        }
    }

    /// Serialize to the UTF-8 JSON wire text.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| BrokerError::EncodeError(e.to_string()))
    }

    /// Parse from wire bytes, enforcing the non-empty `type` invariant.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let msg: Self = serde_json::from_slice(bytes)
            .map_err(|e| BrokerError::MalformedFrame(e.to_string()))?;

        if msg.kind.is_empty() {
            return Err(BrokerError::MalformedFrame(
                constants::ERR_EMPTY_MESSAGE_TYPE.to_string(),
            ));
        }

        Ok(msg)
    }

    // ---- builders -------------------------------------------------------

    /// Authentication request. `password_digest` is a digest, never a
    /// plaintext password.
    pub fn auth_request(username: &str, password_digest: &str, device_name: Option<&str>) -> Self {
        let mut data = Map::new();
        data.insert("username".into(), Value::from(username));
        data.insert("password".into(), Value::from(password_digest));
        data.insert(
            "device_name".into(),
            Value::from(device_name.unwrap_or("Unknown Device")),
        );
        Self::new(kind::AUTH_REQUEST, None, data)
    }

    /// Authentication response; `session_id` rides on the envelope when
    /// `success`.
    pub fn auth_response(
        success: bool,
        session_id: Option<String>,
        message: &str,
        server_nonce: Option<&str>,
    ) -> Self {
        let mut data = Map::new();
        data.insert("success".into(), Value::from(success));
        data.insert("message".into(), Value::from(message));
        data.insert(
            "server_nonce".into(),
            server_nonce.map(Value::from).unwrap_or(Value::Null),
        );
        Self::new(kind::AUTH_RESPONSE, session_id, data)
    }

    /// Screen capture frame. The broker relays or acknowledges these; it
    /// never interprets the image bytes.
    pub fn screen_capture(
        session_id: &str,
        image: &[u8],
        compression: &str,
        width: u32,
        height: u32,
    ) -> Self {
        let mut data = Map::new();
        data.insert("image".into(), Value::from(BASE64.encode(image)));
        data.insert("compression".into(), Value::from(compression));
        data.insert("width".into(), Value::from(width));
        data.insert("height".into(), Value::from(height));
        Self::new(kind::SCREEN_CAPTURE, Some(session_id.to_string()), data)
    }

    /// Pointer event (`button`: "left", "right", "middle", "scroll",
    /// "move"; `action`: "press"/"release", absent for move/scroll).
    pub fn mouse_event(session_id: &str, x: i64, y: i64, button: &str, action: Option<&str>) -> Self {
        let mut data = Map::new();
        data.insert("x".into(), Value::from(x));
        data.insert("y".into(), Value::from(y));
        data.insert("button".into(), Value::from(button));
        data.insert(
            "action".into(),
            action.map(Value::from).unwrap_or(Value::Null),
        );
        Self::new(kind::MOUSE_EVENT, Some(session_id.to_string()), data)
    }

    /// Keyboard event (`action`: "press" or "release").
    pub fn key_event(session_id: &str, key: &str, action: &str) -> Self {
        let mut data = Map::new();
        data.insert("key".into(), Value::from(key));
        data.insert("action".into(), Value::from(action));
        Self::new(kind::KEY_EVENT, Some(session_id.to_string()), data)
    }

    /// Keepalive probe. Valid both before authentication (no session) and
    /// after (session attached).
    pub fn ping(session_id: Option<String>) -> Self {
        let mut data = Map::new();
        data.insert("timestamp".into(), Value::from(time::timestamp_string()));
        Self::new(kind::PING, session_id, data)
    }

    /// Keepalive answer.
    pub fn pong(session_id: Option<String>) -> Self {
        let mut data = Map::new();
        data.insert("timestamp".into(), Value::from(time::timestamp_string()));
        Self::new(kind::PONG, session_id, data)
    }

    /// Application-level error (HTTP-style codes: 400 bad request/unknown
    /// type, 401 invalid/expired session).
    pub fn error(session_id: Option<String>, error_code: u16, message: &str) -> Self {
        let mut data = Map::new();
        data.insert("error_code".into(), Value::from(error_code));
        data.insert("message".into(), Value::from(message));
        Self::new(kind::ERROR, session_id, data)
    }

    /// Orderly teardown notice.
    pub fn disconnect(session_id: Option<String>, reason: &str) -> Self {
        let mut data = Map::new();
        data.insert("reason".into(), Value::from(reason));
        Self::new(kind::DISCONNECT, session_id, data)
    }

    /// Free-form server-to-client notice. Carried end to end; the broker
    /// itself does not dispatch on it.
    pub fn notification(session_id: Option<String>, text: &str) -> Self {
        let mut data = Map::new();
        data.insert("message".into(), Value::from(text));
        Self::new(kind::NOTIFICATION, session_id, data)
    }

    // ---- payload accessors ----------------------------------------------

    /// String payload field, if present and a string.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Boolean payload field.
    pub fn data_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(Value::as_bool)
    }

    /// Integer payload field.
    pub fn data_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip() {
        let msg = Message::auth_request("admin", "digest123", Some("PC-1"));
        let json = msg.to_json().expect("serialize");
        let decoded = Message::from_json(json.as_bytes()).expect("deserialize");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_builders_fix_kind() {
        assert_eq!(Message::ping(None).kind, kind::PING);
        assert_eq!(Message::pong(None).kind, kind::PONG);
        assert_eq!(
            Message::error(None, 400, "bad").kind,
            kind::ERROR
        );
        assert_eq!(
            Message::disconnect(Some("s".into()), "OK").kind,
            kind::DISCONNECT
        );
    }

    #[test]
    fn test_auth_request_shape() {
        let msg = Message::auth_request("alice", "abcd", None);
        assert_eq!(msg.data_str("username"), Some("alice"));
        assert_eq!(msg.data_str("password"), Some("abcd"));
        assert_eq!(msg.data_str("device_name"), Some("Unknown Device"));
        assert_eq!(msg.session_id, None);
    }

    #[test]
    fn test_unknown_kind_decodes() {
        let raw = br#"{"protocol_version":"1.0","type":"future_thing","session_id":null,"timestamp":"0","data":{"x":1}}"#;
        let msg = Message::from_json(raw).expect("unknown kinds are valid envelopes");
        assert_eq!(msg.kind, "future_thing");
        assert_eq!(msg.data_i64("x"), Some(1));
    }

    #[test]
    fn test_empty_kind_rejected() {
        let raw = br#"{"protocol_version":"1.0","type":"","timestamp":"0","data":{}}"#;
        assert!(matches!(
            Message::from_json(raw),
            Err(BrokerError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_missing_kind_rejected() {
        let raw = br#"{"protocol_version":"1.0","timestamp":"0","data":{}}"#;
        assert!(Message::from_json(raw).is_err());
    }

    #[test]
    fn test_screen_capture_encodes_image() {
        let msg = Message::screen_capture("sess", &[1, 2, 3], "jpeg", 800, 600);
        assert_eq!(msg.data_str("image"), Some("AQID"));
        assert_eq!(msg.data_i64("width"), Some(800));
        assert_eq!(msg.data_i64("height"), Some(600));
    }

    #[test]
    fn test_unversioned_envelope_gets_default() {
        let raw = br#"{"type":"ping","data":{}}"#;
        let msg = Message::from_json(raw).expect("version is advisory");
        assert_eq!(msg.protocol_version, PROTOCOL_VERSION);
    }
}
