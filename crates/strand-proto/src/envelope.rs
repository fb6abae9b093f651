//! Protocol envelope and outbound message constructors.
//!
//! One [`Envelope`] struct covers both directions of the wire. Inbound frames
//! decode into it with unknown fields ignored; outbound frames are built with
//! the constructors below and serialize with absent fields omitted, matching
//! the server dialect byte for byte.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ProtocolError;
use crate::reserved;

/// One decoded protocol message.
///
/// An envelope carries either a reply (`rid`, no `event`) or an event name
/// (`event`, optionally with `cid` when the sender expects an
/// acknowledgment) — never both.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// User event/channel name or a reserved protocol name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Opaque payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Call id of an outbound message expecting a reply, or of an inbound
    /// event the server wants acknowledged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<u64>,
    /// Call id this envelope answers. Present only on replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rid: Option<u64>,
    /// Remote failure attached to a reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Envelope {
    /// Decode an envelope from a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    /// Encode this envelope into a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Handshake envelope carrying the current auth token (or `null`).
    pub fn handshake(auth_token: Option<&str>, cid: u64) -> Self {
        Self {
            event: Some(reserved::HANDSHAKE.into()),
            data: Some(json!({ "authToken": auth_token })),
            cid: Some(cid),
            ..Self::default()
        }
    }

    /// Event emission, acknowledged or not depending on how `cid` is used.
    pub fn emit(event: &str, data: Value, cid: u64) -> Self {
        Self {
            event: Some(event.into()),
            data: Some(data),
            cid: Some(cid),
            ..Self::default()
        }
    }

    /// Channel subscription request.
    pub fn subscribe(channel: &str, cid: u64) -> Self {
        Self {
            event: Some(reserved::SUBSCRIBE.into()),
            data: Some(json!({ "channel": channel })),
            cid: Some(cid),
            ..Self::default()
        }
    }

    /// Channel unsubscription request. The dialect sends the bare channel
    /// name as payload here, unlike `#subscribe`.
    pub fn unsubscribe(channel: &str, cid: u64) -> Self {
        Self {
            event: Some(reserved::UNSUBSCRIBE.into()),
            data: Some(Value::String(channel.into())),
            cid: Some(cid),
            ..Self::default()
        }
    }

    /// Channel publication.
    pub fn publish(channel: &str, data: Value, cid: u64) -> Self {
        Self {
            event: Some(reserved::PUBLISH.into()),
            data: Some(json!({ "channel": channel, "data": data })),
            cid: Some(cid),
            ..Self::default()
        }
    }

    /// Reply acknowledging an inbound event that carried `cid`.
    pub fn ack_reply(cid: u64, error: Option<Value>, data: Option<Value>) -> Self {
        Self {
            rid: Some(cid),
            data,
            error,
            ..Self::default()
        }
    }

    /// Read the authentication status out of a handshake reply payload.
    ///
    /// Absent or malformed fields read as not authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.get("isAuthenticated"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Read the token out of a `#setAuthToken` payload.
    pub fn auth_token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("token"))
            .and_then(Value::as_str)
    }
}

/// Channel/data pair carried by a `#publish` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishPayload {
    /// Target channel name.
    pub channel: String,
    /// Published payload.
    #[serde(default)]
    pub data: Value,
}

impl PublishPayload {
    /// Decode the pair from a `#publish` envelope's payload.
    pub fn from_data(data: Option<&Value>) -> Result<Self, ProtocolError> {
        let data = data.ok_or(ProtocolError::MissingPublishPayload)?;
        serde_json::from_value(data.clone()).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_wire_shape() {
        let frame = Envelope::handshake(Some("tok"), 1).encode().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "#handshake");
        assert_eq!(v["data"]["authToken"], "tok");
        assert_eq!(v["cid"], 1);
        assert!(v.get("rid").is_none());
    }

    #[test]
    fn handshake_without_token_sends_null() {
        let frame = Envelope::handshake(None, 1).encode().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["data"]["authToken"], Value::Null);
    }

    #[test]
    fn emit_wire_shape() {
        let frame = Envelope::emit("chat", json!({"msg": "hi"}), 4).encode().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "chat");
        assert_eq!(v["data"]["msg"], "hi");
        assert_eq!(v["cid"], 4);
    }

    #[test]
    fn subscribe_wraps_channel() {
        let frame = Envelope::subscribe("news", 2).encode().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "#subscribe");
        assert_eq!(v["data"]["channel"], "news");
    }

    #[test]
    fn unsubscribe_sends_bare_channel_name() {
        let frame = Envelope::unsubscribe("news", 3).encode().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "#unsubscribe");
        assert_eq!(v["data"], "news");
    }

    #[test]
    fn publish_wire_shape() {
        let frame = Envelope::publish("news", json!(42), 5).encode().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "#publish");
        assert_eq!(v["data"]["channel"], "news");
        assert_eq!(v["data"]["data"], 42);
    }

    #[test]
    fn ack_reply_carries_rid_not_event() {
        let frame = Envelope::ack_reply(7, None, Some(json!({"ok": true})))
            .encode()
            .unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["rid"], 7);
        assert_eq!(v["data"]["ok"], true);
        assert!(v.get("event").is_none());
        assert!(v.get("error").is_none());
    }

    #[test]
    fn ack_reply_with_error() {
        let frame = Envelope::ack_reply(7, Some(json!({"message": "denied"})), None)
            .encode()
            .unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["error"]["message"], "denied");
        assert!(v.get("data").is_none());
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let env = Envelope::decode(r#"{"rid":3,"data":"pong","pingTimeout":20000}"#).unwrap();
        assert_eq!(env.rid, Some(3));
        assert_eq!(env.data, Some(json!("pong")));
    }

    #[test]
    fn decode_rejects_malformed_frame() {
        assert!(Envelope::decode("{not json").is_err());
    }

    #[test]
    fn is_authenticated_reads_payload() {
        let env = Envelope::decode(r#"{"rid":1,"data":{"id":"x","isAuthenticated":true}}"#).unwrap();
        assert!(env.is_authenticated());
    }

    #[test]
    fn is_authenticated_defaults_false() {
        let env = Envelope::decode(r#"{"rid":1,"data":{"id":"x"}}"#).unwrap();
        assert!(!env.is_authenticated());
        let empty = Envelope::decode(r#"{"rid":1}"#).unwrap();
        assert!(!empty.is_authenticated());
    }

    #[test]
    fn auth_token_extraction() {
        let env =
            Envelope::decode(r##"{"event":"#setAuthToken","data":{"token":"abc"}}"##).unwrap();
        assert_eq!(env.auth_token(), Some("abc"));
        let missing = Envelope::decode(r##"{"event":"#setAuthToken","data":{}}"##).unwrap();
        assert_eq!(missing.auth_token(), None);
    }

    #[test]
    fn publish_payload_decodes_pair() {
        let env = Envelope::decode(
            r##"{"event":"#publish","data":{"channel":"news","data":{"headline":"hi"}}}"##,
        )
        .unwrap();
        let payload = PublishPayload::from_data(env.data.as_ref()).unwrap();
        assert_eq!(payload.channel, "news");
        assert_eq!(payload.data["headline"], "hi");
    }

    #[test]
    fn publish_payload_missing_data_is_an_error() {
        assert!(PublishPayload::from_data(None).is_err());
    }

    #[test]
    fn publish_payload_data_defaults_to_null() {
        let payload = PublishPayload::from_data(Some(&json!({"channel": "c"}))).unwrap();
        assert_eq!(payload.data, Value::Null);
    }
}
