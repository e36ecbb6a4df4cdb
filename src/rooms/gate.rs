//! Every inbound frame passes through here before any handler sees it.
//! Unknown events and malformed payloads are treated as hostile: the offender
//! is logged and disconnected, and gets no response.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::messages::{MessageParams, TEXT_MAX};

use super::{
    events::{DialogRequest, EventName, InboundEvent, JoinRequest, SendMessageRequest},
    session::Session,
};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },
    #[error("unexpected event {name:?}")]
    UnknownEvent { name: String, payload: Value },
    #[error("unexpected {} body: {reason}", .event.code())]
    MalformedPayload { event: EventName, payload: Value, reason: String },
}

impl ProtocolViolation {
    fn frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame { reason: reason.into() }
    }
}

/// Parses and validates a text frame without side effects.
pub fn inspect(frame: &str) -> Result<InboundEvent, ProtocolViolation> {
    let value: Value = serde_json::from_str(frame).map_err(|err| ProtocolViolation::frame(err.to_string()))?;
    let Value::Array(mut parts) = value else {
        return Err(ProtocolViolation::frame("expected an [event, payload] array"));
    };
    if parts.len() != 2 {
        return Err(ProtocolViolation::frame(format!("expected 2 elements, got {}", parts.len())));
    }

    let payload = parts.pop().unwrap_or_default();
    let Some(name) = parts.pop().and_then(|name| name.as_str().map(str::to_owned)) else {
        return Err(ProtocolViolation::frame("event name must be a string"));
    };
    let Some(event) = EventName::from_code(&name) else {
        return Err(ProtocolViolation::UnknownEvent { name, payload });
    };

    let parsed = match event {
        EventName::Join => join_body(&payload).map(InboundEvent::Join),
        EventName::SendMessage => send_message_body(&payload).map(InboundEvent::SendMessage),
        EventName::GetMessages => dialog_body(&payload).map(InboundEvent::GetMessages),
        EventName::Read => dialog_body(&payload).map(InboundEvent::Read),
    };
    parsed.map_err(|reason| ProtocolViolation::MalformedPayload { event, payload, reason })
}

/// Lets a well-formed event through. Otherwise logs the violation with the
/// connection's metadata, closes the session and returns `None`.
pub fn screen(session: &Session, frame: &str) -> Option<InboundEvent> {
    match inspect(frame) {
        Ok(event) => Some(event),
        Err(violation) => {
            reject(session, &violation);
            None
        }
    }
}

pub fn reject(session: &Session, violation: &ProtocolViolation) {
    match violation {
        ProtocolViolation::UnknownEvent { name, payload } => error!(
            session = %session.id(),
            peer = %session.peer(),
            "Unexpected event: {name:?}. Body: {payload}"
        ),
        ProtocolViolation::MalformedPayload { event, payload, reason } => error!(
            session = %session.id(),
            peer = %session.peer(),
            "Unexpected {} body: {payload} ({reason})",
            event.code()
        ),
        ProtocolViolation::MalformedFrame { reason } => error!(
            session = %session.id(),
            peer = %session.peer(),
            "Malformed frame: {reason}"
        ),
    }
    session.close();
}

/// `[username]` or `[username | null, token]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum JoinBody {
    ByUsername((String,)),
    ByToken(Option<String>, String),
}

/// `[{from, to, text}, token | null, confirmationHash]`.
#[derive(Deserialize)]
struct SendMessageBody(MessageParams, Option<String>, String);

/// `[targetUserId, token]`.
#[derive(Deserialize)]
struct DialogBody(Uuid, String);

fn body<T: DeserializeOwned>(payload: &Value) -> Result<T, String> {
    T::deserialize(payload).map_err(|err| err.to_string())
}

/// Usernames are plain ASCII letters and digits once trimmed. Length is left to
/// the handshake, which answers it with a reason.
fn username(username: String) -> Result<String, String> {
    if username.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(username)
    } else {
        Err(format!("username {username:?} is not alphanumeric"))
    }
}

fn join_body(payload: &Value) -> Result<JoinRequest, String> {
    Ok(match body::<JoinBody>(payload)? {
        JoinBody::ByUsername((name,)) => JoinRequest {
            username: Some(username(name)?),
            token: None,
        },
        JoinBody::ByToken(name, token) => JoinRequest {
            username: name.map(username).transpose()?,
            token: Some(token),
        },
    })
}

fn send_message_body(payload: &Value) -> Result<SendMessageRequest, String> {
    let SendMessageBody(message, token, confirmation_hash) = body::<SendMessageBody>(payload)?;

    let len = message.text.chars().count();
    if len == 0 || len > TEXT_MAX {
        return Err(format!("text must be 1..={TEXT_MAX} characters"));
    }
    if Uuid::parse_str(&confirmation_hash).is_err() {
        return Err(format!("confirmation hash {confirmation_hash:?} is not a guid"));
    }

    Ok(SendMessageRequest { message, token, confirmation_hash })
}

fn dialog_body(payload: &Value) -> Result<DialogRequest, String> {
    let DialogBody(target_user_id, token) = body::<DialogBody>(payload)?;
    Ok(DialogRequest { target_user_id, token })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn inspect_value(frame: Value) -> Result<InboundEvent, ProtocolViolation> {
        inspect(&frame.to_string())
    }

    #[test]
    fn join_by_username_or_token() {
        assert_eq!(
            inspect_value(json!(["j", ["alice"]])).unwrap(),
            InboundEvent::Join(JoinRequest { username: Some("alice".to_owned()), token: None })
        );
        assert_eq!(
            inspect_value(json!(["j", [null, "tok"]])).unwrap(),
            InboundEvent::Join(JoinRequest { username: None, token: Some("tok".to_owned()) })
        );
    }

    #[test]
    fn username_length_is_left_to_the_handshake() {
        assert!(inspect_value(json!(["j", ["x"]])).is_ok());
        assert!(inspect_value(json!(["j", ["x".repeat(21)]])).is_ok());
    }

    #[test]
    fn malformed_join_bodies() {
        for body in [json!([]), json!([1]), json!([null]), json!(["a", "b", "c"]), json!({"username": "a"})] {
            assert!(
                matches!(inspect_value(json!(["j", body.clone()])), Err(ProtocolViolation::MalformedPayload { .. })),
                "{body} should be refused"
            );
        }
    }

    #[test]
    fn usernames_are_alphanumeric() {
        assert!(inspect_value(json!(["j", ["  Alice42  "]])).is_ok());
        assert!(inspect_value(json!(["j", ["", "tok"]])).is_ok());

        for name in ["<b>x</b> y!", "al ice", "alice_", "ёжик"] {
            assert!(
                matches!(inspect_value(json!(["j", [name]])), Err(ProtocolViolation::MalformedPayload { .. })),
                "{name:?} should be refused"
            );
            assert!(inspect_value(json!(["j", [name, "tok"]])).is_err());
        }
    }

    fn hash() -> String {
        Uuid::now_v7().to_string()
    }

    #[test]
    fn send_message_body_shape() {
        let (from, to, hash) = (Uuid::now_v7(), Uuid::now_v7(), hash());
        let event = inspect_value(json!(["sm", [{"from": from, "to": to, "text": "hi"}, "tok", hash]])).unwrap();
        assert_eq!(
            event,
            InboundEvent::SendMessage(SendMessageRequest {
                message: MessageParams { from, to, text: "hi".to_owned() },
                token: Some("tok".to_owned()),
                confirmation_hash: hash.clone(),
            })
        );

        let without_token = inspect_value(json!(["sm", [{"from": from, "to": to, "text": "hi"}, null, hash]])).unwrap();
        assert!(matches!(without_token, InboundEvent::SendMessage(SendMessageRequest { token: None, .. })));
    }

    #[test]
    fn confirmation_hash_must_be_a_guid() {
        let (from, to) = (Uuid::now_v7(), Uuid::now_v7());
        for hash in ["", "hash-1", "not-a-guid-at-all"] {
            assert!(
                matches!(
                    inspect_value(json!(["sm", [{"from": from, "to": to, "text": "hi"}, "tok", hash]])),
                    Err(ProtocolViolation::MalformedPayload { .. })
                ),
                "{hash:?} should be refused"
            );
        }
    }

    #[test]
    fn send_message_text_bounds() {
        let (from, to, hash) = (Uuid::now_v7(), Uuid::now_v7(), hash());
        let frame = |text: String| json!(["sm", [{"from": from, "to": to, "text": text}, "tok", hash]]);

        assert!(inspect_value(frame("a".repeat(200))).is_ok());
        assert!(inspect_value(frame("a".repeat(201))).is_err());
        assert!(inspect_value(frame(String::new())).is_err());
    }

    #[test]
    fn send_message_rejects_bad_ids_and_extra_fields() {
        let (to, hash) = (Uuid::now_v7(), hash());
        assert!(inspect_value(json!(["sm", [{"from": "nope", "to": to, "text": "hi"}, "tok", hash]])).is_err());
        assert!(inspect_value(json!(["sm", [{"from": to, "to": to, "text": "hi", "admin": true}, "tok", hash]])).is_err());
        assert!(inspect_value(json!(["sm", [{"from": to, "text": "hi"}, "tok", hash]])).is_err());
        assert!(inspect_value(json!(["sm", [{"from": to, "to": to, "text": "hi"}, "tok"]])).is_err());
        assert!(inspect_value(json!(["sm", [{"from": to, "to": to, "text": "hi"}, "tok", hash, "extra"]])).is_err());
    }

    #[test]
    fn dialog_events() {
        let target = Uuid::now_v7();
        assert_eq!(
            inspect_value(json!(["gm", [target, "tok"]])).unwrap(),
            InboundEvent::GetMessages(DialogRequest { target_user_id: target, token: "tok".to_owned() })
        );
        assert!(matches!(inspect_value(json!(["r", [target, "tok"]])).unwrap(), InboundEvent::Read(_)));
        assert!(inspect_value(json!(["r", [target]])).is_err());
    }

    #[test]
    fn unknown_events_and_broken_frames() {
        assert!(matches!(
            inspect_value(json!(["jr", ["alice"]])),
            Err(ProtocolViolation::UnknownEvent { name, .. }) if name == "jr"
        ));
        assert!(matches!(inspect("not json"), Err(ProtocolViolation::MalformedFrame { .. })));
        assert!(matches!(inspect_value(json!({"j": ["alice"]})), Err(ProtocolViolation::MalformedFrame { .. })));
        assert!(matches!(inspect_value(json!([1, ["alice"]])), Err(ProtocolViolation::MalformedFrame { .. })));
        assert!(matches!(inspect_value(json!(["j"])), Err(ProtocolViolation::MalformedFrame { .. })));
    }

    #[tokio::test]
    async fn violation_closes_the_session_silently() {
        let (session, mut rx) = Session::new("127.0.0.1:4000".parse().unwrap());

        assert!(screen(&session, r#"["hack",{"rm":"-rf"}]"#).is_none());

        assert!(session.is_closed());
        assert!(rx.try_recv().is_err());
    }
}
