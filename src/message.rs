//! DIDComm v2 plaintext messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One message as handed to the envelope packer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Fresh UUID v4 per message.
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub from: String,
    pub to: Vec<String>,
    /// Unix seconds.
    pub created_time: i64,
    /// Protocol-specific fields; always a JSON object.
    pub body: Value,
}

impl Message {
    pub fn new(message_type: impl Into<String>, body: Value, from: impl Into<String>, to: impl Into<String>) -> Self {
        let body = match body {
            Value::Object(_) => body,
            Value::Null => Value::Object(Default::default()),
            other => serde_json::json!({ "content": other }),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            from: from.into(),
            to: vec![to.into()],
            created_time: chrono::Utc::now().timestamp(),
            body,
        }
    }

    /// Whether `did` is one of the recipients.
    pub fn is_addressed_to(&self, did: &str) -> bool {
        self.to.iter().any(|t| t == did)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_fresh() {
        let a = Message::new("t", json!({}), "did:a", "did:b");
        let b = Message::new("t", json!({}), "did:a", "did:b");
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn single_recipient() {
        let m = Message::new("t", json!({"k": 1}), "did:a", "did:b");
        assert_eq!(m.to, ["did:b"]);
        assert!(m.is_addressed_to("did:b"));
        assert!(!m.is_addressed_to("did:a"));
    }

    #[test]
    fn body_is_always_an_object() {
        assert_eq!(Message::new("t", Value::Null, "a", "b").body, json!({}));
        assert_eq!(Message::new("t", json!("hi"), "a", "b").body, json!({"content": "hi"}));
    }

    #[test]
    fn serializes_type_field() {
        let m = Message::new("https://didcomm.org/basicmessage/2.0/message", json!({}), "a", "b");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["type"], "https://didcomm.org/basicmessage/2.0/message");
        assert!(v.get("message_type").is_none());
    }
}
