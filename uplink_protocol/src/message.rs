// Command messages travel as UTF-8 JSON text encoding a flat key/value
// mapping. Two encodings exist for one logical message: the transmitted form
// (free formatting) and the canonical form used for signing and verification
// (stable key order, no whitespace). Signer and verifier must share the
// canonicalization routine byte for byte, which is why it lives here.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::HmacAuthenticator;

pub const FIELD_NAME: &str = "name";
pub const FIELD_COMMAND: &str = "command";
pub const FIELD_ARGS: &str = "args";
pub const FIELD_COUNTER: &str = "counter";
pub const FIELD_HMAC: &str = "hmac";
pub const FIELD_PASSWORD: &str = "password";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("payload is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a flat key/value mapping")]
    NotAMapping,
}

/// Result of coercing the `counter` field to the 16-bit counter space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    Missing,
    /// Present but not an integer in [0, 65535].
    Invalid,
    Value(u16),
}

/// One parsed command message. Keeps the full field mapping so the canonical
/// form can be recomputed independent of incidental wire formatting.
#[derive(Debug, Clone, Default)]
pub struct CommandMessage {
    fields: Map<String, Value>,
}

impl CommandMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &[u8]) -> Result<Self, MessageError> {
        let text = std::str::from_utf8(raw)?;
        match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(MessageError::NotAMapping),
        }
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get(FIELD_NAME).and_then(Value::as_str)
    }

    pub fn command(&self) -> Option<&str> {
        self.fields.get(FIELD_COMMAND).and_then(Value::as_str)
    }

    pub fn password(&self) -> Option<&str> {
        self.fields.get(FIELD_PASSWORD).and_then(Value::as_str)
    }

    pub fn hmac(&self) -> Option<&str> {
        self.fields.get(FIELD_HMAC).and_then(Value::as_str)
    }

    /// Argument tokens. Anything that is not an array of strings degrades to
    /// an empty list rather than an error.
    pub fn args(&self) -> Vec<String> {
        match self.fields.get(FIELD_ARGS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Coerces the counter field. Accepts a JSON integer or a decimal string;
    /// anything outside [0, 65535] is `Invalid`.
    pub fn counter(&self) -> CounterField {
        let raw = match self.fields.get(FIELD_COUNTER) {
            None => return CounterField::Missing,
            Some(v) => v,
        };
        let wide = match raw {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match wide {
            Some(v) if (0..=i64::from(u16::MAX)).contains(&v) => CounterField::Value(v as u16),
            _ => CounterField::Invalid,
        }
    }

    /// The byte-exact text that is signed and verified: every field except
    /// `hmac`, re-serialized with stable key order and no whitespace.
    pub fn canonical_form(&self) -> String {
        let mut fields = self.fields.clone();
        fields.remove(FIELD_HMAC);
        Value::Object(fields).to_string()
    }

    /// Stamps `counter` and attaches the digest over the canonical form.
    pub fn sign(&mut self, authenticator: &HmacAuthenticator, counter: u16) {
        self.insert(FIELD_COUNTER, counter);
        let digest = authenticator.generate(&self.canonical_form(), counter);
        self.insert(FIELD_HMAC, digest);
    }

    /// The transmitted encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        Value::Object(self.fields.clone()).to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_bad_utf8_and_bad_json() {
        assert!(matches!(
            CommandMessage::parse(&[0xff, 0xfe]),
            Err(MessageError::Encoding(_))
        ));
        assert!(matches!(
            CommandMessage::parse(b"not json"),
            Err(MessageError::Json(_))
        ));
        assert!(matches!(
            CommandMessage::parse(b"[1,2,3]"),
            Err(MessageError::NotAMapping)
        ));
    }

    #[test]
    fn args_of_wrong_shape_default_to_empty() {
        let msg = CommandMessage::parse(br#"{"command":"repeat","args":"oops"}"#).unwrap();
        assert!(msg.args().is_empty());

        let msg = CommandMessage::parse(br#"{"command":"repeat","args":["a","b"]}"#).unwrap();
        assert_eq!(msg.args(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn counter_coercion() {
        let at = |raw: &str| CommandMessage::parse(raw.as_bytes()).unwrap().counter();
        assert_eq!(at(r#"{"counter":42}"#), CounterField::Value(42));
        assert_eq!(at(r#"{"counter":"42"}"#), CounterField::Value(42));
        assert_eq!(at(r#"{"counter":65535}"#), CounterField::Value(65535));
        assert_eq!(at(r#"{"counter":70000}"#), CounterField::Invalid);
        assert_eq!(at(r#"{"counter":-1}"#), CounterField::Invalid);
        assert_eq!(at(r#"{"counter":"abc"}"#), CounterField::Invalid);
        assert_eq!(at(r#"{"counter":1.5}"#), CounterField::Invalid);
        assert_eq!(at(r#"{"command":"reset"}"#), CounterField::Missing);
    }

    #[test]
    fn canonical_form_is_stable_and_excludes_hmac() {
        let a = CommandMessage::parse(
            br#"{ "name": "Sat",  "command": "send_joke", "counter": 2, "hmac": "aa" }"#,
        )
        .unwrap();
        let b = CommandMessage::parse(
            br#"{"counter":2,"hmac":"bb","command":"send_joke","name":"Sat"}"#,
        )
        .unwrap();
        assert_eq!(a.canonical_form(), b.canonical_form());
        assert_eq!(
            a.canonical_form(),
            r#"{"command":"send_joke","counter":2,"name":"Sat"}"#
        );
    }

    #[test]
    fn sign_then_parse_verifies_end_to_end() {
        let auth = HmacAuthenticator::new("shared_secret_key");
        let mut msg = CommandMessage::new();
        msg.insert(FIELD_NAME, "Orbit1");
        msg.insert(FIELD_COMMAND, "send_joke");
        msg.sign(&auth, 7);

        let received = CommandMessage::parse(&msg.to_bytes()).unwrap();
        assert_eq!(received.counter(), CounterField::Value(7));
        assert!(auth.verify(
            &received.canonical_form(),
            7,
            received.hmac().unwrap()
        ));
    }
}
