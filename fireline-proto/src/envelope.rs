//! Envelope decode/validate.
//!
//! A frame is a JSON object carrying `type: string` plus whatever fields
//! that type requires. We decode down to a type tag and a field map rather
//! than a fixed struct, since unrecognized types must still pass through
//! (see the dispatcher's "other" row).

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("missing or non-string `type` field")]
    MissingType,
}

/// A decoded frame: its `type` tag and the rest of its fields.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub msg_type: String,
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Decode a single text frame. Does not validate type-specific fields —
    /// only that the frame is a JSON object carrying a string `type`.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut fields) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        let msg_type = match fields.remove("type") {
            Some(Value::String(s)) => s,
            _ => return Err(EnvelopeError::MissingType),
        };
        Ok(Self { msg_type, fields })
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Non-empty string field, the shape §4.1/§4.4 require for `incidentId`,
    /// `responderId`, and `msgId`.
    pub fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.str_field(key).filter(|s| !s.is_empty())
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn msg_id(&self) -> Option<&str> {
        self.non_empty_str("msgId")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_type_and_fields() {
        let env = Envelope::decode(r#"{"type":"CLIENT_HELLO","incidentId":"I1","responderId":"A"}"#)
            .unwrap();
        assert_eq!(env.msg_type, "CLIENT_HELLO");
        assert_eq!(env.non_empty_str("incidentId"), Some("I1"));
    }

    #[test]
    fn rejects_missing_type() {
        let err = Envelope::decode(r#"{"incidentId":"I1"}"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingType));
    }

    #[test]
    fn rejects_non_object() {
        let err = Envelope::decode(r#"[1,2,3]"#).unwrap_err();
        assert!(matches!(err, EnvelopeError::NotAnObject));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = Envelope::decode("not json").unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidJson(_)));
    }

    #[test]
    fn empty_string_is_not_non_empty() {
        let env = Envelope::decode(r#"{"type":"X","msgId":""}"#).unwrap();
        assert_eq!(env.msg_id(), None);
    }
}
