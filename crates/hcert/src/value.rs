//! Canonical claims value model.
//!
//! The CBOR claims payload of a certificate may key its maps with integers,
//! unsigned integers, floats or text, at any nesting depth. Downstream
//! consumers want one uniform, JSON-serialisable shape, so every decoded
//! document is rendered into [`Value`], whose objects are keyed by strings
//! only.

use std::collections::BTreeMap;

use base64::{engine::general_purpose, Engine as _};
use ciborium::value::Value as Cbor;
use serde::{Serialize, Serializer};
use serde_json::Number;

/// A canonical decoded claims value.
///
/// Object keys are always strings, whatever their type in the binary
/// payload; key order is not significant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Borrow the object map, if this value is an object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key on an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }

    /// Borrow the text, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Number(number) => number.serialize(serializer),
            Value::String(text) => serializer.serialize_str(text),
            Value::Sequence(items) => items.serialize(serializer),
            Value::Object(map) => map.serialize(serializer),
        }
    }
}

/// Render a decoded CBOR value into the canonical string-keyed form.
///
/// Map keys are rendered with [`object_key`]; a key of an unsupported type
/// is dropped from its parent object with a diagnostic instead of failing
/// the whole decode. Tags are unwrapped, byte strings become base64 text and
/// non-finite floats degrade to null.
pub(crate) fn canonicalize(raw: Cbor) -> Value {
    match raw {
        Cbor::Null => Value::Null,
        Cbor::Bool(value) => Value::Bool(value),
        Cbor::Integer(value) => integer_value(i128::from(value)),
        Cbor::Float(value) => Number::from_f64(value).map_or(Value::Null, Value::Number),
        Cbor::Text(text) => Value::String(text),
        Cbor::Bytes(bytes) => Value::String(general_purpose::STANDARD.encode(bytes)),
        Cbor::Array(items) => Value::Sequence(items.into_iter().map(canonicalize).collect()),
        Cbor::Map(entries) => {
            let mut object = BTreeMap::new();
            for (key, value) in entries {
                match object_key(&key) {
                    Some(key) => {
                        object.insert(key, canonicalize(value));
                    }
                    None => {
                        tracing::warn!(key = ?key, "dropping claims map key with unsupported type");
                    }
                }
            }
            Value::Object(object)
        }
        Cbor::Tag(_, inner) => canonicalize(*inner),
        _ => Value::Null,
    }
}

/// Render a CBOR map key to its canonical string. Text passes through,
/// integers and floats render in decimal; anything else has no rendering
/// and is dropped by the caller.
fn object_key(key: &Cbor) -> Option<String> {
    match key {
        Cbor::Text(text) => Some(text.clone()),
        Cbor::Integer(value) => Some(i128::from(*value).to_string()),
        Cbor::Float(value) => Some(value.to_string()),
        _ => None,
    }
}

fn integer_value(value: i128) -> Value {
    if let Ok(value) = i64::try_from(value) {
        Value::Number(Number::from(value))
    } else if let Ok(value) = u64::try_from(value) {
        Value::Number(Number::from(value))
    } else {
        Number::from_f64(value as f64).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_heterogeneous_keys_as_strings() {
        let raw = Cbor::Map(vec![
            (Cbor::Integer(1.into()), Cbor::Text("positive".into())),
            (Cbor::Integer((-260).into()), Cbor::Text("negative".into())),
            (Cbor::Text("name".into()), Cbor::Text("textual".into())),
        ]);

        let value = canonicalize(raw);
        let object = value.as_object().expect("canonical object");
        assert_eq!(object.get("1").and_then(Value::as_str), Some("positive"));
        assert_eq!(object.get("-260").and_then(Value::as_str), Some("negative"));
        assert_eq!(object.get("name").and_then(Value::as_str), Some("textual"));
    }

    #[test]
    fn canonicalizes_keys_at_every_nesting_depth() {
        let raw = Cbor::Map(vec![(
            Cbor::Integer(6.into()),
            Cbor::Array(vec![Cbor::Map(vec![(
                Cbor::Integer(5.into()),
                Cbor::Text("deep".into()),
            )])]),
        )]);

        let value = canonicalize(raw);
        let inner = match value.get("6") {
            Some(Value::Sequence(items)) => &items[0],
            other => panic!("expected a sequence under \"6\", got {other:?}"),
        };
        assert_eq!(inner.get("5").and_then(Value::as_str), Some("deep"));
    }

    #[test]
    fn drops_keys_with_unsupported_types() {
        let raw = Cbor::Map(vec![
            (Cbor::Bool(true), Cbor::Text("boolean key".into())),
            (Cbor::Bytes(vec![1, 2]), Cbor::Text("bytes key".into())),
            (Cbor::Text("kept".into()), Cbor::Text("string key".into())),
        ]);

        let value = canonicalize(raw);
        let object = value.as_object().expect("canonical object");
        assert_eq!(object.len(), 1);
        assert_eq!(object.get("kept").and_then(Value::as_str), Some("string key"));
    }

    #[test]
    fn unwraps_tags_and_renders_bytes_as_base64() {
        let raw = Cbor::Map(vec![
            (
                Cbor::Text("issued".into()),
                Cbor::Tag(0, Box::new(Cbor::Text("2026-01-10".into()))),
            ),
            (Cbor::Text("digest".into()), Cbor::Bytes(vec![1, 2, 3])),
        ]);

        let value = canonicalize(raw);
        assert_eq!(value.get("issued").and_then(Value::as_str), Some("2026-01-10"));
        assert_eq!(value.get("digest").and_then(Value::as_str), Some("AQID"));
    }

    #[test]
    fn serializes_to_the_conventional_json_shape() {
        let raw = Cbor::Map(vec![
            (Cbor::Integer(1.into()), Cbor::Text("XCL".into())),
            (Cbor::Integer(6.into()), Cbor::Integer(1757187943.into())),
            (
                Cbor::Text("flags".into()),
                Cbor::Array(vec![Cbor::Bool(true), Cbor::Null]),
            ),
        ]);

        let value = canonicalize(raw);
        assert_eq!(
            serde_json::to_value(&value).expect("serialize claims"),
            json!({"1": "XCL", "6": 1757187943, "flags": [true, null]})
        );
    }
}
