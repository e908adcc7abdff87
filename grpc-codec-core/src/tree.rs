//! # Generic Field Tree
//!
//! The schema-agnostic output of the decoder: a [`Message`] maps field names to [`Value`]s, and a
//! value is either a simple string, an ordered list of values, or a nested message.
//!
//! ## Conversion rules
//!
//! [`convert`] rewrites a [`DecodedMessage`] recursively:
//!
//! * a nested message becomes [`Value::Message`];
//! * a repeated field becomes [`Value::List`], its elements classified with the same rules and
//!   kept in order;
//! * anything else becomes [`Value::Simple`] holding the canonical string form of the scalar.
//!
//! Map fields get no special treatment: they are lists of `{key, value}` messages. Encoders omit
//! an entry's key or value when it holds the default, so both are always filled in.
//!
//! ## Canonical scalar strings
//!
//! | Protobuf type         | Rendering                                        |
//! |-----------------------|--------------------------------------------------|
//! | integers and floats   | `Display` (`42`, `-7`, `1.5`, `NaN`)             |
//! | `bool`                | `true` / `false`                                 |
//! | `string`              | verbatim                                         |
//! | `bytes`               | standard base64 with padding                     |
//! | enums                 | the value name, or the number if it is not known |
use crate::wire::{DecodedField, DecodedMessage, DecodedValue};
use base64::{Engine, engine::general_purpose::STANDARD};
use prost_reflect::{Kind, Value as ReflectValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A generic message: field name to value.
///
/// Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    pub fields: BTreeMap<String, Value>,
}

/// A field value of a generic [`Message`].
///
/// Serializes as a JSON string, array or object respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Simple(String),
    List(Vec<Value>),
    Message(Message),
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Message {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Value {
    pub fn as_simple(&self) -> Option<&str> {
        match self {
            Value::Simple(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Simple(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Simple(value)
    }
}

impl From<Message> for Value {
    fn from(value: Message) -> Self {
        Value::Message(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Emit declared fields missing from the payload with their default value.
    ///
    /// Only fields without presence tracking are affected: scalars get their default string,
    /// repeated and map fields an empty list. Message fields, `oneof` members and explicitly
    /// `optional` fields stay absent.
    pub include_default_values: bool,
}

/// Converts a decoded message into a generic [`Message`].
pub fn convert(decoded: &DecodedMessage, options: &ConvertOptions) -> Message {
    let mut message: Message = decoded
        .fields()
        .map(|field| (field.descriptor.name(), convert_field(field, options)))
        .collect();

    let map_entry = decoded.descriptor().is_map_entry();

    if options.include_default_values || map_entry {
        for field in decoded.descriptor().fields() {
            if decoded.get(field.number()).is_some() || (field.supports_presence() && !map_entry) {
                continue;
            }
            let kind = field.kind();
            let value = if field.is_list() || field.is_map() {
                Value::List(Vec::new())
            } else if let Kind::Message(_) = kind {
                Value::Message(Message::new())
            } else {
                Value::Simple(render_scalar(
                    &kind,
                    &ReflectValue::default_value_for_field(&field),
                ))
            };
            message.insert(field.name(), value);
        }
    }

    message
}

fn convert_field(field: &DecodedField, options: &ConvertOptions) -> Value {
    convert_value(&field.descriptor.kind(), &field.value, options)
}

fn convert_value(kind: &Kind, value: &DecodedValue, options: &ConvertOptions) -> Value {
    match value {
        DecodedValue::Message(nested) => Value::Message(convert(nested, options)),
        DecodedValue::List(values) => Value::List(
            values
                .iter()
                .map(|v| convert_value(kind, v, options))
                .collect(),
        ),
        DecodedValue::Scalar(scalar) => Value::Simple(render_scalar(kind, scalar)),
    }
}

/// Renders a scalar in its canonical string form.
pub fn render_scalar(kind: &Kind, value: &ReflectValue) -> String {
    match value {
        ReflectValue::Bool(v) => v.to_string(),
        ReflectValue::I32(v) => v.to_string(),
        ReflectValue::I64(v) => v.to_string(),
        ReflectValue::U32(v) => v.to_string(),
        ReflectValue::U64(v) => v.to_string(),
        ReflectValue::F32(v) => v.to_string(),
        ReflectValue::F64(v) => v.to_string(),
        ReflectValue::String(v) => v.clone(),
        ReflectValue::Bytes(v) => STANDARD.encode(v),
        ReflectValue::EnumNumber(number) => kind
            .as_enum()
            .and_then(|e| e.get_value(*number))
            .map(|v| v.name().to_string())
            .unwrap_or_else(|| number.to_string()),
        // Never produced by the wire reader for scalar fields.
        ReflectValue::Message(_) | ReflectValue::List(_) | ReflectValue::Map(_) => String::new(),
    }
}
