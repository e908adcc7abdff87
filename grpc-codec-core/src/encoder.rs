//! # Message Encoder
//!
//! The way back: a generic [`Message`] is bound to the schema selected by a call path and
//! direction, then serialized to protobuf binary.
//!
//! Every simple value is parsed according to the declared type of its field, using the same
//! canonical forms the decoder renders (see [`crate::tree`]). Map fields are expected as lists of
//! `{key, value}` messages and are written in list order. For any tree produced by the
//! [`MessageDecoder`](crate::MessageDecoder), encoding and decoding again yields the same tree.
use crate::{
    call_path::{CallPath, CallPathError},
    registry::{Direction, LookupError, SharedRegistry},
    tree::{Message, Value},
    wire::{self, DecodedMessage, DecodedValue},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor, Value as ReflectValue};
use std::{fmt::Display, str::FromStr};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Invalid argument: malformed call path")]
    InvalidCallPath(#[from] CallPathError),

    #[error(transparent)]
    NotFound(#[from] LookupError),

    #[error("Field '{field}' is not declared by message '{message}'")]
    UnknownField { message: String, field: String },

    #[error("Field '{field}' expects {expected}")]
    ShapeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidScalar {
        field: String,
        value: String,
        reason: String,
    },
}

/// Encodes generic messages into binary payloads.
#[derive(Debug, Clone)]
pub struct MessageEncoder {
    registry: SharedRegistry,
}

impl MessageEncoder {
    pub fn new(registry: impl Into<SharedRegistry>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    /// Encodes `message` against the schema selected by `call_path` and `direction`.
    pub fn encode(
        &self,
        message: &Message,
        call_path: &str,
        direction: Direction,
    ) -> Result<Vec<u8>, EncodeError> {
        let call_path = CallPath::parse(call_path)?;
        let descriptor = self.registry.snapshot().resolve(&call_path, direction)?;
        self.encode_with_descriptor(message, descriptor)
    }

    pub fn encode_with_descriptor(
        &self,
        message: &Message,
        descriptor: MessageDescriptor,
    ) -> Result<Vec<u8>, EncodeError> {
        let bound = bind(message, descriptor)?;
        Ok(wire::encode_to_vec(&bound))
    }
}

/// Binds a generic message to `descriptor`, parsing every simple value.
pub fn bind(message: &Message, descriptor: MessageDescriptor) -> Result<DecodedMessage, EncodeError> {
    let mut bound = DecodedMessage::new(descriptor.clone());

    for (name, value) in &message.fields {
        let field =
            descriptor
                .get_field_by_name(name)
                .ok_or_else(|| EncodeError::UnknownField {
                    message: descriptor.full_name().to_string(),
                    field: name.clone(),
                })?;

        if field.is_list() || field.is_map() {
            let Value::List(values) = value else {
                return Err(shape_mismatch(&field, "a list"));
            };
            let items = values
                .iter()
                .map(|v| bind_value(&field, v))
                .collect::<Result<Vec<_>, _>>()?;
            bound.extend(field, items);
        } else {
            let item = bind_value(&field, value)?;
            bound.set(field, item);
        }
    }

    Ok(bound)
}

fn bind_value(field: &FieldDescriptor, value: &Value) -> Result<DecodedValue, EncodeError> {
    match (field.kind(), value) {
        (Kind::Message(descriptor), Value::Message(nested)) => {
            Ok(DecodedValue::Message(bind(nested, descriptor)?))
        }
        (Kind::Message(_), _) => Err(shape_mismatch(field, "a message")),
        (kind, Value::Simple(text)) => Ok(DecodedValue::Scalar(parse_scalar(field, &kind, text)?)),
        (_, _) => Err(shape_mismatch(field, "a simple value")),
    }
}

/// Parses the canonical string form of a scalar of type `kind`.
pub fn parse_scalar(
    field: &FieldDescriptor,
    kind: &Kind,
    text: &str,
) -> Result<ReflectValue, EncodeError> {
    let invalid = |reason: String| EncodeError::InvalidScalar {
        field: field.full_name().to_string(),
        value: text.to_string(),
        reason,
    };

    let value = match kind {
        Kind::Double => ReflectValue::F64(parse_number(text).map_err(invalid)?),
        Kind::Float => ReflectValue::F32(parse_number(text).map_err(invalid)?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            ReflectValue::I32(parse_number(text).map_err(invalid)?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            ReflectValue::I64(parse_number(text).map_err(invalid)?)
        }
        Kind::Uint32 | Kind::Fixed32 => ReflectValue::U32(parse_number(text).map_err(invalid)?),
        Kind::Uint64 | Kind::Fixed64 => ReflectValue::U64(parse_number(text).map_err(invalid)?),
        Kind::Bool => match text {
            "true" => ReflectValue::Bool(true),
            "false" => ReflectValue::Bool(false),
            _ => return Err(invalid("expected 'true' or 'false'".to_string())),
        },
        Kind::String => ReflectValue::String(text.to_string()),
        Kind::Bytes => ReflectValue::Bytes(
            STANDARD
                .decode(text)
                .map_err(|e| invalid(e.to_string()))?
                .into(),
        ),
        Kind::Enum(descriptor) => {
            let number = descriptor
                .get_value_by_name(text)
                .map(|v| v.number())
                .or_else(|| text.parse().ok())
                .ok_or_else(|| invalid(format!("not a value of enum '{}'", descriptor.full_name())))?;
            ReflectValue::EnumNumber(number)
        }
        Kind::Message(_) => return Err(shape_mismatch(field, "a message")),
    };

    Ok(value)
}

fn parse_number<T>(text: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    text.parse().map_err(|e: T::Err| e.to_string())
}

fn shape_mismatch(field: &FieldDescriptor, expected: &'static str) -> EncodeError {
    EncodeError::ShapeMismatch {
        field: field.full_name().to_string(),
        expected,
    }
}
