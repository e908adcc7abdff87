//! # Protobuf Wire Codec
//!
//! A schema-walking reader and writer for the protobuf binary format.
//!
//! Decoding produces a [`DecodedMessage`]: every field is bound to its `FieldDescriptor` and its
//! value is one of three shapes, a scalar, a nested message, or an ordered list of either. Map
//! fields are kept as a list of their two-field entry messages, in the order they appear on the
//! wire, exactly like repeated message fields.
//!
//! The reader is strict. A field number the schema does not declare is an error
//! ([`WireError::UnknownField`]) instead of being carried along silently.
//!
//! ## Decoding rules
//!
//! * Repeated scalar fields accept both packed and unpacked encodings.
//! * The last occurrence of a singular scalar wins.
//! * Repeated occurrences of a singular message field are merged.
//! * Setting a `oneof` member clears the other members of the same `oneof`.
use bytes::{Buf, BufMut, Bytes};
use prost::encoding::{WireType, decode_key, decode_varint, encode_key, encode_varint};
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor, Value as ReflectValue};
use std::collections::{BTreeMap, btree_map::Entry};

/// Maximum nesting depth of messages, mirroring protobuf's default recursion limit.
pub const RECURSION_LIMIT: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Unexpected end of buffer")]
    Truncated,

    #[error("Invalid protobuf encoding")]
    Encoding(#[from] prost::DecodeError),

    #[error("Field '{field}' expects wire type {expected:?}, found {actual:?}")]
    WireTypeMismatch {
        field: String,
        expected: WireType,
        actual: WireType,
    },

    #[error("Field '{0}' contains invalid UTF-8")]
    InvalidUtf8(String),

    #[error("Unknown field number {number} in message '{message}'")]
    UnknownField { message: String, number: u32 },

    #[error("Unexpected end-group tag for field number {0}")]
    UnexpectedEndGroup(u32),

    #[error("Group field '{0}' is not terminated")]
    UnterminatedGroup(String),

    #[error("Message nesting exceeds the recursion limit of {RECURSION_LIMIT}")]
    RecursionLimitReached,
}

/// A message deserialized against a specific schema.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    descriptor: MessageDescriptor,
    fields: BTreeMap<u32, DecodedField>,
}

/// A field present on a [`DecodedMessage`].
#[derive(Debug, Clone)]
pub struct DecodedField {
    pub descriptor: FieldDescriptor,
    pub value: DecodedValue,
}

/// The runtime value of a decoded field.
#[derive(Debug, Clone)]
pub enum DecodedValue {
    /// Any non-message value. Only scalar variants of [`prost_reflect::Value`] are used.
    Scalar(ReflectValue),
    Message(DecodedMessage),
    /// Repeated and map fields.
    List(Vec<DecodedValue>),
}

impl DecodedMessage {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self {
            descriptor,
            fields: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Iterates over the fields present on this message, ordered by field number.
    pub fn fields(&self) -> impl Iterator<Item = &DecodedField> {
        self.fields.values()
    }

    pub fn get(&self, number: u32) -> Option<&DecodedField> {
        self.fields.get(&number)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&DecodedField> {
        self.descriptor
            .get_field_by_name(name)
            .and_then(|field| self.fields.get(&field.number()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Sets a singular field, clearing the other members of its `oneof` if it has one.
    pub fn set(&mut self, field: FieldDescriptor, value: DecodedValue) {
        if let Some(oneof) = field.containing_oneof() {
            for sibling in oneof.fields() {
                if sibling.number() != field.number() {
                    self.fields.remove(&sibling.number());
                }
            }
        }
        self.fields.insert(
            field.number(),
            DecodedField {
                descriptor: field,
                value,
            },
        );
    }

    /// Appends values to a repeated or map field.
    pub fn extend(&mut self, field: FieldDescriptor, values: Vec<DecodedValue>) {
        match self.fields.entry(field.number()) {
            Entry::Occupied(mut entry) => {
                if let DecodedValue::List(list) = &mut entry.get_mut().value {
                    list.extend(values);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(DecodedField {
                    descriptor: field,
                    value: DecodedValue::List(values),
                });
            }
        }
    }

    fn merge(&mut self, buf: &mut &[u8], depth: u32, group: Option<u32>) -> Result<(), WireError> {
        if depth == 0 {
            return Err(WireError::RecursionLimitReached);
        }

        while buf.has_remaining() {
            let (number, wire_type) = decode_key(buf)?;

            if wire_type == WireType::EndGroup {
                return match group {
                    Some(expected) if expected == number => Ok(()),
                    _ => Err(WireError::UnexpectedEndGroup(number)),
                };
            }

            let field =
                self.descriptor
                    .get_field(number)
                    .ok_or_else(|| WireError::UnknownField {
                        message: self.descriptor.full_name().to_string(),
                        number,
                    })?;

            self.merge_field(field, wire_type, buf, depth)?;
        }

        match group {
            Some(_) => Err(WireError::UnterminatedGroup(
                self.descriptor.full_name().to_string(),
            )),
            None => Ok(()),
        }
    }

    fn merge_field(
        &mut self,
        field: FieldDescriptor,
        wire_type: WireType,
        buf: &mut &[u8],
        depth: u32,
    ) -> Result<(), WireError> {
        let kind = field.kind();

        if field.is_list() || field.is_map() {
            let mut values = Vec::new();
            if wire_type == WireType::LengthDelimited && is_packable(&kind) {
                let mut packed = take_length_delimited(buf)?;
                while packed.has_remaining() {
                    let value = decode_scalar(&field, &kind, scalar_wire_type(&kind), &mut packed)?;
                    values.push(DecodedValue::Scalar(value));
                }
            } else {
                values.push(decode_value(&field, wire_type, buf, depth)?);
            }
            self.extend(field, values);
            return Ok(());
        }

        if let Kind::Message(descriptor) = &kind {
            let mut nested = match self.fields.remove(&field.number()) {
                Some(DecodedField {
                    value: DecodedValue::Message(existing),
                    ..
                }) => existing,
                _ => DecodedMessage::new(descriptor.clone()),
            };
            nested.merge_nested(&field, wire_type, buf, depth)?;
            self.set(field, DecodedValue::Message(nested));
            return Ok(());
        }

        let value = decode_scalar(&field, &kind, wire_type, buf)?;
        self.set(field, DecodedValue::Scalar(value));
        Ok(())
    }

    fn merge_nested(
        &mut self,
        field: &FieldDescriptor,
        wire_type: WireType,
        buf: &mut &[u8],
        depth: u32,
    ) -> Result<(), WireError> {
        if field.is_group() {
            expect_wire_type(field, WireType::StartGroup, wire_type)?;
            self.merge(buf, depth - 1, Some(field.number()))
        } else {
            expect_wire_type(field, WireType::LengthDelimited, wire_type)?;
            let mut inner = take_length_delimited(buf)?;
            self.merge(&mut inner, depth - 1, None)
        }
    }
}

/// Deserializes `buf` against `descriptor`.
///
/// # Errors
///
/// Returns [`WireError::UnknownField`] if `buf` (or any nested message) carries a field number
/// its schema does not declare, and another [`WireError`] variant if `buf` is not valid
/// protobuf for the schema.
pub fn decode_message(
    descriptor: MessageDescriptor,
    mut buf: &[u8],
) -> Result<DecodedMessage, WireError> {
    let mut message = DecodedMessage::new(descriptor);
    message.merge(&mut buf, RECURSION_LIMIT, None)?;
    Ok(message)
}

/// Serializes a message, writing its fields in field-number order.
pub fn encode_message(message: &DecodedMessage, buf: &mut impl BufMut) {
    for field in message.fields() {
        let descriptor = &field.descriptor;
        match &field.value {
            DecodedValue::List(values) if descriptor.is_packed() && !values.is_empty() => {
                let kind = descriptor.kind();
                let mut packed = Vec::new();
                for value in values {
                    if let DecodedValue::Scalar(scalar) = value {
                        encode_scalar(&kind, scalar, &mut packed);
                    }
                }
                encode_key(descriptor.number(), WireType::LengthDelimited, buf);
                encode_varint(packed.len() as u64, buf);
                buf.put_slice(&packed);
            }
            DecodedValue::List(values) => {
                for value in values {
                    encode_value(descriptor, value, buf);
                }
            }
            value => encode_value(descriptor, value, buf),
        }
    }
}

pub fn encode_to_vec(message: &DecodedMessage) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_message(message, &mut buf);
    buf
}

fn encode_value(field: &FieldDescriptor, value: &DecodedValue, buf: &mut impl BufMut) {
    match value {
        DecodedValue::Message(message) => {
            let mut inner = Vec::new();
            encode_message(message, &mut inner);
            if field.is_group() {
                encode_key(field.number(), WireType::StartGroup, buf);
                buf.put_slice(&inner);
                encode_key(field.number(), WireType::EndGroup, buf);
            } else {
                encode_key(field.number(), WireType::LengthDelimited, buf);
                encode_varint(inner.len() as u64, buf);
                buf.put_slice(&inner);
            }
        }
        DecodedValue::Scalar(scalar) => {
            let kind = field.kind();
            encode_key(field.number(), scalar_wire_type(&kind), buf);
            encode_scalar(&kind, scalar, buf);
        }
        DecodedValue::List(values) => {
            for value in values {
                encode_value(field, value, buf);
            }
        }
    }
}

/// The wire type a value of `kind` is written with when it is not packed.
pub fn scalar_wire_type(kind: &Kind) -> WireType {
    match kind {
        Kind::Double | Kind::Fixed64 | Kind::Sfixed64 => WireType::SixtyFourBit,
        Kind::Float | Kind::Fixed32 | Kind::Sfixed32 => WireType::ThirtyTwoBit,
        Kind::String | Kind::Bytes | Kind::Message(_) => WireType::LengthDelimited,
        Kind::Int32
        | Kind::Int64
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Bool
        | Kind::Enum(_) => WireType::Varint,
    }
}

fn is_packable(kind: &Kind) -> bool {
    scalar_wire_type(kind) != WireType::LengthDelimited
}

fn expect_wire_type(
    field: &FieldDescriptor,
    expected: WireType,
    actual: WireType,
) -> Result<(), WireError> {
    if expected == actual {
        Ok(())
    } else {
        Err(WireError::WireTypeMismatch {
            field: field.full_name().to_string(),
            expected,
            actual,
        })
    }
}

fn decode_value(
    field: &FieldDescriptor,
    wire_type: WireType,
    buf: &mut &[u8],
    depth: u32,
) -> Result<DecodedValue, WireError> {
    match field.kind() {
        Kind::Message(descriptor) => {
            let mut nested = DecodedMessage::new(descriptor);
            nested.merge_nested(field, wire_type, buf, depth)?;
            Ok(DecodedValue::Message(nested))
        }
        kind => Ok(DecodedValue::Scalar(decode_scalar(
            field, &kind, wire_type, buf,
        )?)),
    }
}

fn decode_scalar(
    field: &FieldDescriptor,
    kind: &Kind,
    wire_type: WireType,
    buf: &mut &[u8],
) -> Result<ReflectValue, WireError> {
    expect_wire_type(field, scalar_wire_type(kind), wire_type)?;

    let value = match kind {
        Kind::Double => ReflectValue::F64(f64::from_bits(take_fixed64(buf)?)),
        Kind::Float => ReflectValue::F32(f32::from_bits(take_fixed32(buf)?)),
        Kind::Fixed64 => ReflectValue::U64(take_fixed64(buf)?),
        Kind::Fixed32 => ReflectValue::U32(take_fixed32(buf)?),
        Kind::Sfixed64 => ReflectValue::I64(take_fixed64(buf)? as i64),
        Kind::Sfixed32 => ReflectValue::I32(take_fixed32(buf)? as i32),
        // Truncation is the specified behaviour for 32-bit varints.
        Kind::Int32 => ReflectValue::I32(decode_varint(buf)? as i32),
        Kind::Int64 => ReflectValue::I64(decode_varint(buf)? as i64),
        Kind::Uint32 => ReflectValue::U32(decode_varint(buf)? as u32),
        Kind::Uint64 => ReflectValue::U64(decode_varint(buf)?),
        Kind::Sint32 => {
            let raw = decode_varint(buf)? as u32;
            ReflectValue::I32(((raw >> 1) as i32) ^ -((raw & 1) as i32))
        }
        Kind::Sint64 => {
            let raw = decode_varint(buf)?;
            ReflectValue::I64(((raw >> 1) as i64) ^ -((raw & 1) as i64))
        }
        Kind::Bool => ReflectValue::Bool(decode_varint(buf)? != 0),
        Kind::Enum(_) => ReflectValue::EnumNumber(decode_varint(buf)? as i32),
        Kind::String => {
            let bytes = take_length_delimited(buf)?;
            let text = std::str::from_utf8(bytes)
                .map_err(|_| WireError::InvalidUtf8(field.full_name().to_string()))?;
            ReflectValue::String(text.to_string())
        }
        Kind::Bytes => ReflectValue::Bytes(Bytes::copy_from_slice(take_length_delimited(buf)?)),
        Kind::Message(_) => unreachable!("message fields are decoded by DecodedMessage::merge"),
    };

    Ok(value)
}

fn encode_scalar(kind: &Kind, value: &ReflectValue, buf: &mut impl BufMut) {
    match (kind, value) {
        (Kind::Sint32, ReflectValue::I32(v)) => {
            encode_varint(((v << 1) ^ (v >> 31)) as u32 as u64, buf)
        }
        (Kind::Sint64, ReflectValue::I64(v)) => encode_varint(((v << 1) ^ (v >> 63)) as u64, buf),
        (Kind::Sfixed32, ReflectValue::I32(v)) => buf.put_i32_le(*v),
        (Kind::Sfixed64, ReflectValue::I64(v)) => buf.put_i64_le(*v),
        (Kind::Fixed32, ReflectValue::U32(v)) => buf.put_u32_le(*v),
        (Kind::Fixed64, ReflectValue::U64(v)) => buf.put_u64_le(*v),
        // Negative 32-bit values are sign extended to ten bytes.
        (_, ReflectValue::I32(v)) => encode_varint(*v as i64 as u64, buf),
        (_, ReflectValue::I64(v)) => encode_varint(*v as u64, buf),
        (_, ReflectValue::U32(v)) => encode_varint(*v as u64, buf),
        (_, ReflectValue::U64(v)) => encode_varint(*v, buf),
        (_, ReflectValue::Bool(v)) => encode_varint(*v as u64, buf),
        (_, ReflectValue::EnumNumber(v)) => encode_varint(*v as i64 as u64, buf),
        (_, ReflectValue::F32(v)) => buf.put_f32_le(*v),
        (_, ReflectValue::F64(v)) => buf.put_f64_le(*v),
        (_, ReflectValue::String(v)) => {
            encode_varint(v.len() as u64, buf);
            buf.put_slice(v.as_bytes());
        }
        (_, ReflectValue::Bytes(v)) => {
            encode_varint(v.len() as u64, buf);
            buf.put_slice(v);
        }
        (_, ReflectValue::Message(_) | ReflectValue::List(_) | ReflectValue::Map(_)) => {}
    }
}

fn take_length_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], WireError> {
    let len = usize::try_from(decode_varint(buf)?).map_err(|_| WireError::Truncated)?;
    if buf.len() < len {
        return Err(WireError::Truncated);
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn take_fixed32(buf: &mut &[u8]) -> Result<u32, WireError> {
    if buf.remaining() < 4 {
        return Err(WireError::Truncated);
    }
    Ok(buf.get_u32_le())
}

fn take_fixed64(buf: &mut &[u8]) -> Result<u64, WireError> {
    if buf.remaining() < 8 {
        return Err(WireError::Truncated);
    }
    Ok(buf.get_u64_le())
}
