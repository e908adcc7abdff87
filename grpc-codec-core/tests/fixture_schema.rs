#![allow(dead_code)]
//! Schemas shared by the integration tests, built directly as descriptors so the tests do not
//! depend on a `protoc` installation. `tests/fixtures/proto` holds the same schemas as source.
use grpc_codec_core::{
    Registry,
    prost::Message as _,
    prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, Value},
    prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, FileDescriptorSet, MessageOptions, MethodDescriptorProto,
        OneofDescriptorProto, ServiceDescriptorProto,
        field_descriptor_proto::{Label, Type},
    },
};

pub const SERVICE: &str = "codec.test.TestService";
pub const CALL_PATH: &str = "/codec.test.TestService/TestMethod";
pub const OTHER_SERVICE: &str = "codec.other.OtherService";
pub const OTHER_CALL_PATH: &str = "/codec.other.OtherService/Ping";

fn field(name: &str, number: i32, label: Label, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn typed_field(
    name: &str,
    number: i32,
    label: Label,
    ty: Type,
    type_name: &str,
) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, label, ty)
    }
}

fn oneof_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        oneof_index: Some(0),
        ..field(name, number, Label::Optional, ty)
    }
}

fn test_file() -> FileDescriptorProto {
    let map_entry = DescriptorProto {
        name: Some("MapFieldEntry".to_string()),
        field: vec![
            field("key", 1, Label::Optional, Type::String),
            field("value", 2, Label::Optional, Type::String),
        ],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };

    let request = DescriptorProto {
        name: Some("TestRequest".to_string()),
        field: vec![
            field("stringField", 1, Label::Optional, Type::String),
            field("repeatedField", 2, Label::Repeated, Type::String),
            typed_field(
                "mapField",
                3,
                Label::Repeated,
                Type::Message,
                ".codec.test.TestRequest.MapFieldEntry",
            ),
            typed_field(
                "nested",
                4,
                Label::Optional,
                Type::Message,
                ".codec.test.Nested",
            ),
            typed_field(
                "nestedList",
                5,
                Label::Repeated,
                Type::Message,
                ".codec.test.Nested",
            ),
            typed_field("color", 6, Label::Optional, Type::Enum, ".codec.test.Color"),
            field("count", 7, Label::Optional, Type::Int32),
            field("payload", 8, Label::Optional, Type::Bytes),
            oneof_field("text", 9, Type::String),
            oneof_field("number", 10, Type::Int64),
        ],
        nested_type: vec![map_entry],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("choice".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let nested = DescriptorProto {
        name: Some("Nested".to_string()),
        field: vec![
            field("name", 1, Label::Optional, Type::String),
            field("level", 2, Label::Optional, Type::Sint32),
            field("ids", 3, Label::Repeated, Type::Int64),
        ],
        ..Default::default()
    };

    let response = DescriptorProto {
        name: Some("TestResponse".to_string()),
        field: vec![
            field("ok", 1, Label::Optional, Type::Bool),
            field("message", 2, Label::Optional, Type::String),
        ],
        ..Default::default()
    };

    let color = EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: ["COLOR_UNSPECIFIED", "RED", "GREEN"]
            .into_iter()
            .enumerate()
            .map(|(number, name)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(number as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("test.proto".to_string()),
        package: Some("codec.test".to_string()),
        message_type: vec![request, nested, response],
        enum_type: vec![color],
        service: vec![ServiceDescriptorProto {
            name: Some("TestService".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("TestMethod".to_string()),
                input_type: Some(".codec.test.TestRequest".to_string()),
                output_type: Some(".codec.test.TestResponse".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn other_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("common/other.proto".to_string()),
        package: Some("codec.other".to_string()),
        dependency: vec!["test.proto".to_string()],
        service: vec![ServiceDescriptorProto {
            name: Some("OtherService".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("Ping".to_string()),
                input_type: Some(".codec.test.Nested".to_string()),
                output_type: Some(".codec.test.TestResponse".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// The descriptor set `protoc --include_imports` would produce for `tests/fixtures/proto`.
pub fn file_descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![test_file(), other_file()],
    }
}

pub fn registry() -> Registry {
    Registry::from_file_descriptor_set(file_descriptor_set())
        .expect("Failed to build the fixture registry")
}

pub fn pool() -> DescriptorPool {
    DescriptorPool::from_file_descriptor_set(file_descriptor_set())
        .expect("Failed to build the fixture pool")
}

pub fn message(name: &str) -> MessageDescriptor {
    pool()
        .get_message_by_name(name)
        .unwrap_or_else(|| panic!("Message '{name}' not found in the fixture"))
}

pub fn request() -> DynamicMessage {
    DynamicMessage::new(message("codec.test.TestRequest"))
}

pub fn nested(name: &str, level: i32, ids: &[i64]) -> DynamicMessage {
    let mut nested = DynamicMessage::new(message("codec.test.Nested"));
    nested.set_field_by_name("name", Value::String(name.to_string()));
    nested.set_field_by_name("level", Value::I32(level));
    nested.set_field_by_name("ids", Value::List(ids.iter().copied().map(Value::I64).collect()));
    nested
}

/// Encodes a request holding a single map entry.
///
/// Protobuf maps are unordered once loaded into a `DynamicMessage`, so payloads with ordered
/// entries are built by concatenating single-entry requests.
pub fn map_entry_payload(key: &str, value: &str) -> Vec<u8> {
    let mut request = request();
    let mut map = std::collections::HashMap::new();
    map.insert(
        grpc_codec_core::prost_reflect::MapKey::String(key.to_string()),
        Value::String(value.to_string()),
    );
    request.set_field_by_name("mapField", Value::Map(map));
    request.encode_to_vec()
}

pub fn encode(message: &DynamicMessage) -> Vec<u8> {
    message.encode_to_vec()
}
