use fixture_schema::{CALL_PATH, encode, map_entry_payload, nested, request};
use grpc_codec_core::{
    Direction, EncodeError, Message, MessageDecoder, MessageEncoder, Value,
    prost_reflect::{DynamicMessage, Value as ReflectValue},
};

mod fixture_schema;

fn simple(value: &str) -> Value {
    Value::Simple(value.to_string())
}

fn tree(fields: Vec<(&str, Value)>) -> Message {
    fields.into_iter().collect()
}

fn encoder() -> MessageEncoder {
    MessageEncoder::new(fixture_schema::registry())
}

fn decoder() -> MessageDecoder {
    MessageDecoder::new(fixture_schema::registry())
}

#[test]
fn test_encode_is_read_back_by_prost_reflect() {
    let message = tree(vec![
        ("stringField", simple("hello")),
        ("count", simple("5")),
        ("color", simple("GREEN")),
        (
            "nested",
            Value::Message(tree(vec![
                ("name", simple("inner")),
                ("level", simple("-2")),
                ("ids", Value::List(vec![simple("1"), simple("2")])),
            ])),
        ),
        ("payload", simple("AAE=")),
    ]);

    let bytes = encoder()
        .encode(&message, CALL_PATH, Direction::First)
        .expect("Encode failed");

    let decoded = DynamicMessage::decode(fixture_schema::message("codec.test.TestRequest"), &bytes[..])
        .expect("prost-reflect could not read the payload");

    assert_eq!(
        decoded.get_field_by_name("stringField").as_deref(),
        Some(&ReflectValue::String("hello".to_string()))
    );
    assert_eq!(
        decoded.get_field_by_name("count").as_deref(),
        Some(&ReflectValue::I32(5))
    );
    assert_eq!(
        decoded.get_field_by_name("color").as_deref(),
        Some(&ReflectValue::EnumNumber(2))
    );
    assert_eq!(
        decoded.get_field_by_name("nested").as_deref(),
        Some(&ReflectValue::Message(nested("inner", -2, &[1, 2])))
    );
}

#[test]
fn test_round_trip_of_decoded_trees() {
    let mut request = request();
    request.set_field_by_name("stringField", ReflectValue::String("hello".to_string()));
    request.set_field_by_name(
        "repeatedField",
        ReflectValue::List(vec![
            ReflectValue::String("a".to_string()),
            ReflectValue::String("b".to_string()),
        ]),
    );
    request.set_field_by_name(
        "nestedList",
        ReflectValue::List(vec![
            ReflectValue::Message(nested("first", 1, &[10, -20])),
            ReflectValue::Message(nested("second", -1, &[])),
        ]),
    );
    request.set_field_by_name("color", ReflectValue::EnumNumber(9));
    request.set_field_by_name("number", ReflectValue::I64(-7));

    let mut payload = encode(&request);
    payload.extend(map_entry_payload("z", "last"));
    payload.extend(map_entry_payload("a", "first"));

    let original = decoder()
        .decode(&payload, CALL_PATH, Direction::First)
        .expect("Decode failed");

    let bytes = encoder()
        .encode(&original, CALL_PATH, Direction::First)
        .expect("Encode failed");
    let round_tripped = decoder()
        .decode(&bytes, CALL_PATH, Direction::First)
        .expect("Decode of the re-encoded payload failed");

    assert_eq!(round_tripped, original);
}

#[test]
fn test_map_entries_are_written_in_list_order() {
    let entry = |key: &str, value: &str| {
        Value::Message(tree(vec![("key", simple(key)), ("value", simple(value))]))
    };
    let message = tree(vec![(
        "mapField",
        Value::List(vec![entry("b", "2"), entry("a", "1")]),
    )]);

    let bytes = encoder()
        .encode(&message, CALL_PATH, Direction::First)
        .expect("Encode failed");

    let mut expected = map_entry_payload("b", "2");
    expected.extend(map_entry_payload("a", "1"));
    assert_eq!(bytes, expected);
}

#[test]
fn test_enums_accept_names_and_numbers() {
    for (text, number) in [("RED", 1), ("2", 2), ("15", 15)] {
        let message = tree(vec![("color", simple(text))]);
        let bytes = encoder()
            .encode(&message, CALL_PATH, Direction::First)
            .expect("Encode failed");

        let decoded =
            DynamicMessage::decode(fixture_schema::message("codec.test.TestRequest"), &bytes[..])
                .expect("prost-reflect could not read the payload");
        assert_eq!(
            decoded.get_field_by_name("color").as_deref(),
            Some(&ReflectValue::EnumNumber(number))
        );
    }
}

#[test]
fn test_encode_response_direction() {
    let message = tree(vec![("ok", simple("true")), ("message", simple("done"))]);

    let bytes = encoder()
        .encode(&message, CALL_PATH, Direction::Second)
        .expect("Encode failed");

    let decoded = decoder()
        .decode(&bytes, CALL_PATH, Direction::Second)
        .expect("Decode failed");
    assert_eq!(decoded, message);
}

#[test]
fn test_undeclared_fields_are_rejected() {
    let message = tree(vec![("ghost", simple("boo"))]);

    let err = encoder()
        .encode(&message, CALL_PATH, Direction::First)
        .unwrap_err();

    assert!(matches!(
        err,
        EncodeError::UnknownField { ref message, ref field }
            if message == "codec.test.TestRequest" && field == "ghost"
    ));
}

#[test]
fn test_shape_mismatches_are_rejected() {
    let cases = [
        tree(vec![("stringField", Value::List(vec![simple("a")]))]),
        tree(vec![("repeatedField", simple("a"))]),
        tree(vec![("nested", simple("flat"))]),
        tree(vec![("count", Value::Message(Message::new()))]),
    ];

    for message in cases {
        let result = encoder().encode(&message, CALL_PATH, Direction::First);
        assert!(
            matches!(result, Err(EncodeError::ShapeMismatch { .. })),
            "expected a shape mismatch for {message:?}, got {result:?}"
        );
    }
}

#[test]
fn test_invalid_scalars_are_rejected() {
    let cases = [
        ("count", "abc"),
        ("count", "99999999999"),
        ("color", "PURPLE"),
        ("payload", "not base64!"),
        ("stringField", "fine"),
    ];

    for (field, text) in cases {
        let message = tree(vec![(field, simple(text))]);
        let result = encoder().encode(&message, CALL_PATH, Direction::First);

        if field == "stringField" {
            assert!(result.is_ok());
        } else {
            assert!(
                matches!(result, Err(EncodeError::InvalidScalar { ref value, .. }) if value == text),
                "expected '{text}' to be rejected for '{field}', got {result:?}"
            );
        }
    }

    let message = tree(vec![("ok", simple("yes"))]);
    assert!(matches!(
        encoder().encode(&message, CALL_PATH, Direction::Second),
        Err(EncodeError::InvalidScalar { .. })
    ));
}

#[test]
fn test_invalid_call_paths_are_rejected() {
    assert!(matches!(
        encoder().encode(&Message::new(), "not-a-path", Direction::First),
        Err(EncodeError::InvalidCallPath(_))
    ));
    assert!(matches!(
        encoder().encode(&Message::new(), "/codec.test.Ghost/TestMethod", Direction::First),
        Err(EncodeError::NotFound(_))
    ));
}
