use fixture_schema::{CALL_PATH, OTHER_SERVICE, SERVICE};
use grpc_codec_core::{
    CallPath, CompileError, DecodeError, Direction, LookupError, MessageDecoder,
    PrecompiledDescriptorSet, ProtocCompiler, Registry, RegistryError, SharedRegistry,
    prost::Message as _,
    prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet},
    registry::discover_proto_files,
};
use std::path::{Path, PathBuf};

mod fixture_schema;

fn proto_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/proto")
}

fn protoc_available() -> bool {
    std::process::Command::new("protoc")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

#[test]
fn test_services_are_indexed_by_full_name() {
    let registry = fixture_schema::registry();

    assert_eq!(registry.services(), vec![OTHER_SERVICE, SERVICE]);

    let service = registry.lookup(SERVICE).expect("Service not found");
    assert_eq!(service.method_names().collect::<Vec<_>>(), vec!["TestMethod"]);
    assert_eq!(
        service.method("Ghost").unwrap_err(),
        LookupError::MethodNotFound {
            service: SERVICE.to_string(),
            method: "Ghost".to_string(),
        }
    );

    assert_eq!(
        registry.lookup("TestService").unwrap_err(),
        LookupError::ServiceNotFound("TestService".to_string())
    );
}

#[test]
fn test_resolve_applies_the_direction() {
    let registry = fixture_schema::registry();
    let call_path = CallPath::parse(CALL_PATH).expect("Invalid call path");

    let input = registry
        .resolve(&call_path, Direction::First)
        .expect("Resolve failed");
    let output = registry
        .resolve(&call_path, Direction::Second)
        .expect("Resolve failed");

    assert_eq!(input.full_name(), "codec.test.TestRequest");
    assert_eq!(output.full_name(), "codec.test.TestResponse");
}

#[test]
fn test_decode_from_encoded_descriptor_set() {
    let bytes = fixture_schema::file_descriptor_set().encode_to_vec();

    let registry = Registry::decode(&bytes).expect("Failed to decode descriptor set");

    assert_eq!(registry.services(), vec![OTHER_SERVICE, SERVICE]);
}

#[tokio::test]
async fn test_build_with_precompiled_descriptors() {
    let compiler = PrecompiledDescriptorSet::new(fixture_schema::file_descriptor_set());
    let sources = discover_proto_files(&proto_dir()).expect("Failed to list sources");

    let registry = Registry::build(&compiler, &sources, &proto_dir())
        .await
        .expect("Build failed");

    assert!(registry.lookup(SERVICE).is_ok());
}

#[tokio::test]
async fn test_inconsistent_descriptors_are_rejected() {
    // A field referencing a message that no file declares.
    let broken = FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("broken.proto".to_string()),
            package: Some("broken".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Broken".to_string()),
                field: vec![FieldDescriptorProto {
                    name: Some("ghost".to_string()),
                    number: Some(1),
                    label: Some(1),
                    r#type: Some(11),
                    type_name: Some(".broken.Ghost".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        }],
    };

    let result = Registry::build(
        &PrecompiledDescriptorSet::new(broken),
        &[PathBuf::from("broken.proto")],
        Path::new("."),
    )
    .await;

    assert!(matches!(result, Err(RegistryError::InvalidDescriptorSet(_))));
}

#[test]
fn test_discover_proto_files_recurses() {
    let dir = proto_dir();

    let found = discover_proto_files(&dir).expect("Failed to list sources");

    assert_eq!(
        found,
        vec![dir.join("common").join("other.proto"), dir.join("test.proto")]
    );
}

#[tokio::test]
async fn test_compiler_failures_are_surfaced() {
    let compiler = ProtocCompiler::new("/nonexistent/bin/protoc");

    let result = Registry::build(&compiler, &[proto_dir().join("test.proto")], &proto_dir()).await;
    assert!(matches!(
        result,
        Err(RegistryError::Compile(CompileError::Spawn { .. }))
    ));

    let result = Registry::build(&compiler, &[], &proto_dir()).await;
    assert!(matches!(
        result,
        Err(RegistryError::Compile(CompileError::NoSources))
    ));
}

#[tokio::test]
async fn test_build_with_protoc() {
    if !protoc_available() {
        eprintln!("protoc not found, skipping");
        return;
    }

    let sources = discover_proto_files(&proto_dir()).expect("Failed to list sources");

    let registry = Registry::build(&ProtocCompiler::default(), &sources, &proto_dir())
        .await
        .expect("protoc build failed");

    assert_eq!(registry.services(), vec![OTHER_SERVICE, SERVICE]);

    // The compiled schema reads payloads built against the hand-written descriptors.
    let payload = fixture_schema::map_entry_payload("k", "v");
    let message = MessageDecoder::new(registry)
        .decode(&payload, CALL_PATH, Direction::First)
        .expect("Decode failed");
    assert!(message.get("mapField").is_some());
}

#[tokio::test]
async fn test_protoc_syntax_errors_are_surfaced() {
    if !protoc_available() {
        eprintln!("protoc not found, skipping");
        return;
    }

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let source = dir.path().join("broken.proto");
    std::fs::write(&source, "syntax = \"proto3\"; message {").expect("Failed to write source");

    let result = Registry::build(&ProtocCompiler::default(), &[source], dir.path()).await;

    assert!(matches!(
        result,
        Err(RegistryError::Compile(CompileError::Failed { .. }))
    ));
}

#[test]
fn test_published_registries_reach_existing_decoders() {
    let shared = SharedRegistry::new(fixture_schema::registry());
    let decoder = MessageDecoder::new(shared.clone());
    let before = shared.snapshot();

    assert!(decoder.decode(&[], CALL_PATH, Direction::First).is_ok());

    let empty = Registry::from_file_descriptor_set(FileDescriptorSet::default())
        .expect("Failed to build empty registry");
    let previous = shared.publish(empty);

    assert!(matches!(
        decoder.decode(&[], CALL_PATH, Direction::First),
        Err(DecodeError::NotFound(LookupError::ServiceNotFound(_)))
    ));

    // Snapshots taken earlier are unaffected.
    assert!(before.lookup(SERVICE).is_ok());
    assert!(std::sync::Arc::ptr_eq(&before, &previous));
}
