//! # gRPC Codec Core
//!
//! `grpc-codec-core` transcodes binary protobuf payloads exchanged over a gRPC channel into a
//! generic field tree (and back) without compile-time knowledge of the message types.
//!
//! The schema of a payload is never named directly. Callers hand over the call path the payload
//! travelled on (`/package.Service/Method`) and whether it was the request or the response; the
//! schema is resolved at runtime from descriptors compiled out of `.proto` sources.
//!
//! ## Key Components
//!
//! * **[`CallPath`]:** Parses `/Service/Method` call paths into lookup keys.
//! * **[`Registry`]:** Compiles a set of `.proto` sources once (through a [`SchemaCompiler`]) and
//!   indexes every service by its fully qualified name.
//! * **[`MessageDecoder`] & [`MessageEncoder`]:** Resolve the schema of a payload and transcode it
//!   from binary into a [`Message`] tree, or from a [`Message`] tree back into binary.
//! * **[`archive`]:** Packs a directory of schema sources into a single base64 string and unpacks
//!   it on the other side, refusing entries that would escape the destination.
//! * **[`pipeline`]:** Decodes whole message groups, turning decode failures into error messages,
//!   and builds codecs from an archived schema dictionary.
//! * **[`CodecSettings`]:** Compiler, decoding and archive settings, loadable from JSON.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect` and `prost-types` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod archive;
pub mod call_path;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod pipeline;
pub mod registry;
pub mod tree;
pub mod wire;

pub use archive::{ArchiveError, PackOptions};
pub use call_path::{CallPath, CallPathError};
pub use config::{CodecSettings, ConfigError};
pub use decoder::{DecodeError, MessageDecoder};
pub use encoder::{EncodeError, MessageEncoder};
pub use pipeline::{
    PipelineCodec, PipelineError,
    factory::{CodecFactory, FactoryError},
};
pub use registry::{
    Direction, LookupError, Registry, RegistryError, ServiceSchema, SharedRegistry,
    compiler::{CompileError, PrecompiledDescriptorSet, ProtocCompiler, SchemaCompiler},
};
pub use tree::{ConvertOptions, Message, Value};

// Re-exports
pub use prost;
pub use prost_reflect;
pub use prost_types;
