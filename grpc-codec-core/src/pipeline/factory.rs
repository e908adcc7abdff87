//! # Codec Factory
//!
//! Builds [`PipelineCodec`]s out of a *dictionary*: the archive string (see
//! [`crate::archive`]) holding the `.proto` sources of the services to decode.
//!
//! The dictionary is unpacked into a temporary directory owned by the factory, every `.proto`
//! file found there is compiled in one go, and the resulting registry is shared by all the
//! codecs the factory creates. [`CodecFactory::reload`] swaps in a new dictionary; codecs created
//! earlier pick it up on their next call.
use super::PipelineCodec;
use crate::{
    archive::{self, ArchiveError},
    config::CodecSettings,
    registry::{
        Registry, RegistryError, SharedRegistry,
        compiler::{ProtocCompiler, SchemaCompiler},
        discover_proto_files,
    },
};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("Failed to prepare the schema directory")]
    Io(#[from] std::io::Error),

    #[error("Invalid dictionary")]
    Archive(#[from] ArchiveError),

    #[error("Failed to build the schema registry")]
    Registry(#[from] RegistryError),
}

pub struct CodecFactory<C = ProtocCompiler> {
    compiler: C,
    settings: CodecSettings,
    registry: SharedRegistry,
    schema_dir: TempDir,
}

impl CodecFactory<ProtocCompiler> {
    /// Initializes a factory from a dictionary, compiling it with `protoc` as configured in
    /// `settings`.
    ///
    /// # Arguments
    ///
    /// * `dictionary` - Base64 zip archive of the `.proto` sources.
    /// * `settings` - Compiler and decoding settings.
    pub async fn init(dictionary: &str, settings: CodecSettings) -> Result<Self, FactoryError> {
        let compiler = settings.protoc.compiler();
        Self::with_compiler(compiler, dictionary, settings).await
    }
}

impl<C: SchemaCompiler> CodecFactory<C> {
    /// Initializes a factory that compiles its dictionaries with `compiler`.
    pub async fn with_compiler(
        compiler: C,
        dictionary: &str,
        settings: CodecSettings,
    ) -> Result<Self, FactoryError> {
        let schema_dir = new_schema_dir()?;
        let registry = build_registry(&compiler, dictionary, schema_dir.path()).await?;

        Ok(Self {
            compiler,
            settings,
            registry: SharedRegistry::new(registry),
            schema_dir,
        })
    }

    /// Creates a codec backed by the factory's registry.
    pub fn create_codec(&self) -> PipelineCodec {
        PipelineCodec::new(self.registry.clone(), self.settings.decode)
    }

    /// Rebuilds the registry from `dictionary` and publishes it.
    ///
    /// On failure nothing changes: the previous registry stays published and its schema
    /// directory is kept.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<Registry>)` - The registry that was replaced.
    /// * `Err(FactoryError)` - If the dictionary cannot be unpacked or compiled.
    pub async fn reload(&mut self, dictionary: &str) -> Result<Arc<Registry>, FactoryError> {
        let schema_dir = new_schema_dir()?;
        let registry = build_registry(&self.compiler, dictionary, schema_dir.path()).await?;

        self.schema_dir = schema_dir;
        Ok(self.registry.publish(registry))
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    /// The directory the current dictionary was unpacked into.
    pub fn schema_dir(&self) -> &Path {
        self.schema_dir.path()
    }
}

fn new_schema_dir() -> std::io::Result<TempDir> {
    tempfile::Builder::new().prefix("grpc-codec-").tempdir()
}

async fn build_registry<C: SchemaCompiler>(
    compiler: &C,
    dictionary: &str,
    dir: &Path,
) -> Result<Registry, FactoryError> {
    let unpacked = archive::unpack(dictionary, dir)?;
    let names = unpacked
        .iter()
        .filter_map(|path| path.strip_prefix(dir).ok())
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>();
    tracing::info!(files = ?names, dir = %dir.display(), "unpacked schema dictionary");

    let sources = discover_proto_files(dir)?;
    Ok(Registry::build(compiler, &sources, dir).await?)
}
