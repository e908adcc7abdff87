//! # Schema Registry
//!
//! The [`Registry`] owns every service compiled out of a set of `.proto` sources and answers the
//! one question the decoder asks on every call: *which message schema applies to this call path
//! and direction?*
//!
//! It is built once, through a single invocation of a [`SchemaCompiler`], and indexes all the
//! services of all the compiled files into one flat map keyed by fully qualified service name.
//! After construction it is immutable, so it can be shared freely between threads. When the
//! schemas have to change at runtime, build a new registry and publish it through a
//! [`SharedRegistry`].
pub mod compiler;
mod shared;

pub use shared::SharedRegistry;

use crate::call_path::CallPath;
use compiler::{CompileError, SchemaCompiler};
use prost_reflect::{
    DescriptorError, DescriptorPool, MessageDescriptor, MethodDescriptor, ServiceDescriptor,
};
use prost_types::FileDescriptorSet;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt, io,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to compile schema sources")]
    Compile(#[from] CompileError),

    #[error("Compiled descriptor set is not valid")]
    InvalidDescriptorSet(#[from] DescriptorError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),

    #[error("Method '{method}' not found in service '{service}'")]
    MethodNotFound { service: String, method: String },
}

/// Which side of a call a payload belongs to.
///
/// `First` is the request and selects the method's input schema, `Second` is the response and
/// selects the method's output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    First,
    Second,
}

impl Direction {
    /// Selects the schema of `method` that applies to this direction.
    pub fn select(self, method: &MethodDescriptor) -> MessageDescriptor {
        match self {
            Direction::First => method.input(),
            Direction::Second => method.output(),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::First => write!(f, "FIRST"),
            Direction::Second => write!(f, "SECOND"),
        }
    }
}

/// A compiled service together with an index of its methods.
#[derive(Debug, Clone)]
pub struct ServiceSchema {
    descriptor: ServiceDescriptor,
    methods: HashMap<String, MethodDescriptor>,
}

impl ServiceSchema {
    fn new(descriptor: ServiceDescriptor) -> Self {
        let methods = descriptor
            .methods()
            .map(|m| (m.name().to_string(), m))
            .collect();

        Self {
            descriptor,
            methods,
        }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Looks up a method of this service by its (unqualified) name.
    pub fn method(&self, name: &str) -> Result<&MethodDescriptor, LookupError> {
        self.methods
            .get(name)
            .ok_or_else(|| LookupError::MethodNotFound {
                service: self.descriptor.full_name().to_string(),
                method: name.to_string(),
            })
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

/// An immutable index of compiled services, keyed by fully qualified service name.
#[derive(Debug, Clone)]
pub struct Registry {
    pool: DescriptorPool,
    services: HashMap<String, ServiceSchema>,
}

impl Registry {
    /// Compiles `sources` with `compiler` and indexes every service they declare.
    ///
    /// The compiler is invoked exactly once. A failing compilation is surfaced as-is and never
    /// retried: given the same sources it would fail again.
    ///
    /// # Arguments
    ///
    /// * `compiler` - The external schema compiler.
    /// * `sources` - The `.proto` files to compile.
    /// * `working_dir` - The root of the proto search path, imports are resolved against it.
    pub async fn build<C>(
        compiler: &C,
        sources: &[PathBuf],
        working_dir: &Path,
    ) -> Result<Self, RegistryError>
    where
        C: SchemaCompiler,
    {
        let file_descriptor_set = compiler.compile(sources, working_dir).await?;
        let registry = Self::from_file_descriptor_set(file_descriptor_set)?;

        tracing::info!(
            sources = sources.len(),
            services = registry.services.len(),
            working_dir = %working_dir.display(),
            "schema registry built"
        );

        Ok(registry)
    }

    /// Builds a registry from an already compiled `FileDescriptorSet`.
    pub fn from_file_descriptor_set(
        file_descriptor_set: FileDescriptorSet,
    ) -> Result<Self, DescriptorError> {
        let pool = DescriptorPool::from_file_descriptor_set(file_descriptor_set)?;
        Ok(Self::from_pool(pool))
    }

    /// Builds a registry from the encoded bytes of a `FileDescriptorSet`.
    pub fn decode(file_descriptor_set: &[u8]) -> Result<Self, DescriptorError> {
        let pool = DescriptorPool::decode(file_descriptor_set)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: DescriptorPool) -> Self {
        let services = pool
            .services()
            .map(|service| (service.full_name().to_string(), ServiceSchema::new(service)))
            .collect();

        Self { pool, services }
    }

    /// Looks up a service by its fully qualified name (e.g. `my.package.Service`).
    pub fn lookup(&self, service: &str) -> Result<&ServiceSchema, LookupError> {
        self.services
            .get(service)
            .ok_or_else(|| LookupError::ServiceNotFound(service.to_string()))
    }

    /// Resolves the message schema of a payload travelling on `call_path` in `direction`.
    pub fn resolve(
        &self,
        call_path: &CallPath,
        direction: Direction,
    ) -> Result<MessageDescriptor, LookupError> {
        let method = self
            .lookup(call_path.service())?
            .method(call_path.method())?;

        Ok(direction.select(method))
    }

    /// Lists the fully qualified names of all registered services, sorted.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

/// Recursively collects every `.proto` file under `dir`, sorted by path.
pub fn discover_proto_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_proto_files(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_proto_files(dir: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            collect_proto_files(&path, found)?;
        } else if file_type.is_file() && path.extension().is_some_and(|ext| ext == "proto") {
            found.push(path);
        }
    }
    Ok(())
}
