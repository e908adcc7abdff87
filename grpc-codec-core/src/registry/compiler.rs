//! # Schema Compiler
//!
//! Turning `.proto` text into descriptors is the job of an external tool. This module defines the
//! seam the [`Registry`](super::Registry) talks to, [`SchemaCompiler`], and two implementations:
//!
//! * [`ProtocCompiler`] runs the `protoc` binary as a child process and reads back the
//!   descriptor set it writes.
//! * [`PrecompiledDescriptorSet`] serves a descriptor set that was compiled ahead of time
//!   (e.g. with `protoc --descriptor_set_out` in a build step).
use prost::Message;
use prost_types::FileDescriptorSet;
use std::{
    future::Future,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("No schema source files were given")]
    NoSources,

    #[error("Failed to start '{program}'")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Schema compiler exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("Schema compiler did not finish within {0:?}")]
    Timeout(Duration),

    #[error("I/O error while compiling schemas")]
    Io(#[from] std::io::Error),

    #[error("Schema compiler produced an invalid descriptor set")]
    InvalidOutput(#[from] prost::DecodeError),
}

/// An external collaborator compiling `.proto` sources into a `FileDescriptorSet`.
///
/// Implementations must return the descriptors of the sources *and* of everything they import,
/// so that the resulting set is self-contained.
pub trait SchemaCompiler {
    fn compile(
        &self,
        sources: &[PathBuf],
        working_dir: &Path,
    ) -> impl Future<Output = Result<FileDescriptorSet, CompileError>> + Send;
}

/// Default upper bound for a single `protoc` invocation.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Compiles schemas by running `protoc`.
#[derive(Debug, Clone)]
pub struct ProtocCompiler {
    program: PathBuf,
    include_paths: Vec<PathBuf>,
    timeout: Duration,
}

impl Default for ProtocCompiler {
    fn default() -> Self {
        Self {
            program: PathBuf::from("protoc"),
            include_paths: Vec::new(),
            timeout: DEFAULT_COMPILE_TIMEOUT,
        }
    }
}

impl ProtocCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Adds extra directories to the proto search path (e.g. shared well-known types).
    pub fn with_include_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include_paths.extend(paths);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, sources: &[PathBuf], working_dir: &Path, out: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(format!("--proto_path={}", working_dir.display()))
            .args(
                self.include_paths
                    .iter()
                    .map(|p| format!("--proto_path={}", p.display())),
            )
            .arg("--include_imports")
            .arg(format!("--descriptor_set_out={}", out.display()))
            // protoc wants the sources relative to one of the search paths
            .args(
                sources
                    .iter()
                    .map(|s| s.strip_prefix(working_dir).unwrap_or(s.as_path())),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl SchemaCompiler for ProtocCompiler {
    async fn compile(
        &self,
        sources: &[PathBuf],
        working_dir: &Path,
    ) -> Result<FileDescriptorSet, CompileError> {
        if sources.is_empty() {
            return Err(CompileError::NoSources);
        }

        // Removed when dropped, on every exit path.
        let out = tempfile::Builder::new()
            .prefix("descriptor-set-")
            .suffix(".bin")
            .tempfile()?;

        let mut command = self.command(sources, working_dir, out.path());

        tracing::debug!(
            program = %self.program.display(),
            sources = sources.len(),
            working_dir = %working_dir.display(),
            "running schema compiler"
        );

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| CompileError::Timeout(self.timeout))?
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CompileError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let bytes = tokio::fs::read(out.path()).await?;
        Ok(FileDescriptorSet::decode(bytes.as_slice())?)
    }
}

/// Serves a descriptor set compiled ahead of time, ignoring the sources it is asked to compile.
#[derive(Debug, Clone)]
pub struct PrecompiledDescriptorSet(FileDescriptorSet);

impl PrecompiledDescriptorSet {
    pub fn new(file_descriptor_set: FileDescriptorSet) -> Self {
        Self(file_descriptor_set)
    }

    /// Decodes an encoded `FileDescriptorSet` (the output of `protoc --descriptor_set_out`).
    pub fn decode(bytes: &[u8]) -> Result<Self, CompileError> {
        Ok(Self(FileDescriptorSet::decode(bytes)?))
    }
}

impl SchemaCompiler for PrecompiledDescriptorSet {
    async fn compile(
        &self,
        _sources: &[PathBuf],
        _working_dir: &Path,
    ) -> Result<FileDescriptorSet, CompileError> {
        Ok(self.0.clone())
    }
}
