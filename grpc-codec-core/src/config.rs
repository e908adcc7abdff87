//! # Settings
//!
//! [`CodecSettings`] gathers everything a codec needs besides the schema sources themselves. It
//! is plain data, loadable from a JSON file where every field is optional:
//!
//! ```json
//! {
//!   "protoc": { "path": "/usr/bin/protoc", "include_paths": ["/usr/include"], "timeout_secs": 10 },
//!   "decode": { "include_default_values": true },
//!   "archive": { "recursive": false }
//! }
//! ```
use crate::{
    archive::PackOptions, registry::compiler::ProtocCompiler, tree::ConvertOptions,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}'")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings file '{path}'")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    pub protoc: ProtocSettings,
    pub decode: ConvertOptions,
    pub archive: PackOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocSettings {
    /// The `protoc` executable, looked up on `PATH` when relative.
    pub path: PathBuf,
    /// Extra proto search paths, e.g. a directory holding shared well-known types.
    pub include_paths: Vec<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ProtocSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("protoc"),
            include_paths: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl ProtocSettings {
    pub fn compiler(&self) -> ProtocCompiler {
        ProtocCompiler::new(&self.path)
            .with_include_paths(self.include_paths.iter().cloned())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

impl CodecSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let settings: CodecSettings =
            serde_json::from_str(r#"{ "decode": { "include_default_values": true } }"#).unwrap();

        assert!(settings.decode.include_default_values);
        assert_eq!(settings.protoc, ProtocSettings::default());
        assert!(settings.archive.recursive);
    }

    #[test]
    fn test_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "protoc": { "path": "/opt/protoc", "timeout_secs": 5 }, "archive": { "recursive": false } }"#,
        )
        .unwrap();

        let settings = CodecSettings::load(&path).unwrap();
        assert_eq!(settings.protoc.path, PathBuf::from("/opt/protoc"));
        assert_eq!(settings.protoc.timeout_secs, 5);
        assert!(!settings.archive.recursive);
    }

    #[test]
    fn test_reports_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            CodecSettings::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            CodecSettings::load(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
