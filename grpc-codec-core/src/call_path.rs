//! # Call Path
//!
//! gRPC carries the target of a call in its HTTP/2 path (`/package.Service/Method`).
//! [`CallPath`] splits such a path into the service and method names used as registry keys.
//!
//! Parsing is strict: after one optional leading `/`, the path must consist of exactly two
//! non-empty segments. The segments are used verbatim, no case or whitespace normalization
//! takes place.
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallPathError {
    #[error("Invalid call path '{path}': expected 2 segments ('/Service/Method'), found {found}")]
    InvalidSegmentCount { path: String, found: usize },

    #[error("Invalid call path '{0}': service and method names cannot be empty")]
    EmptySegment(String),
}

/// A `(service, method)` pair identifying the schema of a gRPC payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallPath {
    service: String,
    method: String,
}

impl CallPath {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Parses a `/Service/Method` string.
    ///
    /// # Errors
    ///
    /// Returns a [`CallPathError`] if the path does not contain exactly two segments or if
    /// one of them is empty.
    pub fn parse(path: &str) -> Result<Self, CallPathError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = trimmed.split('/').collect();

        if segments.len() != 2 {
            return Err(CallPathError::InvalidSegmentCount {
                path: path.to_string(),
                found: segments.iter().filter(|s| !s.is_empty()).count(),
            });
        }

        if segments.iter().any(|s| s.is_empty()) {
            return Err(CallPathError::EmptySegment(path.to_string()));
        }

        Ok(Self::new(segments[0], segments[1]))
    }

    /// The fully qualified service name (e.g. `my.package.Service`).
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The method name (e.g. `SayHello`).
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl FromStr for CallPath {
    type Err = CallPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.service, self.method)
    }
}
