//! Error types for chordfind.
//!
//! Uses thiserror for ergonomic error handling with proper
//! error chain propagation. Every failure of a single request maps to
//! one of these and ends up as an `Error` response; none of them stop
//! the server.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level server error.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),
}

/// Project configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate project name: {0}")]
    DuplicateProject(String),

    #[error("Project {project}: invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        project: String,
        pattern: String,
        reason: String,
    },
}

/// Wire protocol errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Connection closed before a full frame was read")]
    UnexpectedEof,

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(std::io::Error),

    #[error("Timed out waiting for the server")]
    Timeout,

    #[error("Server answered {code}: {message}")]
    Rejected { code: String, message: String },

    #[error("Unexpected answer from the server: {0}")]
    UnexpectedResponse(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(err)
        }
    }
}

/// Request dispatch errors: the request names something that does not exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Malformed location descriptor: '{0}'")]
    MalformedLocation(String),

    #[error("Not a project name: {0}")]
    UnknownProject(String),

    #[error("{location} is not a location of project {project}")]
    UnknownLocation { project: String, location: String },

    #[error("{language} is not a language of project {project}")]
    UnknownLanguage { project: String, language: String },

    #[error("Unknown element '{element}' for language {language}")]
    UnknownElement { language: String, element: String },

    #[error("Malformed target '{target}': {reason}")]
    MalformedTarget { target: String, reason: &'static str },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Action {0} must be handled by the server")]
    ServerAction(u32),
}

/// Search operation errors.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(String),

    #[error("File read error for {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Search cancelled")]
    Cancelled,
}

/// File/directory resolution errors.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{fragment} not found under any of {roots} search roots")]
    NotFound { fragment: String, roots: usize },
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Error code implementations for machine-readable error responses
impl ServerError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.code(),
            Self::Protocol(e) => e.code(),
            Self::Dispatch(e) => e.code(),
            Self::Search(e) => e.code(),
            Self::Resolve(e) => e.code(),
        }
    }
}

impl ConfigError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "CONFIG_READ_ERROR",
            Self::Parse { .. } => "CONFIG_PARSE_ERROR",
            Self::DuplicateProject(_) => "DUPLICATE_PROJECT",
            Self::InvalidPattern { .. } => "CONFIG_INVALID_PATTERN",
        }
    }
}

impl ProtocolError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::FrameTooLarge { .. } => "FRAME_TOO_LARGE",
            Self::UnexpectedEof => "UNEXPECTED_EOF",
            Self::Malformed(_) => "MALFORMED_MESSAGE",
            Self::Io(_) => "IO_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Rejected { .. } => "REJECTED",
            Self::UnexpectedResponse(_) => "UNEXPECTED_RESPONSE",
        }
    }
}

impl DispatchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedLocation(_) => "MALFORMED_LOCATION",
            Self::UnknownProject(_) => "UNKNOWN_PROJECT",
            Self::UnknownLocation { .. } => "UNKNOWN_LOCATION",
            Self::UnknownLanguage { .. } => "UNKNOWN_LANGUAGE",
            Self::UnknownElement { .. } => "UNKNOWN_ELEMENT",
            Self::MalformedTarget { .. } => "MALFORMED_TARGET",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ServerAction(_) => "SERVER_ACTION",
        }
    }
}

impl SearchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPattern(_) => "INVALID_PATTERN",
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl ResolveError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_propagate_through_server_error() {
        let err: ServerError = SearchError::Cancelled.into();
        assert_eq!(err.code(), "CANCELLED");

        let err: ServerError = DispatchError::UnknownProject("x".into()).into();
        assert_eq!(err.code(), "UNKNOWN_PROJECT");
        assert_eq!(err.to_string(), "Dispatch error: Not a project name: x");
    }

    #[test]
    fn test_unexpected_eof_maps_to_its_own_variant() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(ProtocolError::from(io), ProtocolError::UnexpectedEof));

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert_eq!(ProtocolError::from(io).code(), "IO_ERROR");
    }
}
