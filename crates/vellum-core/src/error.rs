//! Error types for vellum.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using vellum's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vellum operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Embedding or LLM provider call failed (rate limit, auth, network).
    /// Transient — callers may retry; results are never cached.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Note could not be parsed (malformed frontmatter, bad encoding).
    /// Skip-and-log — never fatal to the watcher.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A path resolved outside the vault root. The filesystem is never
    /// touched for such paths.
    #[error("Path escapes vault root: '{path}' (root: {root})")]
    PathSecurity { path: String, root: PathBuf },

    /// Embedding cache operation failed.
    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// Vector store operation failed.
    #[error("Index error: {0}")]
    Index(String),

    /// Knowledge graph operation failed.
    #[error("Graph error: {0}")]
    Graph(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_provider() {
        let err = Error::Provider("rate limited".to_string());
        assert_eq!(err.to_string(), "Provider error: rate limited");
    }

    #[test]
    fn test_error_display_parse() {
        let err = Error::Parse("unterminated frontmatter".to_string());
        assert_eq!(err.to_string(), "Parse error: unterminated frontmatter");
    }

    #[test]
    fn test_error_display_path_security() {
        let err = Error::PathSecurity {
            path: "../../etc/passwd".to_string(),
            root: PathBuf::from("/vault"),
        };
        assert!(err.to_string().contains("../../etc/passwd"));
        assert!(err.to_string().contains("/vault"));
    }

    #[test]
    fn test_from_serde_yaml_error_is_parse() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("key: [unclosed");
        assert!(yaml_err.is_err());
        let err: Error = yaml_err.unwrap_err().into();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
