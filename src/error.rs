use std::path::PathBuf;

use thiserror::Error;

/// Main error type for schema loading, configuration and engine failures.
///
/// Content-level validation problems are never represented here; they are
/// collected as [`crate::ValidationEvent`]s instead.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Schema parsing error: {url} - {details}")]
    SchemaParsing { url: String, details: String },

    #[error("Schema not found: {url}")]
    SchemaNotFound { url: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LibXML2 internal error: {0}")]
    LibXml2(#[from] LibXml2Error),

    #[error("Schema staging error: {path} - {reason}")]
    Staging { path: PathBuf, reason: String },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: {}", diagnostics.join("; "))]
    SchemaParseFailed { diagnostics: Vec<String> },

    #[error("Schema parser context creation failed")]
    ParserContextCreationFailed,

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Input buffer creation failed for {size} byte document")]
    InputBufferCreationFailed { size: usize },

    #[error("Document too large for libxml2: {size} bytes")]
    DocumentTooLarge { size: usize },

    #[error("Validation engine failed with code {code}")]
    InternalError { code: i32 },

    #[error("Validation engine returned code {code} without reporting any diagnostics")]
    SilentFailure { code: i32 },
}

impl LibXml2Error {
    /// Failures that happen while configuring the parser, before any
    /// document byte has been read.
    pub fn is_parser_configuration(&self) -> bool {
        matches!(
            self,
            LibXml2Error::ParserContextCreationFailed
                | LibXml2Error::ValidationContextCreationFailed
                | LibXml2Error::InputBufferCreationFailed { .. }
                | LibXml2Error::DocumentTooLarge { .. }
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
