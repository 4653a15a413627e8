//! Validation Orchestrator
//!
//! Drives one validation run end to end and classifies the outcome:
//!
//! 1. **Setup failure**: the schema set could not be built, the parser could
//!    not be configured, or the engine failed on its own account. Reported as
//!    `internal_error` with a single synthetic `fatal_error` event.
//! 2. **Content issues**: the parse completed and the collector holds at
//!    least one event. Reported as `invalid` with the events in arrival order.
//! 3. **No issues**: reported as `valid`.
//!
//! A fatal well-formedness error ends the parse. Events delivered before it
//! are kept and nothing is appended after it.

use std::sync::Arc;

use crate::collector::ErrorCollector;
use crate::error::{LibXml2Error, LibXml2Result, ValidationError};
use crate::libxml2::{EngineStatus, LibXml2Wrapper};
use crate::result::ValidationResult;
use crate::schema_set::SchemaSet;

/// Message for failures while configuring the parser
pub const PARSER_CONFIGURATION_MESSAGE: &str = "Internal parse error.";

/// Prefix for every other internal failure
pub const INTERNAL_ERROR_PREFIX: &str = "Internal error: ";

/// Runs validation passes against a shared [`SchemaSet`]
#[derive(Clone, Default)]
pub struct Validator {
    libxml2_wrapper: Arc<LibXml2Wrapper>,
}

impl Validator {
    pub fn new(libxml2_wrapper: Arc<LibXml2Wrapper>) -> Self {
        Self { libxml2_wrapper }
    }

    /// Validate `document` against the outcome of schema-set construction.
    ///
    /// Never fails: every failure is folded into the returned result.
    pub fn validate(
        &self,
        schemas: Result<&SchemaSet, &ValidationError>,
        document: &[u8],
    ) -> ValidationResult {
        let schemas = match schemas {
            Ok(schemas) => schemas,
            Err(error) => return internal_error(error),
        };

        let mut collector = ErrorCollector::new();
        let outcome = self
            .libxml2_wrapper
            .validate_memory(schemas.schema(), document, &mut collector);

        let result = classify(outcome, collector);
        tracing::debug!(
            status = ?result.status(),
            events = result.events().len(),
            bytes = document.len(),
            "document validated"
        );
        result
    }

    /// Validate against a schema set that is known to be available
    pub fn validate_with(&self, schemas: &SchemaSet, document: &[u8]) -> ValidationResult {
        self.validate(Ok(schemas), document)
    }
}

/// Map a completed or failed engine run onto a result.
///
/// Engine and parser configuration failures win over anything the collector
/// holds at that point.
fn classify(outcome: LibXml2Result<EngineStatus>, collector: ErrorCollector) -> ValidationResult {
    match outcome {
        Ok(_) => ValidationResult::from_events(collector.into_events()),
        Err(error) if error.is_parser_configuration() => {
            tracing::error!(%error, "parser configuration failed");
            ValidationResult::internal_error(PARSER_CONFIGURATION_MESSAGE)
        }
        Err(error) => internal_error(&ValidationError::from(error)),
    }
}

fn internal_error(error: &ValidationError) -> ValidationResult {
    tracing::error!(%error, "validation setup failed");
    ValidationResult::internal_error(format!("{}{}", INTERNAL_ERROR_PREFIX, short_cause(error)))
}

/// Cause text for the caller, without local filesystem paths or libxml2's
/// schema diagnostics
fn short_cause(error: &ValidationError) -> String {
    match error {
        ValidationError::LibXml2(LibXml2Error::SchemaParseFailed { .. }) => {
            "the schema set could not be compiled".to_string()
        }
        ValidationError::Staging { .. } => "the schema set could not be staged".to_string(),
        ValidationError::Io(_) => "a schema source could not be read".to_string(),
        ValidationError::SchemaNotFound { url } => {
            format!("Schema not found: {}", public_location(url))
        }
        ValidationError::SchemaParsing { url, details } => {
            format!("Schema parsing error: {} - {}", public_location(url), details)
        }
        other => other.to_string(),
    }
}

/// Remote locations are shown as configured; local ones by file name only
fn public_location(location: &str) -> &str {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location;
    }
    std::path::Path::new(location)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("local schema")
}
