//! Validation outcome types and their JSON response shape.
//!
//! A run produces one [`ValidationResult`] which serializes to
//!
//! ```text
//! {"status":"invalid","errors":[{"type":"error","message":"...","line":4,"column":10}]}
//! ```
//!
//! `errors` is omitted when empty, `line` and `column` are omitted when the
//! position is unknown.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Severity of a single validation notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Advisory, validation may still pass per the schema language
    Warning,
    /// Schema violation
    Error,
    /// Parsing-breaking problem, e.g. a well-formedness error
    FatalError,
}

impl Severity {
    /// Map a libxml2 `xmlErrorLevel` to a severity.
    ///
    /// Unknown levels map to [`Severity::FatalError`].
    pub fn from_level(level: i32) -> Self {
        match level {
            1 => Severity::Warning,
            2 => Severity::Error,
            3 => Severity::FatalError,
            _ => Severity::FatalError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::FatalError => "fatal_error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported issue, immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEvent {
    #[serde(rename = "type")]
    severity: Severity,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<u32>,
}

impl ValidationEvent {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        line: Option<u32>,
        column: Option<u32>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            line,
            column,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn column(&self) -> Option<u32> {
        self.column
    }
}

/// Overall status of a validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    InternalError,
}

/// Final outcome of one validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    status: ValidationStatus,
    #[serde(rename = "errors", default, skip_serializing_if = "Vec::is_empty")]
    events: Vec<ValidationEvent>,
}

impl ValidationResult {
    /// A run with no reported issues
    pub fn valid() -> Self {
        Self {
            status: ValidationStatus::Valid,
            events: Vec::new(),
        }
    }

    /// Classify the events delivered by a completed parse.
    pub fn from_events(events: Vec<ValidationEvent>) -> Self {
        if events.is_empty() {
            Self::valid()
        } else {
            Self {
                status: ValidationStatus::Invalid,
                events,
            }
        }
    }

    /// A run that failed for reasons unrelated to the document content.
    /// Carries exactly one synthetic `fatal_error` event.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::InternalError,
            events: vec![ValidationEvent::new(
                Severity::FatalError,
                message,
                None,
                None,
            )],
        }
    }

    pub fn status(&self) -> ValidationStatus {
        self.status
    }

    pub fn events(&self) -> &[ValidationEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ValidationEvent> {
        self.events
    }

    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }

    pub fn is_invalid(&self) -> bool {
        self.status == ValidationStatus::Invalid
    }

    pub fn is_internal_error(&self) -> bool {
        self.status == ValidationStatus::InternalError
    }

    /// Compact JSON object
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Compact JSON object followed by a newline, as sent over HTTP
    pub fn to_json_line(&self) -> Result<String> {
        let mut body = self.to_json()?;
        body.push('\n');
        Ok(body)
    }
}
