//! # kml-validator Library
//!
//! Validates KML documents against a compiled set of XML Schemas with
//! libxml2 and reports every warning, error and fatal error as JSON.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod http_client;
pub mod libxml2;
pub mod logging;
pub mod result;
pub mod schema_loader;
pub mod schema_set;
pub mod server;
pub mod validator;

pub use cli::{Cli, Command, VerbosityLevel};
pub use collector::{ErrorCollector, ParseNotification};
pub use config::{Config, ConfigError, ConfigManager};
pub use error::{LibXml2Error, ValidationError};
pub use http_client::{AsyncHttpClient, HttpClientConfig};
pub use libxml2::{LibXml2Wrapper, XmlSchemaPtr};
pub use result::{Severity, ValidationEvent, ValidationResult, ValidationStatus};
pub use schema_loader::{DEFAULT_SCHEMA_SOURCES, SchemaLoader, SchemaSource, SchemaSourceType};
pub use schema_set::{SchemaDocument, SchemaSet};
pub use server::{AppState, SchemaStore};
pub use validator::Validator;
