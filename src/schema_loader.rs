use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;

use crate::error::{Result, ValidationError};
use crate::http_client::AsyncHttpClient;
use crate::libxml2::LibXml2Wrapper;
use crate::schema_set::{SchemaDocument, SchemaSet};

/// Schemas the KML validator uses by default, dependency order first
pub const DEFAULT_SCHEMA_SOURCES: &[&str] = &[
    "http://schemas.opengis.net/kml/2.2.0/atom-author-link.xsd",
    "http://docs.oasis-open.org/election/external/xAL.xsd",
    "http://schemas.opengis.net/kml/2.2.0/ogckml22.xsd",
    "http://code.google.com/apis/kml/schema/kml22gx.xsd",
];

/// Type of schema source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSourceType {
    Local(PathBuf),
    Remote(String),
}

/// One configured schema location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    pub location: String,
    pub source_type: SchemaSourceType,
}

impl SchemaSource {
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        Self {
            location: location.to_string(),
            source_type: Self::determine_source_type(location),
        }
    }

    /// Determine if a schema location is local or remote
    fn determine_source_type(location: &str) -> SchemaSourceType {
        if location.starts_with("http://") || location.starts_with("https://") {
            SchemaSourceType::Remote(location.to_string())
        } else {
            SchemaSourceType::Local(PathBuf::from(location))
        }
    }
}

/// Schema provider: fetches the configured sources and compiles them into a
/// [`SchemaSet`]
pub struct SchemaLoader {
    http_client: AsyncHttpClient,
    libxml2_wrapper: Arc<LibXml2Wrapper>,
    staging_dir: PathBuf,
}

impl SchemaLoader {
    pub fn new(
        http_client: AsyncHttpClient,
        libxml2_wrapper: Arc<LibXml2Wrapper>,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            http_client,
            libxml2_wrapper,
            staging_dir,
        }
    }

    /// Fetch every source concurrently, then compile them in the given order.
    pub async fn load(&self, sources: &[SchemaSource]) -> Result<SchemaSet> {
        if sources.is_empty() {
            return Err(ValidationError::Config(
                "At least one schema source must be configured".to_string(),
            ));
        }

        let documents = try_join_all(sources.iter().map(|source| self.fetch(source))).await?;

        let wrapper = Arc::clone(&self.libxml2_wrapper);
        let staging_dir = self.staging_dir.clone();

        // Schema compilation is CPU bound and blocking.
        let schema_set = tokio::task::spawn_blocking(move || {
            SchemaSet::compile(&wrapper, &documents, &staging_dir)
        })
        .await
        .map_err(|e| ValidationError::Concurrency {
            details: e.to_string(),
        })??;

        tracing::info!(schemas = ?schema_set.locations(), "schema set compiled");
        Ok(schema_set)
    }

    /// Fetch and sanity-check a single schema document
    pub async fn fetch(&self, source: &SchemaSource) -> Result<SchemaDocument> {
        let data = match &source.source_type {
            SchemaSourceType::Local(path) => self.load_local_schema(path).await?,
            SchemaSourceType::Remote(url) => self.http_client.download_schema(url).await?,
        };

        Self::validate_schema_content(&data, &source.location)?;
        Ok(SchemaDocument::new(source.location.clone(), data))
    }

    async fn load_local_schema(&self, schema_path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(schema_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ValidationError::SchemaNotFound {
                    url: schema_path.display().to_string(),
                },
                _ => ValidationError::Io(e),
            })
    }

    /// Validate that the schema content is well-formed enough to be an XSD
    fn validate_schema_content(data: &[u8], source: &str) -> Result<()> {
        let content = std::str::from_utf8(data).map_err(|_| ValidationError::SchemaParsing {
            url: source.to_string(),
            details: "Schema content is not valid UTF-8".to_string(),
        })?;

        if !content.trim_start().starts_with('<') {
            return Err(ValidationError::SchemaParsing {
                url: source.to_string(),
                details: "Schema content does not appear to be XML".to_string(),
            });
        }

        if !content.contains("<xs:schema")
            && !content.contains("<xsd:schema")
            && !content.contains("<schema")
        {
            return Err(ValidationError::SchemaParsing {
                url: source.to_string(),
                details: "Content does not appear to be an XML Schema (XSD)".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpClientConfig;
    use tempfile::TempDir;

    const SIMPLE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root" type="xs:string"/>
</xs:schema>"#;

    fn create_test_loader(staging: &Path) -> SchemaLoader {
        SchemaLoader::new(
            AsyncHttpClient::new(HttpClientConfig::default()).unwrap(),
            Arc::new(LibXml2Wrapper::new()),
            staging.to_path_buf(),
        )
    }

    #[test]
    fn test_source_type_detection() {
        assert_eq!(
            SchemaSource::parse("http://example.com/schema.xsd").source_type,
            SchemaSourceType::Remote("http://example.com/schema.xsd".to_string())
        );
        assert_eq!(
            SchemaSource::parse("https://example.com/schema.xsd").source_type,
            SchemaSourceType::Remote("https://example.com/schema.xsd".to_string())
        );
        assert_eq!(
            SchemaSource::parse(" schemas/kml.xsd ").source_type,
            SchemaSourceType::Local(PathBuf::from("schemas/kml.xsd"))
        );
    }

    #[test]
    fn test_default_sources_are_remote() {
        for location in DEFAULT_SCHEMA_SOURCES {
            assert!(matches!(
                SchemaSource::parse(location).source_type,
                SchemaSourceType::Remote(_)
            ));
        }
    }

    #[test]
    fn test_validate_schema_content() {
        assert!(SchemaLoader::validate_schema_content(SIMPLE_XSD.as_bytes(), "s.xsd").is_ok());

        let not_xml = SchemaLoader::validate_schema_content(b"hello", "s.xsd");
        assert!(matches!(not_xml, Err(ValidationError::SchemaParsing { .. })));

        let not_schema = SchemaLoader::validate_schema_content(b"<html></html>", "s.xsd");
        assert!(matches!(not_schema, Err(ValidationError::SchemaParsing { .. })));

        let not_utf8 = SchemaLoader::validate_schema_content(&[0xff, 0xfe, 0x3c], "s.xsd");
        assert!(matches!(not_utf8, Err(ValidationError::SchemaParsing { .. })));
    }

    #[tokio::test]
    async fn test_load_local_schema_set() {
        let temp_dir = TempDir::new().unwrap();
        let schema_path = temp_dir.path().join("simple.xsd");
        tokio::fs::write(&schema_path, SIMPLE_XSD).await.unwrap();
        let staging = temp_dir.path().join("staging");

        let loader = create_test_loader(&staging);
        let set = loader
            .load(&[SchemaSource::parse(schema_path.to_str().unwrap())])
            .await
            .unwrap();

        assert_eq!(set.locations().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_local_schema() {
        let temp_dir = TempDir::new().unwrap();
        let loader = create_test_loader(temp_dir.path());

        let result = loader
            .load(&[SchemaSource::parse("/nonexistent/kml.xsd")])
            .await;
        assert!(matches!(result, Err(ValidationError::SchemaNotFound { .. })));
    }

    #[tokio::test]
    async fn test_empty_source_list() {
        let temp_dir = TempDir::new().unwrap();
        let loader = create_test_loader(temp_dir.path());

        assert!(matches!(
            loader.load(&[]).await,
            Err(ValidationError::Config(_))
        ));
    }
}
