//! Compiled, read-only schema set shared by every validation run.
//!
//! libxml2 compiles one root schema per validation context, while KML needs
//! several namespaces (KML, Atom, xAL, the Google extensions). The set is
//! therefore compiled through a generated driver schema that imports each
//! document, in the configured order, from a private staging directory. A
//! later `xs:import` of a namespace that is already loaded is skipped by
//! libxml2, so references between the documents never reach the network.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::{Result, ValidationError};
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};

/// Cached regex for the `targetNamespace` attribute
static TARGET_NAMESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_target_namespace_regex() -> &'static Regex {
    TARGET_NAMESPACE_REGEX.get_or_init(|| {
        Regex::new(r#"targetNamespace\s*=\s*["']([^"']*)["']"#)
            .expect("Failed to compile targetNamespace regex")
    })
}

/// One fetched schema document
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    location: String,
    target_namespace: Option<String>,
    data: Vec<u8>,
}

impl SchemaDocument {
    /// Wrap raw schema bytes fetched from `location`.
    pub fn new(location: impl Into<String>, data: Vec<u8>) -> Self {
        let target_namespace = std::str::from_utf8(&data)
            .ok()
            .and_then(extract_target_namespace);

        Self {
            location: location.into(),
            target_namespace,
            data,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// `targetNamespace` of the root `schema` element, if any
fn extract_target_namespace(content: &str) -> Option<String> {
    let start = schema_element_start(content)?;
    let tag_end = content[start..].find('>').map(|i| start + i)?;
    let root_tag = &content[start..tag_end];

    get_target_namespace_regex()
        .captures(root_tag)
        .map(|caps| caps[1].to_string())
        .filter(|ns| !ns.is_empty())
}

fn schema_element_start(content: &str) -> Option<usize> {
    ["<xs:schema", "<xsd:schema", "<schema"]
        .iter()
        .filter_map(|tag| content.find(tag))
        .min()
}

/// Escape a value for use inside a double-quoted XML attribute
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Build the driver schema importing each staged document in order.
fn driver_schema(staged: &[(Option<&str>, PathBuf)]) -> String {
    let mut driver = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\" elementFormDefault=\"qualified\">\n",
    );

    for (namespace, path) in staged {
        let location = escape_attribute(&path.to_string_lossy());
        match namespace {
            Some(ns) => driver.push_str(&format!(
                "  <xs:import namespace=\"{}\" schemaLocation=\"{}\"/>\n",
                escape_attribute(ns),
                location
            )),
            None => driver.push_str(&format!("  <xs:include schemaLocation=\"{}\"/>\n", location)),
        }
    }

    driver.push_str("</xs:schema>\n");
    driver
}

/// Removes the staging directory when compilation is done, whatever the outcome
struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    fn create(root: &Path) -> Result<Self> {
        let path = root.join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&path).map_err(|e| ValidationError::Staging {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { path })
    }

    fn stage(&self, index: usize, document: &SchemaDocument) -> Result<PathBuf> {
        let path = self.path.join(format!("{:02}.xsd", index));
        std::fs::write(&path, document.data()).map_err(|e| ValidationError::Staging {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(path)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::debug!(
                path = %self.path.display(),
                error = %e,
                "could not remove schema staging directory"
            );
        }
    }
}

/// Ordered collection of schema documents compiled into one libxml2 schema
#[derive(Debug, Clone)]
pub struct SchemaSet {
    schema: XmlSchemaPtr,
    locations: Arc<[String]>,
}

impl SchemaSet {
    /// Compile `documents`, in order, into a single schema.
    ///
    /// Blocking; run it off the async executor. Must not run concurrently
    /// with another compilation.
    pub fn compile(
        wrapper: &LibXml2Wrapper,
        documents: &[SchemaDocument],
        staging_root: &Path,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(ValidationError::Config(
                "At least one schema source must be configured".to_string(),
            ));
        }

        let staging = StagingDir::create(staging_root)?;
        let mut staged = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter().enumerate() {
            let path = staging.stage(index, document)?;
            staged.push((document.target_namespace(), path));
        }

        let driver = driver_schema(&staged);
        tracing::debug!(
            documents = documents.len(),
            staging = %staging.path.display(),
            "compiling schema set"
        );

        let schema = wrapper.parse_schema_from_memory(driver.as_bytes())?;
        drop(staging);

        Ok(Self {
            schema,
            locations: documents.iter().map(|d| d.location().to_string()).collect(),
        })
    }

    pub(crate) fn schema(&self) -> &XmlSchemaPtr {
        &self.schema
    }

    /// Source locations, in compilation order
    pub fn locations(&self) -> &[String] {
        &self.locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ATOM_LIKE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:test:a" xmlns="urn:test:a" elementFormDefault="qualified">
    <xs:element name="author" type="xs:string"/>
</xs:schema>"#;

    const KML_LIKE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:a="urn:test:a"
           targetNamespace="urn:test:k" xmlns="urn:test:k" elementFormDefault="qualified">
    <xs:import namespace="urn:test:a"/>
    <xs:element name="doc">
        <xs:complexType>
            <xs:sequence>
                <xs:element ref="a:author" minOccurs="0"/>
                <xs:element name="name" type="xs:string"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

    #[test]
    fn test_target_namespace_extraction() {
        assert_eq!(
            extract_target_namespace(ATOM_LIKE_XSD).as_deref(),
            Some("urn:test:a")
        );
        assert_eq!(
            extract_target_namespace(
                r#"<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema" targetNamespace='urn:x'>"#
            )
            .as_deref(),
            Some("urn:x")
        );
        assert_eq!(
            extract_target_namespace(
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:element name="e" type="xs:string"/></xs:schema>"#
            ),
            None
        );
    }

    #[test]
    fn test_target_namespace_ignores_nested_elements() {
        let content = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:annotation><xs:appinfo targetNamespace="urn:not-me"/></xs:annotation>
</xs:schema>"#;
        assert_eq!(extract_target_namespace(content), None);
    }

    #[test]
    fn test_driver_schema_imports_in_order() {
        let driver = driver_schema(&[
            (Some("urn:test:a"), PathBuf::from("/stage/00.xsd")),
            (None, PathBuf::from("/stage/01.xsd")),
            (Some("urn:test:k"), PathBuf::from("/stage/a&b/02.xsd")),
        ]);

        let first = driver.find("urn:test:a").unwrap();
        let include = driver.find("xs:include").unwrap();
        let last = driver.find("urn:test:k").unwrap();
        assert!(first < include && include < last);
        assert!(driver.contains(r#"schemaLocation="/stage/a&amp;b/02.xsd""#));
    }

    #[test]
    fn test_compile_multi_namespace_set() {
        let staging_root = TempDir::new().unwrap();
        let wrapper = LibXml2Wrapper::new();
        let documents = vec![
            SchemaDocument::new("a.xsd", ATOM_LIKE_XSD.as_bytes().to_vec()),
            SchemaDocument::new("k.xsd", KML_LIKE_XSD.as_bytes().to_vec()),
        ];

        let set = SchemaSet::compile(&wrapper, &documents, staging_root.path()).unwrap();

        assert_eq!(set.locations(), &["a.xsd".to_string(), "k.xsd".to_string()]);
        assert!(set.schema().is_valid());
        // staging directory is cleaned up after compilation
        assert_eq!(std::fs::read_dir(staging_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_compile_rejects_broken_schema() {
        let staging_root = TempDir::new().unwrap();
        let wrapper = LibXml2Wrapper::new();
        let documents = vec![SchemaDocument::new(
            "broken.xsd",
            br#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:b"><xs:element name="x" type="xs:nope"/></xs:schema>"#.to_vec(),
        )];

        let result = SchemaSet::compile(&wrapper, &documents, staging_root.path());
        assert!(matches!(result, Err(ValidationError::LibXml2(_))));
        assert_eq!(std::fs::read_dir(staging_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_compile_requires_documents() {
        let staging_root = TempDir::new().unwrap();
        let wrapper = LibXml2Wrapper::new();

        let result = SchemaSet::compile(&wrapper, &[], staging_root.path());
        assert!(matches!(result, Err(ValidationError::Config(_))));
    }
}
