//! Shared fixtures for the integration tests: a miniature KML schema set
//! (Atom, KML and Google extension namespaces) and a throwaway HTTP server
//! that publishes it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{Router, extract::Path as UrlPath, extract::State, http::StatusCode, routing::get};
use tokio::net::TcpListener;

pub const ATOM_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema xmlns="http://www.w3.org/2001/XMLSchema"
        targetNamespace="http://www.w3.org/2005/Atom"
        elementFormDefault="qualified">
  <element name="author">
    <complexType>
      <sequence>
        <element name="name" type="string"/>
      </sequence>
    </complexType>
  </element>
</schema>
"#;

/// Imports Atom by a relative location that never resolves: the namespace is
/// already part of the set, so the import is skipped.
pub const KML_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema xmlns="http://www.w3.org/2001/XMLSchema"
        xmlns:kml="http://www.opengis.net/kml/2.2"
        xmlns:atom="http://www.w3.org/2005/Atom"
        targetNamespace="http://www.opengis.net/kml/2.2"
        elementFormDefault="qualified">
  <import namespace="http://www.w3.org/2005/Atom" schemaLocation="atom-author-link.xsd"/>
  <element name="kml" type="kml:KmlType"/>
  <complexType name="KmlType">
    <sequence>
      <element ref="kml:Placemark" minOccurs="0" maxOccurs="unbounded"/>
    </sequence>
  </complexType>
  <element name="Placemark" type="kml:PlacemarkType"/>
  <complexType name="PlacemarkType">
    <sequence>
      <element ref="atom:author" minOccurs="0"/>
      <element name="name" type="string" minOccurs="0"/>
      <element name="visibility" type="boolean" minOccurs="0"/>
      <element name="Point" minOccurs="0">
        <complexType>
          <sequence>
            <element name="coordinates" type="string"/>
          </sequence>
        </complexType>
      </element>
    </sequence>
    <attribute name="id" type="ID"/>
  </complexType>
</schema>
"#;

/// Imports KML from its public URL; skipped for the same reason.
pub const GX_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<schema xmlns="http://www.w3.org/2001/XMLSchema"
        xmlns:kml="http://www.opengis.net/kml/2.2"
        targetNamespace="http://www.google.com/kml/ext/2.2"
        elementFormDefault="qualified">
  <import namespace="http://www.opengis.net/kml/2.2"
          schemaLocation="http://schemas.opengis.net/kml/2.2.0/ogckml22.xsd"/>
  <element name="Tour">
    <complexType>
      <sequence>
        <element name="name" type="string"/>
      </sequence>
    </complexType>
  </element>
</schema>
"#;

pub const VALID_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2" xmlns:atom="http://www.w3.org/2005/Atom">
  <Placemark id="p1">
    <atom:author><atom:name>Ann</atom:name></atom:author>
    <name>Office</name>
    <Point><coordinates>-122.0822,37.4222,0</coordinates></Point>
  </Placemark>
</kml>
"#;

/// Two schema violations, on lines 4 and 7
pub const INVALID_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Placemark>
    <visibility>maybe</visibility>
  </Placemark>
  <Placemark>
    <visibility>perhaps</visibility>
  </Placemark>
</kml>
"#;

/// A schema violation on line 4, then a tag mismatch on line 5
pub const MALFORMED_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Placemark>
    <visibility>maybe</visibility>
  </Placemark2>
  <Placemark>
    <visibility>never reported</visibility>
  </Placemark>
</kml>
"#;

/// Write the three schemas into `dir`, returning their paths in set order.
pub fn write_schema_files(dir: &Path) -> Vec<PathBuf> {
    [
        ("atom-author-link.xsd", ATOM_XSD),
        ("ogckml22.xsd", KML_XSD),
        ("kml22gx.xsd", GX_XSD),
    ]
    .iter()
    .map(|(name, content)| {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    })
    .collect()
}

/// Throwaway HTTP server publishing the schema set under `/kml/2.2.0/`.
pub struct SchemaServer {
    pub addr: SocketAddr,
    available: Arc<AtomicBool>,
}

#[derive(Clone)]
struct SchemaServerState {
    files: Arc<HashMap<&'static str, &'static str>>,
    available: Arc<AtomicBool>,
}

impl SchemaServer {
    pub async fn start() -> Self {
        let available = Arc::new(AtomicBool::new(true));
        let state = SchemaServerState {
            files: Arc::new(HashMap::from([
                ("atom-author-link.xsd", ATOM_XSD),
                ("ogckml22.xsd", KML_XSD),
                ("kml22gx.xsd", GX_XSD),
            ])),
            available: Arc::clone(&available),
        };

        let app = Router::new()
            .route("/kml/2.2.0/:name", get(serve_schema))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });

        Self { addr, available }
    }

    pub fn url(&self, name: &str) -> String {
        format!("http://{}/kml/2.2.0/{}", self.addr, name)
    }

    /// Remote locations of the full set, in order
    pub fn schema_urls(&self) -> Vec<String> {
        ["atom-author-link.xsd", "ogckml22.xsd", "kml22gx.xsd"]
            .iter()
            .map(|name| self.url(name))
            .collect()
    }

    /// While unavailable every request is answered with 503
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

async fn serve_schema(
    State(state): State<SchemaServerState>,
    UrlPath(name): UrlPath<String>,
) -> Result<&'static str, StatusCode> {
    if !state.available.load(Ordering::SeqCst) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    state
        .files
        .get(name.as_str())
        .copied()
        .ok_or(StatusCode::NOT_FOUND)
}
