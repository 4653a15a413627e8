//! HTTP boundary of the validator.
//!
//! The document is the raw request body. Every validation outcome, including
//! internal errors, is answered with `200 OK` and a JSON line.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::OnceCell;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{Result, ValidationError};
use crate::http_client::{AsyncHttpClient, HttpClientConfig};
use crate::libxml2::LibXml2Wrapper;
use crate::result::ValidationResult;
use crate::schema_loader::{SchemaLoader, SchemaSource};
use crate::schema_set::SchemaSet;
use crate::validator::{INTERNAL_ERROR_PREFIX, Validator};

/// Served when the result itself cannot be serialized
const SERIALIZATION_FALLBACK: &str = "{\"status\":\"internal_error\",\"errors\":[{\"type\":\"fatal_error\",\"message\":\"Internal error: response serialization failed\"}]}\n";

/// Lazily compiled schema set, shared by every request.
///
/// The first request that needs the set builds it. A failed build is not
/// cached: that request reports it and a later request tries again.
pub struct SchemaStore {
    loader: SchemaLoader,
    sources: Vec<SchemaSource>,
    schema_set: OnceCell<SchemaSet>,
}

impl SchemaStore {
    pub fn new(loader: SchemaLoader, sources: Vec<SchemaSource>) -> Self {
        Self {
            loader,
            sources,
            schema_set: OnceCell::new(),
        }
    }

    /// Store whose set is already compiled
    pub fn with_schema_set(loader: SchemaLoader, schema_set: SchemaSet) -> Self {
        let sources = schema_set
            .locations()
            .iter()
            .map(|location| SchemaSource::parse(location))
            .collect();

        Self {
            loader,
            sources,
            schema_set: OnceCell::new_with(Some(schema_set)),
        }
    }

    pub async fn get(&self) -> Result<&SchemaSet> {
        self.schema_set
            .get_or_try_init(|| async {
                tracing::info!(sources = self.sources.len(), "building schema set");
                self.loader.load(&self.sources).await
            })
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.schema_set.initialized()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub validator: Validator,
    pub schemas: Arc<SchemaStore>,
}

impl AppState {
    pub fn new(validator: Validator, schemas: SchemaStore) -> Self {
        Self {
            validator,
            schemas: Arc::new(schemas),
        }
    }

    /// Wire the schema provider and validator from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let wrapper = Arc::new(LibXml2Wrapper::new());
        let http_client = AsyncHttpClient::new(HttpClientConfig {
            timeout_seconds: config.network.timeout_seconds,
            user_agent: config.network.user_agent.clone(),
        })?;
        let loader = SchemaLoader::new(
            http_client,
            Arc::clone(&wrapper),
            config.schemas.staging_dir.clone(),
        );
        let sources = config
            .schemas
            .sources
            .iter()
            .map(|location| SchemaSource::parse(location))
            .collect();

        Ok(Self::new(
            Validator::new(wrapper),
            SchemaStore::new(loader, sources),
        ))
    }
}

/// Build the service router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", post(validate_document))
        .route("/validate", post(validate_document))
        .route("/health/liveness", get(liveness))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until the process is stopped.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("kml-validator listening on {addr}");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn liveness() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn validate_document(State(state): State<AppState>, body: Bytes) -> Response {
    let schemas = state.schemas.get().await.cloned();
    let validator = state.validator.clone();

    let result = tokio::task::spawn_blocking(move || validator.validate(schemas.as_ref(), &body))
        .await
        .unwrap_or_else(|e| {
            let error = ValidationError::Concurrency {
                details: e.to_string(),
            };
            tracing::error!(%error, "validation task did not complete");
            ValidationResult::internal_error(format!("{}{}", INTERNAL_ERROR_PREFIX, error))
        });

    json_line(&result)
}

fn json_line(result: &ValidationResult) -> Response {
    let body = result.to_json_line().unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize validation result");
        SERIALIZATION_FALLBACK.to_string()
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
