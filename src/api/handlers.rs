//! API Handlers
//!
//! HTTP request handlers for each bridge endpoint. Every handler goes
//! through the shared [`OdooConnection`], so reads hit the caches first.
//! Model endpoints are gated by the [`AccessController`] when one is
//! configured.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::access::AccessController;
use crate::connection::OdooConnection;
use crate::error::{OdooError, Result};
use crate::models::{
    validate_model_name, CountQuery, CountResponse, FieldsQuery, FieldsResponse, HealthResponse,
    RecordQuery, RecordResponse, SearchQuery, SearchResponse,
};
use crate::performance::PerformanceStats;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connected and authenticated bridge connection
    pub connection: Arc<OdooConnection>,
    /// Per-model permission checks; every model is readable when `None`
    pub access: Option<Arc<AccessController>>,
}

impl AppState {
    pub fn new(connection: Arc<OdooConnection>) -> Self {
        Self {
            connection,
            access: None,
        }
    }

    /// Gates every model endpoint behind `access`.
    pub fn with_access(mut self, access: Arc<AccessController>) -> Self {
        self.access = Some(access);
        self
    }

    /// Validates the model name and checks that it may be read.
    async fn readable_model(&self, model: &str) -> Result<()> {
        if let Some(message) = validate_model_name(model) {
            return Err(OdooError::InvalidRequest(message));
        }
        match &self.access {
            Some(access) => access.validate_model_access(model, "read").await,
            None => Ok(()),
        }
    }
}

/// Handler for GET /health
///
/// Checks the backend version. Answers 503 when the check fails.
pub async fn health_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let connection = &state.connection;
    let (healthy, message) = connection.check_health().await;

    let mut response = HealthResponse::new(healthy, message);
    response.authenticated = connection.is_authenticated();
    response.database = connection.database();
    response.auth_method = connection.auth_method();

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Handler for GET /stats
///
/// Cache, pool and timing statistics of the performance manager.
pub async fn stats_handler(State(state): State<AppState>) -> Json<PerformanceStats> {
    Json(state.connection.performance_manager().stats())
}

/// Handler for GET /models/:model/fields
pub async fn fields_handler(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<FieldsQuery>,
) -> Result<Json<FieldsResponse>> {
    state.readable_model(&model).await?;
    let attributes = query.attributes();
    let fields = state
        .connection
        .fields_get(&model, attributes.as_deref())
        .await?;

    Ok(Json(FieldsResponse { model, fields }))
}

/// Handler for GET /models/:model/records/:id
pub async fn record_handler(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, i64)>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<RecordResponse>> {
    state.readable_model(&model).await?;
    let fields = query.fields();
    let record = state
        .connection
        .read(&model, &[id], fields.as_deref())
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| OdooError::NotFound(format!("{}/{}", model, id)))?;

    Ok(Json(RecordResponse { model, record }))
}

/// Handler for GET /models/:model/search
pub async fn search_handler(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    state.readable_model(&model).await?;
    let domain = query.domain().map_err(OdooError::InvalidRequest)?;
    let fields = query.fields();
    let records = state
        .connection
        .search_read(
            &model,
            domain,
            fields.as_deref(),
            &query.options(state.connection.config()),
        )
        .await?;

    Ok(Json(SearchResponse::new(model, records)))
}

/// Handler for GET /models/:model/count
pub async fn count_handler(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<CountResponse>> {
    state.readable_model(&model).await?;
    let domain = query.domain().map_err(OdooError::InvalidRequest)?;
    let count = state.connection.search_count(&model, domain).await?;

    Ok(Json(CountResponse { model, count }))
}
