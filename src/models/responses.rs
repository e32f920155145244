//! Response DTOs for the bridge API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::session::AuthMethod;

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    /// Backend health check result
    pub message: String,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
}

impl HealthResponse {
    pub fn new(healthy: bool, message: impl Into<String>) -> Self {
        Self {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            message: message.into(),
            authenticated: false,
            database: None,
            auth_method: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Response body for `GET /models/:model/records/:id`
#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    pub model: String,
    pub record: Value,
}

/// Response body for `GET /models/:model/search`
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub model: String,
    /// Number of records in this page
    pub count: usize,
    pub records: Vec<Value>,
}

impl SearchResponse {
    pub fn new(model: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            count: records.len(),
            records,
        }
    }
}

/// Response body for `GET /models/:model/count`
#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub model: String,
    pub count: i64,
}

/// Response body for `GET /models/:model/fields`
#[derive(Debug, Clone, Serialize)]
pub struct FieldsResponse {
    pub model: String,
    pub fields: Value,
}
