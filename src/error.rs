//! Error types for the Odoo bridge
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message reported when every configured credential method was rejected.
pub const AUTHENTICATION_FAILED: &str = "Authentication failed. Please check your credentials.";

// == Odoo Error Enum ==
/// Unified error type for the bridge.
///
/// Transport details never leak through this type: faults, timeouts and
/// socket errors raised by the RPC layer all arrive as `Connection`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OdooError {
    /// Invalid URL, missing or contradictory credentials, bad settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport failure, timeout, missing session or remote fault
    #[error("{0}")]
    Connection(String),

    /// Both credential methods were exhausted
    #[error("{}", AUTHENTICATION_FAILED)]
    Authentication,

    /// Access control refused or could not answer
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed HTTP query (bad domain JSON, invalid model name)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl OdooError {
    /// Shorthand for building a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        OdooError::Connection(msg.into())
    }

    /// Authentication failures are a flavour of connection failure.
    pub fn is_connection(&self) -> bool {
        matches!(self, OdooError::Connection(_) | OdooError::Authentication)
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for OdooError {
    fn into_response(self) -> Response {
        let status = match &self {
            OdooError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OdooError::Connection(_) => StatusCode::BAD_GATEWAY,
            OdooError::Authentication => StatusCode::UNAUTHORIZED,
            OdooError::AccessDenied(_) => StatusCode::FORBIDDEN,
            OdooError::NotFound(_) => StatusCode::NOT_FOUND,
            OdooError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the bridge.
pub type Result<T> = std::result::Result<T, OdooError>;
