//! Request and Response models for the bridge API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! deserializing query strings and serializing HTTP response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{validate_model_name, CountQuery, FieldsQuery, RecordQuery, SearchQuery};
pub use responses::{
    CountResponse, FieldsResponse, HealthResponse, RecordResponse, SearchResponse,
};
