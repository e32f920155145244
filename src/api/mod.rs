//! API Module
//!
//! HTTP handlers and routing for the bridge REST API.
//!
//! # Endpoints
//! - `GET /health` - Backend health and session state
//! - `GET /stats` - Cache, pool and timing statistics
//! - `GET /models/:model/fields` - Field metadata
//! - `GET /models/:model/records/:id` - One record
//! - `GET /models/:model/search` - Search and read
//! - `GET /models/:model/count` - Count matching records

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
