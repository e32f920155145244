//! Odoo Bridge - connection layer for Odoo XML-RPC backends
//!
//! Connects to an Odoo server, authenticates with an API key or a
//! username/password pair, auto-selects the database and executes ORM
//! calls behind TTL/LRU caches and a shared proxy pool.

pub mod access;
pub mod api;
pub mod cache;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod performance;
pub mod pool;
pub mod rpc;
pub mod session;

#[cfg(test)]
mod test_support;

pub use access::{AccessController, ModelPermissions};
pub use api::{create_router, AppState};
pub use config::Config;
pub use connection::{OdooConnection, SearchOptions};
pub use error::{OdooError, Result};
pub use performance::PerformanceManager;
pub use session::AuthMethod;
