//! Odoo Connection
//!
//! One logical connection to the backend: session lifecycle, credential
//! fallback, database selection and the cached execution facade. The
//! session is the only state owned here; caches and pooled proxies live
//! in the shared [`PerformanceManager`].

mod auth;
mod database;
mod operations;

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::endpoint::{Endpoint, Service};
use crate::error::{OdooError, Result};
use crate::performance::PerformanceManager;
use crate::rpc::{RpcError, RpcProxy};
use crate::session::{AuthMethod, Identity, Session};

pub use database::{select_database, PREFERRED_DATABASE};
pub use operations::SearchOptions;

pub(crate) const NOT_CONNECTED: &str = "Not connected to Odoo";
pub(crate) const NOT_AUTHENTICATED: &str = "Not authenticated. Call authenticate() first.";

// == Connection ==
/// A logical connection with its own session.
///
/// Every method takes `&self`, so a connection can be shared through
/// `Arc` by several tasks. Call [`disconnect`](Self::disconnect) on every
/// exit path; dropping a connected instance only resets its session.
pub struct OdooConnection {
    config: Arc<Config>,
    endpoint: Endpoint,
    manager: Arc<PerformanceManager>,
    session: RwLock<Session>,
}

impl OdooConnection {
    /// Validates `config` and builds a disconnected connection.
    pub fn new(config: Arc<Config>, manager: Arc<PerformanceManager>) -> Result<Self> {
        let endpoint = config.validate()?;
        info!(server = %endpoint, "initialized Odoo connection");
        Ok(Self {
            config,
            endpoint,
            manager,
            session: RwLock::new(Session::new()),
        })
    }

    // == Lifecycle ==
    /// Opens the three service proxies through the pool and checks the
    /// server version. The session stays disconnected on failure.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            warn!("already connected to Odoo");
            return Ok(());
        }

        for service in [Service::Db, Service::Object] {
            self.manager.connection(&self.endpoint.service_url(service))?;
        }
        let common = self
            .manager
            .connection(&self.endpoint.service_url(Service::Common))?;

        let version = common
            .call("version", vec![])
            .await
            .map_err(|e| self.connect_error(e))?;
        debug!(version = %version, "server version");

        self.session.write().mark_connected();
        info!(server = %self.endpoint, "connected to Odoo server");
        Ok(())
    }

    /// Resets the session. A no-op, with a warning, when not connected.
    pub fn disconnect(&self) {
        let mut session = self.session.write();
        if !session.is_connected() {
            warn!("not connected to Odoo");
            return;
        }
        session.reset();
        info!("disconnected from Odoo server");
    }

    fn connect_error(&self, err: RpcError) -> OdooError {
        match err {
            RpcError::Timeout => OdooError::connection(format!(
                "Connection timeout after {} seconds",
                self.config.timeout_secs
            )),
            RpcError::Transport(msg) => OdooError::connection(format!(
                "Failed to connect to {}: {}",
                self.endpoint, msg
            )),
            other => OdooError::connection(format!("Connection test failed: {}", other.message())),
        }
    }

    // == Session accessors ==
    pub fn is_connected(&self) -> bool {
        self.session.read().is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_authenticated()
    }

    pub fn uid(&self) -> Option<i64> {
        self.session.read().uid()
    }

    pub fn database(&self) -> Option<String> {
        self.session.read().database().map(str::to_string)
    }

    pub fn auth_method(&self) -> Option<AuthMethod> {
        self.session.read().auth_method()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn performance_manager(&self) -> &Arc<PerformanceManager> {
        &self.manager
    }

    fn identity(&self) -> Option<Identity> {
        self.session.read().identity().cloned()
    }

    /// Pooled proxy for `service`; requires a connected session.
    fn proxy(&self, service: Service) -> Result<Arc<dyn RpcProxy>> {
        if !self.is_connected() {
            return Err(OdooError::connection(NOT_CONNECTED));
        }
        self.manager.connection(&self.endpoint.service_url(service))
    }

    // == Health ==
    /// Asks for the server version. Never fails; the message says why.
    pub async fn check_health(&self) -> (bool, String) {
        let common = match self.proxy(Service::Common) {
            Ok(proxy) => proxy,
            Err(_) => return (false, "Not connected".to_string()),
        };

        match common.call("version", vec![]).await {
            Ok(version) => {
                let server = version
                    .get("server_version")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                (true, format!("Connected to Odoo {}", server))
            }
            Err(RpcError::Timeout) => (
                false,
                format!("Health check timeout after {} seconds", self.config.timeout_secs),
            ),
            Err(e) => (false, format!("Health check failed: {}", e.message())),
        }
    }

    /// Version information, or `None` when disconnected or unreachable.
    pub async fn server_version(&self) -> Option<Value> {
        let common = self.proxy(Service::Common).ok()?;
        match common.call("version", vec![]).await {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(error = %e, "failed to get server version");
                None
            }
        }
    }
}

impl Drop for OdooConnection {
    fn drop(&mut self) {
        let session = self.session.get_mut();
        if session.is_connected() {
            session.reset();
            debug!("connection dropped while connected, session reset");
        }
    }
}

impl std::fmt::Debug for OdooConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdooConnection")
            .field("endpoint", &self.endpoint)
            .field("session", &*self.session.read())
            .finish_non_exhaustive()
    }
}
