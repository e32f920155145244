//! Database listing and auto-selection.

use serde_json::Value;
use tracing::{info, warn};

use super::{OdooConnection, NOT_CONNECTED};
use crate::endpoint::Service;
use crate::error::{OdooError, Result};
use crate::rpc::RpcError;

/// Database picked when several exist and none is configured.
///
/// A deployment convention rather than a guarantee; a candidate for a
/// configuration option.
pub const PREFERRED_DATABASE: &str = "odoo";

/// Picks a database from the server's list.
///
/// One database is selected as-is. Among several, only
/// [`PREFERRED_DATABASE`] is chosen automatically.
pub fn select_database(databases: &[String]) -> Result<String> {
    match databases {
        [] => Err(OdooError::connection("No databases found on Odoo server")),
        [only] => Ok(only.clone()),
        many => {
            if many.iter().any(|db| db == PREFERRED_DATABASE) {
                return Ok(PREFERRED_DATABASE.to_string());
            }
            Err(OdooError::connection(format!(
                "Cannot auto-select database. Found {} databases: {}. \
                 Please specify ODOO_DB in configuration.",
                many.len(),
                many.join(", ")
            )))
        }
    }
}

impl OdooConnection {
    /// Names of the databases the server exposes.
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let db = self.proxy(Service::Db)?;
        let listed = db
            .call("list", vec![])
            .await
            .map_err(|e| OdooError::connection(format!("Failed to list databases: {}", e.message())))?;

        let databases: Vec<String> = match listed {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            other => {
                return Err(OdooError::connection(format!(
                    "Failed to list databases: unexpected response {}",
                    other
                )))
            }
        };
        info!(count = databases.len(), "found databases");
        Ok(databases)
    }

    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_databases().await?.iter().any(|db| db == name))
    }

    /// Resolves the database to attach to.
    ///
    /// A configured database wins without checking that it exists; the
    /// first real operation reports it when it does not.
    pub async fn auto_select_database(&self) -> Result<String> {
        if let Some(database) = &self.config.database {
            info!(database = %database, "using configured database");
            return Ok(database.clone());
        }

        let databases = self.list_databases().await.map_err(|e| {
            warn!(error = %e, "database listing failed");
            OdooError::connection(
                "Database auto-selection failed. Database listing may be restricted. \
                 Please specify ODOO_DB in your configuration.",
            )
        })?;

        let selected = select_database(&databases)?;
        info!(database = %selected, "auto-selected database");
        Ok(selected)
    }

    /// Checks that the configured credentials can use `name`.
    ///
    /// With an API key only existence is checked; with a password the
    /// credentials are tried against that database without touching the
    /// session.
    pub async fn validate_database_access(&self, name: &str) -> Result<bool> {
        if !self.is_connected() {
            return Err(OdooError::connection(NOT_CONNECTED));
        }
        if self.config.uses_api_key() {
            return self.database_exists(name).await;
        }

        match self.password_uid(name).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(RpcError::Fault { message, .. }) if message.contains("Access Denied") => Ok(false),
            Err(e) => Err(OdooError::connection(format!(
                "Failed to validate database access: {}",
                e.message()
            ))),
        }
    }
}
