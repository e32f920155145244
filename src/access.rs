//! Access Control
//!
//! Client for the backend's per-model permission REST endpoints. Answers
//! are kept in the shared permission cache for five minutes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cache::CacheKey;
use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::{OdooError, Result};
use crate::performance::{PerformanceManager, PERMISSION_CACHE_TTL};

pub const MODELS_ENDPOINT: &str = "/mcp/models";

fn model_access_path(model: &str) -> String {
    format!("{}/{}/access", MODELS_ENDPOINT, model)
}

// == Permissions ==
/// What the access-control module allows on one model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPermissions {
    pub model: String,
    pub enabled: bool,
    pub can_read: bool,
    pub can_write: bool,
    pub can_create: bool,
    pub can_unlink: bool,
}

impl ModelPermissions {
    /// Parses the `data` object of an access reply. Missing flags deny.
    fn from_data(model: &str, data: &Value) -> Self {
        let flag = |name: &str| {
            data.get("operations")
                .and_then(|ops| ops.get(name))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        Self {
            model: data
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(model)
                .to_string(),
            enabled: data.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            can_read: flag("read"),
            can_write: flag("write"),
            can_create: flag("create"),
            can_unlink: flag("unlink"),
        }
    }

    /// `delete` is accepted as an alias of `unlink`; unknown operations
    /// are refused.
    pub fn can_perform(&self, operation: &str) -> bool {
        match operation {
            "read" => self.can_read,
            "write" => self.can_write,
            "create" => self.can_create,
            "unlink" | "delete" => self.can_unlink,
            _ => false,
        }
    }
}

/// Entry of the enabled-models listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledModel {
    pub model: String,
    #[serde(default)]
    pub name: String,
}

// == Controller ==
pub struct AccessController {
    endpoint: Endpoint,
    api_key: String,
    manager: Arc<PerformanceManager>,
}

impl AccessController {
    /// Fails with a configuration error when no API key is configured.
    pub fn new(config: &Config, manager: Arc<PerformanceManager>) -> Result<Self> {
        let endpoint = config.validate()?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                OdooError::Configuration(
                    "API key required for access control. Please configure ODOO_API_KEY."
                        .to_string(),
                )
            })?;

        info!(server = %endpoint, "initialized access controller");
        Ok(Self {
            endpoint,
            api_key,
            manager,
        })
    }

    /// GETs `path` and returns the body of a successful reply.
    async fn request(&self, path: &str) -> Result<Value> {
        let url = self.endpoint.url_for(path);
        debug!(url = %url, "access control request");

        let reply = self
            .manager
            .transport()
            .get_json(&url, &[("X-API-Key", self.api_key.as_str())])
            .await
            .map_err(|e| OdooError::AccessDenied(format!("Connection error: {}", e.message())))?;

        match reply.status {
            401 => return Err(OdooError::AccessDenied("Invalid API key for access control".into())),
            403 => return Err(OdooError::AccessDenied("Access denied to MCP endpoints".into())),
            404 => return Err(OdooError::AccessDenied(format!("Endpoint not found: {}", path))),
            status if !reply.is_success() => {
                return Err(OdooError::AccessDenied(format!("HTTP error {}", status)))
            }
            _ => {}
        }

        let body = reply
            .body
            .ok_or_else(|| OdooError::AccessDenied("Invalid JSON response".into()))?;
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            return Err(OdooError::AccessDenied(format!("API error: {}", message)));
        }
        Ok(body)
    }

    /// Models enabled for access, cached.
    pub async fn enabled_models(&self) -> Result<Vec<EnabledModel>> {
        let cache = self.manager.permission_cache();
        if let Some(models) = cache
            .get(&CacheKey::EnabledModels)
            .and_then(|cached| serde_json::from_value(cached).ok())
        {
            return Ok(models);
        }

        let body = self.request(MODELS_ENDPOINT).await?;
        let listed = body
            .get("data")
            .and_then(|d| d.get("models"))
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let models: Vec<EnabledModel> = serde_json::from_value(listed.clone())
            .map_err(|e| OdooError::AccessDenied(format!("Invalid JSON response: {}", e)))?;

        cache.put(CacheKey::EnabledModels, listed, PERMISSION_CACHE_TTL);
        info!(count = models.len(), "retrieved enabled models");
        Ok(models)
    }

    /// False when the model is not listed or the listing failed.
    pub async fn is_model_enabled(&self, model: &str) -> bool {
        match self.enabled_models().await {
            Ok(models) => models.iter().any(|m| m.model == model),
            Err(e) => {
                error!(model, error = %e, "failed to check if model is enabled");
                false
            }
        }
    }

    /// Permissions of `model`, cached.
    pub async fn model_permissions(&self, model: &str) -> Result<ModelPermissions> {
        let cache = self.manager.permission_cache();
        let key = CacheKey::permission(model);
        if let Some(permissions) = cache
            .get(&key)
            .and_then(|cached| serde_json::from_value(cached).ok())
        {
            return Ok(permissions);
        }

        let body = self.request(&model_access_path(model)).await?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        let permissions = ModelPermissions::from_data(model, &data);

        if let Ok(value) = serde_json::to_value(&permissions) {
            cache.put(key, value, PERMISSION_CACHE_TTL);
        }
        debug!(model, ?permissions, "retrieved permissions");
        Ok(permissions)
    }

    /// Whether `operation` is allowed on `model`, with the reason when not.
    pub async fn check_operation_allowed(&self, model: &str, operation: &str) -> (bool, Option<String>) {
        let permissions = match self.model_permissions(model).await {
            Ok(permissions) => permissions,
            Err(e) => {
                error!(model, operation, error = %e, "access control check failed");
                return (false, Some(e.to_string()));
            }
        };

        if !permissions.enabled {
            return (false, Some(format!("Model '{}' is not enabled for MCP access", model)));
        }
        if !permissions.can_perform(operation) {
            return (
                false,
                Some(format!("Operation '{}' not allowed on model '{}'", operation, model)),
            );
        }
        (true, None)
    }

    /// Like `check_operation_allowed`, as an `AccessDenied` error.
    pub async fn validate_model_access(&self, model: &str, operation: &str) -> Result<()> {
        match self.check_operation_allowed(model, operation).await {
            (true, _) => Ok(()),
            (false, reason) => Err(OdooError::AccessDenied(
                reason.unwrap_or_else(|| format!("Access denied to {}.{}", model, operation)),
            )),
        }
    }

    /// Keeps the enabled models of `models`, in order. Empty when the
    /// listing failed.
    pub async fn filter_enabled_models(&self, models: &[String]) -> Vec<String> {
        match self.enabled_models().await {
            Ok(enabled) => {
                let enabled: HashSet<&str> = enabled.iter().map(|m| m.model.as_str()).collect();
                models
                    .iter()
                    .filter(|m| enabled.contains(m.as_str()))
                    .cloned()
                    .collect()
            }
            Err(e) => {
                error!(error = %e, "failed to filter models");
                Vec::new()
            }
        }
    }

    /// Permissions of every enabled model; models that fail are skipped.
    pub async fn all_permissions(&self) -> BTreeMap<String, ModelPermissions> {
        let mut all = BTreeMap::new();
        let models = match self.enabled_models().await {
            Ok(models) => models,
            Err(e) => {
                error!(error = %e, "failed to get all permissions");
                return all;
            }
        };

        for entry in models {
            match self.model_permissions(&entry.model).await {
                Ok(permissions) => {
                    all.insert(entry.model, permissions);
                }
                Err(e) => warn!(model = %entry.model, error = %e, "failed to get permissions"),
            }
        }
        all
    }

    /// Drops every cached access-control answer.
    pub fn clear_cache(&self) {
        let removed = self.manager.permission_cache().invalidate_where(|key| {
            matches!(key, CacheKey::Permission { .. } | CacheKey::EnabledModels)
        });
        info!(removed, "cleared access control cache");
    }
}
