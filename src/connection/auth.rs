//! Credential methods and fallback between them.

use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::{OdooConnection, NOT_CONNECTED};
use crate::endpoint::{Service, AUTH_VALIDATE_ENDPOINT};
use crate::error::{OdooError, Result};
use crate::rpc::RpcError;
use crate::session::{AuthMethod, Identity};

const API_KEY_HEADER: &str = "X-API-Key";

/// Extracts the uid from a `{success, data: {valid, user_id}}` body.
fn validated_uid(body: Option<&Value>) -> Option<i64> {
    let body = body?;
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let data = body.get("data")?;
    if data.get("valid").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    data.get("user_id").and_then(Value::as_i64).filter(|uid| *uid > 0)
}

impl OdooConnection {
    /// Authenticates against `database`, or the auto-selected one.
    ///
    /// The API key is tried first. A rejected or rate-limited key falls
    /// back to username/password when configured. The final error never
    /// says which method failed.
    pub async fn authenticate(&self, database: Option<&str>) -> Result<()> {
        if !self.is_connected() {
            return Err(OdooError::connection(NOT_CONNECTED));
        }

        let database = match database {
            Some(database) => database.to_string(),
            None => self.auto_select_database().await?,
        };

        if self.config.uses_api_key() {
            info!("attempting API key authentication");
            if let Some(uid) = self.api_key_uid().await? {
                return self.establish(uid, database, AuthMethod::ApiKey);
            }
            if self.config.uses_credentials() {
                info!("API key authentication failed, trying username/password");
            }
        }

        if self.config.uses_credentials() {
            info!("attempting username/password authentication");
            match self.password_uid(&database).await {
                Ok(Some(uid)) => {
                    return self.establish(uid, database, AuthMethod::Password);
                }
                Ok(None) => warn!("username/password authentication failed"),
                Err(RpcError::Fault { message, .. }) => {
                    warn!(fault = %message, "authentication fault")
                }
                Err(e) => {
                    error!(error = %e, "error during password authentication");
                    return Err(OdooError::connection(format!(
                        "Failed to authenticate: {}",
                        e.message()
                    )));
                }
            }
        }

        Err(OdooError::Authentication)
    }

    /// Records the identity, unless a disconnect won the race while the
    /// credentials were being checked.
    fn establish(&self, uid: i64, database: String, method: AuthMethod) -> Result<()> {
        let mut session = self.session.write();
        if !session.is_connected() {
            warn!("disconnected during authentication");
            return Err(OdooError::connection(NOT_CONNECTED));
        }
        info!(uid, database = %database, method = ?method, "authenticated");
        session.authenticated(Identity {
            uid,
            database,
            method,
        });
        Ok(())
    }

    /// Validates the API key on the side channel.
    ///
    /// `Ok(None)` means the key was refused and another method may be
    /// tried; any unexpected status or transport failure is an error.
    async fn api_key_uid(&self) -> Result<Option<i64>> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(None);
        };

        let url = self.endpoint.url_for(AUTH_VALIDATE_ENDPOINT);
        let reply = self
            .manager
            .transport()
            .get_json(&url, &[(API_KEY_HEADER, api_key)])
            .await
            .map_err(|e| {
                error!(error = %e, "error during API key validation");
                OdooError::connection(format!("Failed to validate API key: {}", e.message()))
            })?;

        match reply.status {
            401 => {
                warn!("invalid API key");
                Ok(None)
            }
            429 => {
                warn!("rate limit exceeded during API key validation");
                Ok(None)
            }
            _ if reply.is_success() => {
                let uid = validated_uid(reply.body.as_ref());
                if uid.is_none() {
                    warn!("API key validation failed");
                }
                Ok(uid)
            }
            status => {
                error!(status, "HTTP error during API key validation");
                Err(OdooError::connection(format!(
                    "Failed to validate API key: HTTP error {}",
                    status
                )))
            }
        }
    }

    /// Calls `authenticate` on the common service. A falsy answer is
    /// `Ok(None)`; faults are left to the caller.
    pub(super) async fn password_uid(&self, database: &str) -> std::result::Result<Option<i64>, RpcError> {
        let (Some(username), Some(password)) = (
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        ) else {
            return Ok(None);
        };

        let common = self
            .proxy(Service::Common)
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let uid = common
            .call(
                "authenticate",
                vec![json!(database), json!(username), json!(password), json!({})],
            )
            .await?;

        Ok(uid.as_i64().filter(|uid| *uid > 0))
    }
}
