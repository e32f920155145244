//! Execution facade: `execute_kw` and the cached ORM shortcuts.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use super::{OdooConnection, NOT_AUTHENTICATED};
use crate::endpoint::Service;
use crate::error::{OdooError, Result};
use crate::rpc::RpcError;
use crate::session::AuthMethod;

/// Paging and ordering keywords shared by `search` and `search_read`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order: Option<String>,
}

impl SearchOptions {
    fn to_kwargs(&self) -> Map<String, Value> {
        let mut kwargs = Map::new();
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), json!(limit));
        }
        if let Some(offset) = self.offset {
            kwargs.insert("offset".to_string(), json!(offset));
        }
        if let Some(order) = &self.order {
            kwargs.insert("order".to_string(), json!(order));
        }
        kwargs
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        OdooError::connection(format!("Operation failed: unexpected {} result: {}", method, e))
    })
}

fn non_empty(list: Option<&[String]>) -> Option<&[String]> {
    list.filter(|l| !l.is_empty())
}

impl OdooConnection {
    fn ensure_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(OdooError::connection(NOT_AUTHENTICATED))
        }
    }

    // == Execute ==
    /// Calls `method` on `model` with the session's credentials.
    ///
    /// Every backend failure, fault or transport, comes back as a
    /// connection error carrying the backend message.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value> {
        let identity = self
            .identity()
            .ok_or_else(|| OdooError::connection(NOT_AUTHENTICATED))?;
        let object = self.proxy(Service::Object)?;

        let credential = match identity.method {
            AuthMethod::ApiKey => self.config.api_key.clone(),
            AuthMethod::Password => self.config.password.clone(),
        }
        .unwrap_or_default();

        debug!(model, method, "executing");
        let params = vec![
            json!(identity.database),
            json!(identity.uid),
            json!(credential),
            json!(model),
            json!(method),
            Value::Array(args),
            Value::Object(kwargs),
        ];

        object
            .call("execute_kw", params)
            .await
            .map_err(|e| self.operation_error(model, method, e))
    }

    /// `execute_kw` without keyword arguments.
    pub async fn execute(&self, model: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        self.execute_kw(model, method, args, Map::new()).await
    }

    fn operation_error(&self, model: &str, method: &str, err: RpcError) -> OdooError {
        match err {
            RpcError::Timeout => {
                error!(model, method, "operation timed out");
                OdooError::connection(format!(
                    "Operation timeout after {} seconds",
                    self.config.timeout_secs
                ))
            }
            other => {
                error!(model, method, error = %other, "operation failed");
                OdooError::connection(format!("Operation failed: {}", other.message()))
            }
        }
    }

    // == Queries ==
    pub async fn search(&self, model: &str, domain: Value, options: &SearchOptions) -> Result<Vec<i64>> {
        let _timer = self.manager.monitor().track(format!("search_{}", model));
        let ids = self
            .execute_kw(model, "search", vec![domain], options.to_kwargs())
            .await?;
        decode("search", ids)
    }

    pub async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: Option<&[String]>,
        options: &SearchOptions,
    ) -> Result<Vec<Value>> {
        let _timer = self.manager.monitor().track(format!("search_read_{}", model));
        let mut kwargs = options.to_kwargs();
        if let Some(fields) = non_empty(fields) {
            kwargs.insert("fields".to_string(), json!(fields));
        }
        let records = self
            .execute_kw(model, "search_read", vec![domain], kwargs)
            .await?;
        decode("search_read", records)
    }

    pub async fn search_count(&self, model: &str, domain: Value) -> Result<i64> {
        let _timer = self.manager.monitor().track(format!("search_count_{}", model));
        let count = self
            .execute_kw(model, "search_count", vec![domain], Map::new())
            .await?;
        decode("search_count", count)
    }

    /// Reads records, serving each id from the record cache when possible.
    ///
    /// Only the ids missing from the cache go over the wire, in one call.
    /// Results follow the order of `ids` (duplicates collapsed); ids the
    /// backend did not return are left out.
    pub async fn read(&self, model: &str, ids: &[i64], fields: Option<&[String]>) -> Result<Vec<Value>> {
        self.ensure_authenticated()?;
        let fields = non_empty(fields);

        let mut order = Vec::with_capacity(ids.len());
        let mut seen = HashSet::new();
        let mut found: HashMap<i64, Value> = HashMap::new();
        let mut missing = Vec::new();

        for &id in ids {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            match self.manager.cached_record(model, id, fields) {
                Some(record) => {
                    found.insert(id, record);
                }
                None => missing.push(id),
            }
        }

        let mut unkeyed = Vec::new();
        if missing.is_empty() {
            debug!(model, count = order.len(), "all records served from cache");
        } else {
            let mut kwargs = Map::new();
            if let Some(fields) = fields {
                kwargs.insert("fields".to_string(), json!(fields));
            }

            let fetched = {
                let _timer = self.manager.monitor().track(format!("read_{}", model));
                self.execute_kw(model, "read", vec![json!(missing)], kwargs)
                    .await?
            };

            for record in decode::<Vec<Value>>("read", fetched)? {
                self.manager.cache_record(model, &record, fields);
                match record.get("id").and_then(Value::as_i64) {
                    Some(id) => {
                        found.insert(id, record);
                    }
                    None => unkeyed.push(record),
                }
            }
        }

        let mut records: Vec<Value> = order.iter().filter_map(|id| found.remove(id)).collect();
        records.extend(unkeyed);
        Ok(records)
    }

    /// Field definitions of `model`.
    ///
    /// The full definition set is cached for an hour; a request for an
    /// attribute subset always goes to the backend and is not cached.
    pub async fn fields_get(&self, model: &str, attributes: Option<&[String]>) -> Result<Value> {
        self.ensure_authenticated()?;
        let attributes = non_empty(attributes);

        if attributes.is_none() {
            if let Some(cached) = self.manager.cached_fields(model) {
                debug!(model, "field definitions served from cache");
                return Ok(cached);
            }
        }

        let mut kwargs = Map::new();
        if let Some(attributes) = attributes {
            kwargs.insert("attributes".to_string(), json!(attributes));
        }

        let fields = {
            let _timer = self.manager.monitor().track(format!("fields_get_{}", model));
            self.execute_kw(model, "fields_get", vec![], kwargs).await?
        };

        if attributes.is_none() {
            self.manager.cache_fields(model, fields.clone());
        }
        Ok(fields)
    }

    // == Mutations ==
    /// Creates a record and drops every cached record of the model.
    pub async fn create(&self, model: &str, values: Value) -> Result<i64> {
        let _timer = self.manager.monitor().track(format!("create_{}", model));
        let id = self
            .execute_kw(model, "create", vec![values], Map::new())
            .await?;
        let id: i64 = decode("create", id)?;

        self.manager.invalidate_records(model, None);
        info!(model, id, "created record");
        Ok(id)
    }

    /// Updates records and drops their cached copies.
    pub async fn write(&self, model: &str, ids: &[i64], values: Value) -> Result<bool> {
        let _timer = self.manager.monitor().track(format!("write_{}", model));
        let result = self
            .execute_kw(model, "write", vec![json!(ids), values], Map::new())
            .await?;

        self.manager.invalidate_records(model, Some(ids));
        info!(model, count = ids.len(), "updated records");
        decode("write", result)
    }

    /// Deletes records and drops their cached copies.
    pub async fn unlink(&self, model: &str, ids: &[i64]) -> Result<bool> {
        let _timer = self.manager.monitor().track(format!("unlink_{}", model));
        let result = self
            .execute_kw(model, "unlink", vec![json!(ids)], Map::new())
            .await?;

        self.manager.invalidate_records(model, Some(ids));
        info!(model, count = ids.len(), "deleted records");
        decode("unlink", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::tests::{connection_with, password_config};
    use crate::test_support::FakeOdoo;

    const PARTNER: &str = "res.partner";

    async fn authenticated(config: Config, fake: &FakeOdoo) -> OdooConnection {
        fake.add_user("admin", "admin", 2);
        fake.accept_api_key(6);
        let conn = connection_with(config, fake);
        conn.connect().await.unwrap();
        conn.authenticate(None).await.unwrap();
        conn
    }

    fn seeded() -> FakeOdoo {
        let fake = FakeOdoo::new();
        fake.insert_record(PARTNER, json!({"id": 1, "name": "Azure Interior", "email": "azure@example.com"}));
        fake.insert_record(PARTNER, json!({"id": 2, "name": "Deco Addict", "email": "deco@example.com"}));
        fake.insert_record(PARTNER, json!({"id": 3, "name": "Gemini Furniture", "email": false}));
        fake
    }

    fn ids(records: &[Value]) -> Vec<i64> {
        records.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[tokio::test]
    async fn test_execute_requires_authentication() {
        let fake = FakeOdoo::new();
        let conn = connection_with(password_config(), &fake);
        conn.connect().await.unwrap();

        let err = conn.search(PARTNER, json!([]), &SearchOptions::default()).await.unwrap_err();
        assert_eq!(err, OdooError::connection(NOT_AUTHENTICATED));
        let err = conn.read(PARTNER, &[1], None).await.unwrap_err();
        assert_eq!(err.to_string(), "Not authenticated. Call authenticate() first.");
    }

    #[tokio::test]
    async fn test_credential_follows_auth_method() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;
        conn.search_count(PARTNER, json!([])).await.unwrap();
        let call = &fake.object_calls("search_count")[0];
        assert_eq!(call[0], json!("odoo"));
        assert_eq!(call[1], json!(2));
        assert_eq!(call[2], json!("admin"));

        let fake = seeded();
        let config = Config::new("http://odoo.test").with_api_key("secret-key");
        let conn = authenticated(config, &fake).await;
        conn.search_count(PARTNER, json!([])).await.unwrap();
        let call = &fake.object_calls("search_count")[0];
        assert_eq!(call[1], json!(6));
        assert_eq!(call[2], json!("secret-key"));
    }

    #[tokio::test]
    async fn test_search_passes_options() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;
        let options = SearchOptions {
            limit: Some(2),
            offset: None,
            order: Some("name asc".to_string()),
        };

        let found = conn.search(PARTNER, json!([["is_company", "=", true]]), &options).await.unwrap();

        assert_eq!(found, vec![1, 2]);
        let call = &fake.object_calls("search")[0];
        assert_eq!(call[5], json!([[["is_company", "=", true]]]));
        assert_eq!(call[6], json!({"limit": 2, "order": "name asc"}));
    }

    #[tokio::test]
    async fn test_search_read_and_count() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;
        let fields = vec!["name".to_string()];

        let records = conn
            .search_read(PARTNER, json!([]), Some(fields.as_slice()), &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], json!({"id": 1, "name": "Azure Interior"}));
        assert_eq!(conn.search_count(PARTNER, json!([])).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_read_serves_cached_ids_and_fetches_rest() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;

        let first = conn.read(PARTNER, &[1, 2], None).await.unwrap();
        assert_eq!(ids(&first), vec![1, 2]);

        let cached = conn.read(PARTNER, &[2, 1], None).await.unwrap();
        assert_eq!(ids(&cached), vec![2, 1]);
        assert_eq!(fake.object_calls("read").len(), 1);

        let mixed = conn.read(PARTNER, &[3, 1], None).await.unwrap();
        assert_eq!(ids(&mixed), vec![3, 1]);
        let reads = fake.object_calls("read");
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[1][5], json!([[3]]));
    }

    #[tokio::test]
    async fn test_read_cache_is_per_field_selection() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;
        let name = vec!["name".to_string()];

        conn.read(PARTNER, &[1], None).await.unwrap();
        let narrow = conn.read(PARTNER, &[1], Some(name.as_slice())).await.unwrap();

        assert_eq!(narrow, vec![json!({"id": 1, "name": "Azure Interior"})]);
        assert_eq!(fake.object_calls("read").len(), 2);
    }

    #[tokio::test]
    async fn test_read_omits_missing_and_collapses_duplicates() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;

        let records = conn.read(PARTNER, &[2, 99, 2, 1], None).await.unwrap();
        assert_eq!(ids(&records), vec![2, 1]);
        assert_eq!(fake.object_calls("read")[0][5], json!([[2, 99, 1]]));
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_record() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;

        conn.read(PARTNER, &[1], None).await.unwrap();
        assert!(conn.write(PARTNER, &[1], json!({"name": "Azure Interior SA"})).await.unwrap());

        let after = conn.read(PARTNER, &[1], None).await.unwrap();
        assert_eq!(after[0]["name"], "Azure Interior SA");
        assert_eq!(fake.object_calls("read").len(), 2);
    }

    #[tokio::test]
    async fn test_write_keeps_other_ids_cached() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;

        conn.read(PARTNER, &[1, 2], None).await.unwrap();
        conn.write(PARTNER, &[1], json!({"email": "new@example.com"})).await.unwrap();
        conn.read(PARTNER, &[1, 2], None).await.unwrap();

        assert_eq!(fake.object_calls("read")[1][5], json!([[1]]));
    }

    #[tokio::test]
    async fn test_create_invalidates_whole_model() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;

        conn.read(PARTNER, &[1, 2], None).await.unwrap();
        let id = conn.create(PARTNER, json!({"name": "Lumber Inc"})).await.unwrap();

        assert_eq!(id, 4);
        let manager = conn.performance_manager();
        assert_eq!(manager.record_cache().len(), 0);
    }

    #[tokio::test]
    async fn test_unlink_invalidates_and_record_disappears() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;

        conn.read(PARTNER, &[3], None).await.unwrap();
        assert!(conn.unlink(PARTNER, &[3]).await.unwrap());

        assert!(conn.read(PARTNER, &[3], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fields_get_cached_unless_attributes() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;
        let attributes = vec!["type".to_string()];

        let first = conn.fields_get(PARTNER, None).await.unwrap();
        let second = conn.fields_get(PARTNER, None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fake.object_calls("fields_get").len(), 1);

        conn.fields_get(PARTNER, Some(attributes.as_slice())).await.unwrap();
        conn.fields_get(PARTNER, Some(attributes.as_slice())).await.unwrap();
        let calls = fake.object_calls("fields_get");
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2][6], json!({"attributes": ["type"]}));
    }

    #[tokio::test]
    async fn test_fault_becomes_operation_failed() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;
        fake.fail_object_calls(Some(RpcError::Fault {
            code: 2,
            message: "Record does not exist or has been deleted.".to_string(),
        }));

        let err = conn.write(PARTNER, &[42], json!({"name": "x"})).await.unwrap_err();
        assert_eq!(
            err,
            OdooError::connection("Operation failed: Record does not exist or has been deleted.")
        );
    }

    #[tokio::test]
    async fn test_timeout_becomes_operation_timeout() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;
        fake.fail_object_calls(Some(RpcError::Timeout));

        let err = conn.search_count(PARTNER, json!([])).await.unwrap_err();
        assert_eq!(err.to_string(), "Operation timeout after 30 seconds");
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cache() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;
        conn.read(PARTNER, &[1], None).await.unwrap();
        fake.fail_object_calls(Some(RpcError::Timeout));

        assert!(conn.unlink(PARTNER, &[1]).await.is_err());
        assert_eq!(conn.performance_manager().record_cache().len(), 1);
    }

    #[tokio::test]
    async fn test_operations_are_timed() {
        let fake = seeded();
        let conn = authenticated(password_config(), &fake).await;

        conn.read(PARTNER, &[1], None).await.unwrap();
        conn.search_count(PARTNER, json!([])).await.unwrap();

        let stats = conn.performance_manager().monitor().stats();
        assert_eq!(stats.operations["read_res.partner"].count, 1);
        assert_eq!(stats.operations["search_count_res.partner"].count, 1);
    }
}
