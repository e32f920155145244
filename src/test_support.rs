//! In-memory Odoo backend for unit tests.
//!
//! `FakeOdoo` implements [`Transport`] and hands out proxies that answer
//! the db, common and object services from a small scripted state: a
//! database list, a user table, JSON replies per side-channel path and a
//! record store supporting the usual ORM methods.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::endpoint::{COMMON_ENDPOINT, DB_ENDPOINT, OBJECT_ENDPOINT};
use crate::rpc::{HttpReply, RpcError, RpcProxy, Transport};

/// One call received by a fake proxy.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub method: String,
    pub params: Vec<Value>,
}

struct FakeState {
    fail_open: bool,
    version: Result<Value, RpcError>,
    databases: Result<Vec<String>, RpcError>,
    users: HashMap<String, (String, i64)>,
    auth_error: Option<RpcError>,
    json_replies: HashMap<String, Result<HttpReply, RpcError>>,
    seen_api_keys: Vec<String>,
    records: BTreeMap<String, BTreeMap<i64, Map<String, Value>>>,
    next_id: i64,
    object_error: Option<RpcError>,
    calls: Vec<RecordedCall>,
    opened: usize,
}

/// Cloneable handle on a shared fake backend.
#[derive(Clone)]
pub struct FakeOdoo {
    state: Arc<Mutex<FakeState>>,
}

impl FakeOdoo {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                fail_open: false,
                version: Ok(json!({"server_version": "17.0", "protocol_version": 1})),
                databases: Ok(vec!["odoo".to_string()]),
                users: HashMap::new(),
                auth_error: None,
                json_replies: HashMap::new(),
                seen_api_keys: Vec::new(),
                records: BTreeMap::new(),
                next_id: 1,
                object_error: None,
                calls: Vec::new(),
                opened: 0,
            })),
        }
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    pub fn set_version(&self, version: Result<Value, RpcError>) {
        self.state.lock().version = version;
    }

    pub fn set_databases(&self, databases: &[&str]) {
        self.state.lock().databases = Ok(databases.iter().map(|d| d.to_string()).collect());
    }

    pub fn fail_database_listing(&self, error: RpcError) {
        self.state.lock().databases = Err(error);
    }

    pub fn add_user(&self, login: &str, password: &str, uid: i64) {
        self.state
            .lock()
            .users
            .insert(login.to_string(), (password.to_string(), uid));
    }

    /// Makes the common `authenticate` call fail with `error`.
    pub fn fail_authenticate(&self, error: RpcError) {
        self.state.lock().auth_error = Some(error);
    }

    /// Scripts the reply of a side-channel GET on `path`.
    pub fn respond_json(&self, path: &str, status: u16, body: Value) {
        self.state.lock().json_replies.insert(
            path.to_string(),
            Ok(HttpReply {
                status,
                body: Some(body),
            }),
        );
    }

    pub fn fail_json(&self, path: &str, error: RpcError) {
        self.state
            .lock()
            .json_replies
            .insert(path.to_string(), Err(error));
    }

    /// Accepts `key` on the validation endpoint for `uid`.
    pub fn accept_api_key(&self, uid: i64) {
        self.respond_json(
            "/mcp/auth/validate",
            200,
            json!({"success": true, "data": {"valid": true, "user_id": uid}}),
        );
    }

    pub fn insert_record(&self, model: &str, record: Value) -> i64 {
        let mut state = self.state.lock();
        let mut fields = match record {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let id = match fields.get("id").and_then(Value::as_i64) {
            Some(id) => id,
            None => state.next_id,
        };
        state.next_id = state.next_id.max(id + 1);
        fields.insert("id".to_string(), json!(id));
        state
            .records
            .entry(model.to_string())
            .or_default()
            .insert(id, fields);
        id
    }

    /// Makes every object call fail with `error` until cleared.
    pub fn fail_object_calls(&self, error: Option<RpcError>) {
        self.state.lock().object_error = error;
    }

    /// Params of the `execute_kw` calls for ORM method `method`.
    pub fn object_calls(&self, method: &str) -> Vec<Vec<Value>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.path.ends_with(OBJECT_ENDPOINT))
            .filter(|c| c.params.get(4).and_then(Value::as_str) == Some(method))
            .map(|c| c.params.clone())
            .collect()
    }

    pub fn rpc_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn seen_api_keys(&self) -> Vec<String> {
        self.state.lock().seen_api_keys.clone()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }
}

impl Default for FakeOdoo {
    fn default() -> Self {
        Self::new()
    }
}

fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

fn fault(message: &str) -> RpcError {
    RpcError::Fault {
        code: 1,
        message: message.to_string(),
    }
}

#[async_trait]
impl Transport for FakeOdoo {
    fn open(&self, url: &str) -> Result<Arc<dyn RpcProxy>, RpcError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(RpcError::Transport("connection refused".to_string()));
        }
        state.opened += 1;
        Ok(Arc::new(FakeProxy {
            state: Arc::clone(&self.state),
            url: url.to_string(),
        }))
    }

    async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpReply, RpcError> {
        let mut state = self.state.lock();
        if let Some((_, key)) = headers.iter().find(|(name, _)| *name == "X-API-Key") {
            state.seen_api_keys.push(key.to_string());
        }
        match state.json_replies.get(&path_of(url)) {
            Some(reply) => reply.clone(),
            None => Ok(HttpReply {
                status: 404,
                body: None,
            }),
        }
    }
}

struct FakeProxy {
    state: Arc<Mutex<FakeState>>,
    url: String,
}

impl std::fmt::Debug for FakeProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeProxy").field("url", &self.url).finish()
    }
}

#[async_trait]
impl RpcProxy for FakeProxy {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let path = path_of(&self.url);
        let mut state = self.state.lock();
        state.calls.push(RecordedCall {
            path: path.clone(),
            method: method.to_string(),
            params: params.clone(),
        });

        if path.ends_with(DB_ENDPOINT) {
            return match method {
                "list" => state.databases.clone().map(|dbs| json!(dbs)),
                other => Err(fault(&format!("unknown db method {}", other))),
            };
        }
        if path.ends_with(COMMON_ENDPOINT) {
            return match method {
                "version" => state.version.clone(),
                "authenticate" => match state.auth_error.clone() {
                    Some(error) => Err(error),
                    None => Ok(authenticate(&state, &params)),
                },
                other => Err(fault(&format!("unknown common method {}", other))),
            };
        }
        if path.ends_with(OBJECT_ENDPOINT) && method == "execute_kw" {
            if let Some(error) = state.object_error.clone() {
                return Err(error);
            }
            return execute_kw(&mut state, &params);
        }
        Err(fault(&format!("no service at {}", path)))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

fn authenticate(state: &FakeState, params: &[Value]) -> Value {
    let login = params.get(1).and_then(Value::as_str).unwrap_or_default();
    let password = params.get(2).and_then(Value::as_str).unwrap_or_default();
    match state.users.get(login) {
        Some((expected, uid)) if expected == password => json!(uid),
        _ => json!(false),
    }
}

fn project(record: &Map<String, Value>, fields: Option<&Vec<Value>>) -> Value {
    match fields {
        Some(fields) if !fields.is_empty() => {
            let mut out = Map::new();
            out.insert("id".to_string(), record.get("id").cloned().unwrap_or(Value::Null));
            for name in fields.iter().filter_map(Value::as_str) {
                out.insert(
                    name.to_string(),
                    record.get(name).cloned().unwrap_or(Value::Bool(false)),
                );
            }
            Value::Object(out)
        }
        _ => Value::Object(record.clone()),
    }
}

fn ids_of(value: Option<&Value>) -> Vec<i64> {
    value
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn execute_kw(state: &mut FakeState, params: &[Value]) -> Result<Value, RpcError> {
    let model = params.get(3).and_then(Value::as_str).unwrap_or_default().to_string();
    let method = params.get(4).and_then(Value::as_str).unwrap_or_default().to_string();
    let args = params.get(5).and_then(Value::as_array).cloned().unwrap_or_default();
    let kwargs = params.get(6).cloned().unwrap_or_else(|| json!({}));
    let fields = kwargs.get("fields").and_then(Value::as_array);
    let limit = kwargs.get("limit").and_then(Value::as_u64).map(|l| l as usize);

    let table = state.records.entry(model.clone()).or_default();
    match method.as_str() {
        "search" => {
            let ids: Vec<i64> = table.keys().copied().take(limit.unwrap_or(usize::MAX)).collect();
            Ok(json!(ids))
        }
        "search_count" => Ok(json!(table.len())),
        "search_read" => Ok(Value::Array(
            table
                .values()
                .take(limit.unwrap_or(usize::MAX))
                .map(|r| project(r, fields))
                .collect(),
        )),
        "read" => Ok(Value::Array(
            ids_of(args.first())
                .iter()
                .filter_map(|id| table.get(id))
                .map(|r| project(r, fields))
                .collect(),
        )),
        "fields_get" => Ok(json!({
            "id": {"type": "integer", "string": "ID"},
            "name": {"type": "char", "string": "Name"},
        })),
        "create" => {
            let mut values = args.first().and_then(Value::as_object).cloned().unwrap_or_default();
            let id = state.next_id;
            state.next_id += 1;
            values.insert("id".to_string(), json!(id));
            state.records.entry(model).or_default().insert(id, values);
            Ok(json!(id))
        }
        "write" => {
            let values = args.get(1).and_then(Value::as_object).cloned().unwrap_or_default();
            for id in ids_of(args.first()) {
                let record = table
                    .get_mut(&id)
                    .ok_or_else(|| fault("Record does not exist or has been deleted."))?;
                record.extend(values.clone());
            }
            Ok(json!(true))
        }
        "unlink" => {
            for id in ids_of(args.first()) {
                table.remove(&id);
            }
            Ok(json!(true))
        }
        other => Err(fault(&format!("unknown ORM method {}", other))),
    }
}
