//! Request DTOs for the bridge API
//!
//! Query strings accepted by the model endpoints.

use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::connection::SearchOptions;

/// Longest model name accepted in a path.
const MAX_MODEL_LEN: usize = 128;

/// Checks a model name taken from the URL path.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_model_name(model: &str) -> Option<String> {
    if model.is_empty() {
        return Some("Model name cannot be empty".to_string());
    }
    if model.len() > MAX_MODEL_LEN {
        return Some(format!(
            "Model name exceeds maximum length of {} characters",
            MAX_MODEL_LEN
        ));
    }
    let valid = model
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
    if !valid {
        return Some(format!("Invalid model name '{}'", model));
    }
    None
}

/// Splits a comma separated list, dropping blanks. `None` when nothing is
/// left.
fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// Parses a JSON domain, `[]` when absent.
fn parse_domain(raw: Option<&str>) -> Result<Value, String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Value::Array(Vec::new()));
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(domain @ Value::Array(_)) => Ok(domain),
        Ok(_) => Err("Domain must be a JSON array".to_string()),
        Err(e) => Err(format!("Domain is not valid JSON: {}", e)),
    }
}

/// Query of `GET /models/:model/search`
///
/// # Fields
/// - `domain`: JSON domain, e.g. `[["is_company","=",true]]`
/// - `fields`: comma separated field names
/// - `limit`, `offset`, `order`: paging and ordering; the limit is
///   bounded by the configured default and maximum
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub fields: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<u32>,
    #[serde(default)]
    pub order: Option<String>,
}

impl SearchQuery {
    pub fn domain(&self) -> Result<Value, String> {
        parse_domain(self.domain.as_deref())
    }

    pub fn fields(&self) -> Option<Vec<String>> {
        split_list(self.fields.as_deref())
    }

    pub fn options(&self, config: &Config) -> SearchOptions {
        SearchOptions {
            limit: Some(config.search_limit(self.limit)),
            offset: self.offset,
            order: self.order.clone().filter(|o| !o.trim().is_empty()),
        }
    }
}

/// Query of `GET /models/:model/count`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountQuery {
    #[serde(default)]
    pub domain: Option<String>,
}

impl CountQuery {
    pub fn domain(&self) -> Result<Value, String> {
        parse_domain(self.domain.as_deref())
    }
}

/// Query of `GET /models/:model/records/:id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQuery {
    #[serde(default)]
    pub fields: Option<String>,
}

impl RecordQuery {
    pub fn fields(&self) -> Option<Vec<String>> {
        split_list(self.fields.as_deref())
    }
}

/// Query of `GET /models/:model/fields`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsQuery {
    #[serde(default)]
    pub attributes: Option<String>,
}

impl FieldsQuery {
    pub fn attributes(&self) -> Option<Vec<String>> {
        split_list(self.attributes.as_deref())
    }
}
