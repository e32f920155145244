//! Cache Keys
//!
//! Structured keys for the field, record and permission caches, plus the
//! loose wildcard matcher used by pattern invalidation.

use std::fmt;

// == Cache Key ==
/// Composite key hashed directly by the caches.
///
/// The `Display` form is only used for logs and pattern invalidation;
/// lookups never go through a formatted string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Full field metadata of a model
    Fields { model: String },
    /// One record read with a given field selection (`None` = all fields)
    Record {
        model: String,
        id: i64,
        fields: Option<Vec<String>>,
    },
    /// Access-control permissions of a model
    Permission { model: String },
    /// List of models enabled for access
    EnabledModels,
}

impl CacheKey {
    pub fn fields(model: &str) -> Self {
        CacheKey::Fields {
            model: model.to_string(),
        }
    }

    /// Builds a record key. The field list is sorted and deduplicated so
    /// the same selection in another order shares the entry.
    pub fn record(model: &str, id: i64, fields: Option<&[String]>) -> Self {
        let fields = fields.filter(|f| !f.is_empty()).map(|f| {
            let mut f = f.to_vec();
            f.sort();
            f.dedup();
            f
        });
        CacheKey::Record {
            model: model.to_string(),
            id,
            fields,
        }
    }

    pub fn permission(model: &str) -> Self {
        CacheKey::Permission {
            model: model.to_string(),
        }
    }

    /// Model this key belongs to, if any.
    pub fn model(&self) -> Option<&str> {
        match self {
            CacheKey::Fields { model }
            | CacheKey::Record { model, .. }
            | CacheKey::Permission { model } => Some(model.as_str()),
            CacheKey::EnabledModels => None,
        }
    }

    /// True for record entries of `model`, restricted to `id` when given.
    pub fn is_record_of(&self, model: &str, id: Option<i64>) -> bool {
        match self {
            CacheKey::Record {
                model: m, id: rid, ..
            } => m.as_str() == model && id.map_or(true, |id| id == *rid),
            _ => false,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Fields { model } => write!(f, "fields:{}", model),
            CacheKey::Record { model, id, fields } => match fields {
                Some(fields) => write!(f, "record:{}:{}:{}", model, id, fields.join(",")),
                None => write!(f, "record:{}:{}:all", model, id),
            },
            CacheKey::Permission { model } => write!(f, "permission:{}", model),
            CacheKey::EnabledModels => write!(f, "permission:enabled_models"),
        }
    }
}

// == Pattern Matching ==
/// Loose wildcard match used by `Cache::invalidate_pattern`.
///
/// The pattern is split on `*` and every non-empty literal segment must
/// appear in `key`, in order. This is not a glob: segments may match
/// anywhere, so `"a*c"` matches `"xxaxxcxx"`. A pattern without `*`
/// matches only an identical key.
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == key;
    }

    let mut rest = key;
    for segment in pattern.split('*').filter(|s| !s.is_empty()) {
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }
    true
}
