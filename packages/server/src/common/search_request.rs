//! Inbound search requests and their normalized form.
//!
//! Both the synchronous and asynchronous search routes accept the same body.
//! Field names follow Jira's search API (`jql`, `maxResults`, `startAt`,
//! `nextPageToken`) with shorter aliases (`query`, `pageSize`, `offset`,
//! `pageToken`). Normalization applies defaults and clamps so that two
//! requests asking for the same page hash to the same cache key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::common::utils::content_hash;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("JQL query is required")]
    MissingQuery,
}

/// Page size bounds applied during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 1000,
        }
    }
}

/// Field list given either as a JSON array or a comma separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    List(Vec<String>),
    Csv(String),
}

impl FieldList {
    fn into_vec(self) -> Vec<String> {
        match self {
            FieldList::List(fields) => fields,
            FieldList::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        }
    }
}

/// Search request as posted by clients. Numeric fields are kept loose so that
/// garbage falls back to defaults instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequestInput {
    #[serde(default, alias = "query")]
    pub jql: Option<String>,
    #[serde(default)]
    pub fields: Option<FieldList>,
    #[serde(default, alias = "pageSize")]
    pub max_results: Option<Value>,
    #[serde(default, alias = "offset")]
    pub start_at: Option<Value>,
    #[serde(default, alias = "pageToken")]
    pub next_page_token: Option<String>,
}

/// Immutable snapshot of a validated search request.
///
/// Serialized field order is fixed, which keeps [`NormalizedSearch::cache_key`]
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSearch {
    pub query: String,
    pub fields: Vec<String>,
    pub page_size: u32,
    pub offset: u64,
    pub page_token: Option<String>,
}

impl SearchRequestInput {
    pub fn normalize(self, limits: SearchLimits) -> Result<NormalizedSearch, ValidationError> {
        let query = self
            .jql
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or(ValidationError::MissingQuery)?;

        let mut fields: Vec<String> = self
            .fields
            .map(FieldList::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            fields = jira::DEFAULT_SEARCH_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect();
        }
        fields.sort();
        fields.dedup();

        let page_size = match self.max_results.as_ref().and_then(as_integer) {
            Some(n) if n >= 1 => n.min(i64::from(limits.max_page_size)) as u32,
            _ => limits.default_page_size.min(limits.max_page_size),
        };

        let offset = match self.start_at.as_ref().and_then(as_integer) {
            Some(n) if n > 0 => n as u64,
            _ => 0,
        };

        let page_token = self
            .next_page_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(NormalizedSearch {
            query,
            fields,
            page_size,
            offset,
            page_token,
        })
    }
}

/// Accepts JSON integers, integral floats and numeric strings.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl NormalizedSearch {
    /// SHA-256 digest of the canonical request.
    pub fn cache_key(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        content_hash(&canonical)
    }

    pub fn to_params(&self) -> jira::SearchParams {
        jira::SearchParams {
            jql: self.query.clone(),
            fields: self.fields.clone(),
            max_results: self.page_size,
            start_at: self.offset,
            next_page_token: self.page_token.clone(),
        }
    }
}
