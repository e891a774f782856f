use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields requested by the release dashboard's `/search` view.
pub const DASHBOARD_FIELDS: &[&str] = &[
    "key",
    "summary",
    "status",
    "assignee",
    "reporter",
    "issuetype",
    "description",
    "customfield_10014",
    "issuelinks",
    "fixVersions",
    "versions",
    "customfield_10004",
    "customfield_10005",
    "customfield_10006",
    "customfield_10007",
    "customfield_10008",
    "customfield_10009",
    "customfield_10010",
    "customfield_10011",
    "customfield_10012",
    "customfield_10013",
    "customfield_10015",
    "customfield_10016",
    "customfield_10017",
    "customfield_10018",
    "customfield_10019",
    "customfield_10020",
    "customfield_10021",
    "customfield_10022",
    "customfield_10023",
    "customfield_10024",
    "customfield_10025",
    "customfield_10026",
    "customfield_10027",
    "customfield_10028",
    "customfield_10029",
    "customfield_10030",
    "customfield_10056",
    "customfield_10221",
    "parent",
];

/// Fields used when a search names none.
pub const DEFAULT_SEARCH_FIELDS: &[&str] = &[
    "key",
    "summary",
    "status",
    "assignee",
    "reporter",
    "issuetype",
    "fixVersions",
    "parent",
];

/// Parameters for one page of `POST /rest/api/3/search/jql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub jql: String,
    pub fields: Vec<String>,
    pub max_results: u32,
    pub start_at: u64,
    pub next_page_token: Option<String>,
}

/// Wire body sent to the search endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchBody<'a> {
    pub jql: &'a str,
    pub fields: &'a [String],
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<&'a str>,
}

impl<'a> From<&'a SearchParams> for SearchBody<'a> {
    fn from(params: &'a SearchParams) -> Self {
        // Token paging wins; startAt is only sent for offset paging past the first page.
        let start_at = match (&params.next_page_token, params.start_at) {
            (None, offset) if offset > 0 => Some(offset),
            _ => None,
        };

        Self {
            jql: &params.jql,
            fields: &params.fields,
            max_results: params.max_results,
            start_at,
            next_page_token: params.next_page_token.as_deref(),
        }
    }
}

/// Search response as returned by either the token-paged or the legacy
/// offset-paged endpoint. Everything but `issues` is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSearchResponse {
    pub issues: Vec<Value>,
    #[serde(default)]
    pub start_at: Option<u64>,
    #[serde(default)]
    pub max_results: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub is_last: Option<bool>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub issues: Vec<Value>,
    pub start_at: u64,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_last: Option<bool>,
}

impl SearchPage {
    pub(crate) fn from_raw(raw: RawSearchResponse, params: &SearchParams) -> Self {
        Self {
            issues: raw.issues,
            start_at: raw.start_at.unwrap_or(params.start_at),
            max_results: raw.max_results.unwrap_or(params.max_results),
            total: raw.total,
            next_page_token: raw.next_page_token.filter(|t| !t.is_empty()),
            is_last: raw.is_last,
        }
    }
}

/// A project version as exposed to the dashboard's autocomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectVersion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub released: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawProjectVersion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub released: Option<bool>,
}

impl From<RawProjectVersion> for ProjectVersion {
    fn from(raw: RawProjectVersion) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            description: raw.description.unwrap_or_default(),
            released: raw.released.unwrap_or(false),
        }
    }
}
