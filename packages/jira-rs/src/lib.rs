// Minimal client for the Jira Cloud REST API v3.
//
// Covers the handful of endpoints the release dashboard relays: JQL search,
// single issue, project versions and the field catalog.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{header, Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub mod models;

pub use models::{ProjectVersion, SearchPage, SearchParams, DASHBOARD_FIELDS, DEFAULT_SEARCH_FIELDS};

use crate::models::{RawProjectVersion, RawSearchResponse, SearchBody};

#[derive(Error, Debug)]
pub enum JiraError {
    #[error("Invalid Jira base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Request to Jira failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Jira returned {status}")]
    Status { status: u16, body: String },

    #[error("Failed to decode Jira response: {0}")]
    Decode(String),
}

impl JiraError {
    /// Body returned by Jira alongside a non-success status, parsed as JSON
    /// when possible.
    pub fn details(&self) -> Option<Value> {
        match self {
            JiraError::Status { body, .. } if !body.is_empty() => Some(
                serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone())),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JiraOptions {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    base_url: Url,
    authorization: String,
    http: Client,
}

/// Value of the `Authorization` header for Jira Cloud basic auth.
pub fn authorization_header(username: &str, api_token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{api_token}")))
}

impl JiraClient {
    pub fn new(options: JiraOptions) -> Result<Self, JiraError> {
        let mut base_url = Url::parse(&options.base_url)
            .map_err(|e| JiraError::InvalidBaseUrl(format!("{}: {}", options.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(JiraError::InvalidBaseUrl(options.base_url));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            base_url,
            authorization: authorization_header(&options.username, &options.api_token),
            http,
        })
    }

    /// Builds `<base>/rest/api/3/<segments...>`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, JiraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| JiraError::InvalidBaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(["rest", "api", "3"]).extend(segments);
        }
        Ok(url)
    }

    /// Fetches one page of issues matching `params.jql`.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchPage, JiraError> {
        let body = SearchBody::from(params);
        let request = self.http.post(self.endpoint(&["search", "jql"])?).json(&body);
        let value = self.send(request).await?;

        let raw: RawSearchResponse =
            serde_json::from_value(value).map_err(|e| JiraError::Decode(e.to_string()))?;
        let page = SearchPage::from_raw(raw, params);

        tracing::debug!(
            issues = page.issues.len(),
            total = ?page.total,
            has_token = page.next_page_token.is_some(),
            "Jira search page received"
        );
        Ok(page)
    }

    /// Relays an arbitrary search body and returns Jira's JSON untouched.
    pub async fn search_raw(&self, body: &Value) -> Result<Value, JiraError> {
        let request = self.http.post(self.endpoint(&["search", "jql"])?).json(body);
        self.send(request).await
    }

    /// Fetches one issue with every field and its rendered HTML variants.
    pub async fn issue(&self, key: &str) -> Result<Value, JiraError> {
        let request = self
            .http
            .get(self.endpoint(&["issue", key])?)
            .query(&[("expand", "renderedFields"), ("fields", "*all")]);
        self.send(request).await
    }

    /// Lists a project's versions sorted by name.
    pub async fn project_versions(&self, project: &str) -> Result<Vec<ProjectVersion>, JiraError> {
        let request = self.http.get(self.endpoint(&["project", project, "versions"])?);
        let value = self.send(request).await?;

        let raw: Vec<RawProjectVersion> =
            serde_json::from_value(value).map_err(|e| JiraError::Decode(e.to_string()))?;
        let mut versions: Vec<ProjectVersion> = raw.into_iter().map(Into::into).collect();
        versions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(versions)
    }

    /// Fetches the field catalog (system and custom fields).
    pub async fn fields(&self) -> Result<Value, JiraError> {
        let request = self.http.get(self.endpoint(&["field"])?);
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, JiraError> {
        let response = request
            .header(header::AUTHORIZATION, &self.authorization)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Jira returned an error");
            return Err(JiraError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| JiraError::Decode(e.to_string()))
    }
}
