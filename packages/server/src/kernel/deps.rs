//! Adapters wiring concrete clients to the kernel traits.

use anyhow::Result;
use async_trait::async_trait;
use jira::{JiraClient, ProjectVersion, SearchPage, SearchParams};
use serde_json::Value;
use std::sync::Arc;

use crate::kernel::{BaseIssueSearch, BaseIssueTracker};

// =============================================================================
// JiraClient Adapter (implements BaseIssueSearch + BaseIssueTracker)
// =============================================================================

/// Wrapper around JiraClient that implements the kernel traits.
///
/// Errors keep their `JiraError` source so routes can recover the remote body
/// with `downcast_ref`.
#[derive(Clone)]
pub struct JiraAdapter(pub Arc<JiraClient>);

impl JiraAdapter {
    pub fn new(client: Arc<JiraClient>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl BaseIssueSearch for JiraAdapter {
    async fn search_page(&self, params: &SearchParams) -> Result<SearchPage> {
        Ok(self.0.search(params).await?)
    }
}

#[async_trait]
impl BaseIssueTracker for JiraAdapter {
    async fn search_raw(&self, body: Value) -> Result<Value> {
        Ok(self.0.search_raw(&body).await?)
    }

    async fn issue(&self, key: &str) -> Result<Value> {
        Ok(self.0.issue(key).await?)
    }

    async fn project_versions(&self, project: &str) -> Result<Vec<ProjectVersion>> {
        Ok(self.0.project_versions(project).await?)
    }

    async fn field_metadata(&self) -> Result<Value> {
        Ok(self.0.fields().await?)
    }
}
