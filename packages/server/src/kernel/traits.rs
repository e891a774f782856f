// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only. The orchestrator and the HTTP routes
// depend on these so tests can swap Jira and the wall clock for doubles.
//
// Naming convention: Base* for trait names (e.g., BaseIssueSearch, BaseClock)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jira::{ProjectVersion, SearchPage, SearchParams};
use serde_json::Value;

// =============================================================================
// Issue Search Trait (the orchestrator's only remote collaborator)
// =============================================================================

#[async_trait]
pub trait BaseIssueSearch: Send + Sync {
    /// Fetch exactly one page of results for `params`.
    ///
    /// Transport timeouts surface as errors; the caller never retries.
    async fn search_page(&self, params: &SearchParams) -> Result<SearchPage>;
}

// =============================================================================
// Issue Tracker Trait (plain request relays)
// =============================================================================

#[async_trait]
pub trait BaseIssueTracker: Send + Sync {
    /// Relay a raw search body and return the remote JSON untouched
    async fn search_raw(&self, body: Value) -> Result<Value>;

    /// Fetch one issue with all fields and rendered fields
    async fn issue(&self, key: &str) -> Result<Value>;

    /// List a project's versions, sorted by name
    async fn project_versions(&self, project: &str) -> Result<Vec<ProjectVersion>>;

    /// Fetch the field catalog
    async fn field_metadata(&self) -> Result<Value>;
}

// =============================================================================
// Clock Trait
// =============================================================================

pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl BaseClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
