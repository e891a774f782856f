//! Pagination metadata derived from one page of search results.
//!
//! Jira may omit `total`, page by token instead of offset, or do both. The
//! derived `nextOffset`, `hasMore` and `total` are kept consistent whichever
//! fields the remote populated:
//!
//! - `hasMore`: negated `isLast` when present, else whether a continuation
//!   token came back, else `nextOffset < total`.
//! - `total`: the remote total when present, else `max(nextOffset, pageSize)`.

use jira::SearchPage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMeta {
    pub offset: u64,
    pub page_size: u64,
    pub next_offset: u64,
    pub has_more: bool,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl ResultMeta {
    pub fn from_page(page: &SearchPage) -> Self {
        let page_size = page.issues.len() as u64;
        let next_offset = page.start_at + page_size;
        let total = page.total.unwrap_or_else(|| next_offset.max(page_size));

        let has_more = match (page.is_last, &page.next_page_token) {
            (Some(is_last), _) => !is_last,
            (None, Some(_)) => true,
            (None, None) => next_offset < total,
        };

        Self {
            offset: page.start_at,
            page_size,
            next_offset,
            has_more,
            total,
            next_page_token: page.next_page_token.clone(),
        }
    }
}

/// A completed search: the page payload plus its derived metadata. This is
/// what the cache memoizes and what `complete` events carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub data: Value,
    pub meta: ResultMeta,
}

impl SearchOutcome {
    pub fn from_page(page: &SearchPage) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: serde_json::to_value(page)?,
            meta: ResultMeta::from_page(page),
        })
    }

    pub fn total_issues(&self) -> u64 {
        self.meta.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(count: usize, start_at: u64) -> SearchPage {
        SearchPage {
            issues: (0..count).map(|i| json!({"key": format!("CTL-{i}")})).collect(),
            start_at,
            max_results: 100,
            total: None,
            next_page_token: None,
            is_last: None,
        }
    }

    #[test]
    fn test_no_total_no_token_is_last_page() {
        let meta = ResultMeta::from_page(&page(25, 0));

        assert!(!meta.has_more);
        assert_eq!(meta.total, 25);
        assert_eq!(meta.next_offset, 25);
        assert_eq!(meta.page_size, 25);
    }

    #[test]
    fn test_token_means_more() {
        let meta = ResultMeta::from_page(&SearchPage {
            next_page_token: Some("abc".to_string()),
            ..page(10, 0)
        });

        assert!(meta.has_more);
        assert_eq!(meta.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_is_last_overrides_token() {
        let meta = ResultMeta::from_page(&SearchPage {
            next_page_token: Some("abc".to_string()),
            is_last: Some(true),
            ..page(10, 0)
        });
        assert!(!meta.has_more);
    }

    #[test]
    fn test_is_last_false_means_more() {
        let meta = ResultMeta::from_page(&SearchPage {
            is_last: Some(false),
            ..page(10, 0)
        });
        assert!(meta.has_more);
        assert_eq!(meta.total, 10);
    }

    #[test]
    fn test_remote_total_used_for_offset_paging() {
        let meta = ResultMeta::from_page(&SearchPage {
            total: Some(120),
            ..page(50, 50)
        });

        assert_eq!(meta.next_offset, 100);
        assert_eq!(meta.total, 120);
        assert!(meta.has_more);
    }

    #[test]
    fn test_offset_page_without_total() {
        let meta = ResultMeta::from_page(&page(5, 40));

        assert_eq!(meta.next_offset, 45);
        assert_eq!(meta.total, 45);
        assert!(!meta.has_more);
    }

    #[test]
    fn test_empty_page() {
        let meta = ResultMeta::from_page(&page(0, 0));
        assert_eq!(meta.total, 0);
        assert!(!meta.has_more);
    }

    #[test]
    fn test_outcome_carries_payload() {
        let outcome = SearchOutcome::from_page(&page(3, 0)).unwrap();

        assert_eq!(outcome.total_issues(), 3);
        assert_eq!(outcome.data["issues"].as_array().map(Vec::len), Some(3));
        assert_eq!(outcome.data["startAt"], 0);
    }

    #[test]
    fn test_meta_serializes_camel_case() {
        let value = serde_json::to_value(ResultMeta::from_page(&page(2, 0))).unwrap();
        assert_eq!(
            value,
            json!({"offset": 0, "pageSize": 2, "nextOffset": 2, "hasMore": false, "total": 2})
        );
    }
}
