//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod jobs;
pub mod search_cache;
pub mod sse;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use deps::JiraAdapter;
pub use search_cache::SearchCache;
pub use stream_hub::{HubEvent, StreamHub, Subscription};
pub use test_dependencies::{ManualClock, MockIssueSearch};
pub use traits::*;
