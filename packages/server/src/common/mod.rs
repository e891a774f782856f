// Common types and utilities shared across the application

pub mod result_meta;
pub mod search_request;
pub mod utils;

pub use result_meta::{ResultMeta, SearchOutcome};
pub use search_request::{
    FieldList, NormalizedSearch, SearchLimits, SearchRequestInput, ValidationError,
};
