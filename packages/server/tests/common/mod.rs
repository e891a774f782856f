// Common test utilities
#![allow(dead_code)]

pub mod harness;

pub use harness::*;
pub use proxy_core::kernel::test_dependencies::{page_of, settle};
