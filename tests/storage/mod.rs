//! Shared storage integration tests.
//!
//! Tests the TimelineStore interface against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod timeline_store_tests;
