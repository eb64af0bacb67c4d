//! Integration tests for the summary hierarchy.
//!
//! Everything except the `#[ignore]`d live test runs against a temporary
//! directory, an in-memory store, or a local mock HTTP server.

pub mod common;
pub mod hierarchy_tests;
pub mod openai_tests;
