//! ABOUTME: Shared test fixtures and builders used across the p8fs-* workspace's test suites
//! ABOUTME: Dev-dependency only: nothing here is linked into a production binary

pub mod fixtures;

pub use fixtures::{in_memory_repository, scripted_llm_with_noisy_moment_fixture, NOISY_MOMENT_JSON_FIXTURE};
