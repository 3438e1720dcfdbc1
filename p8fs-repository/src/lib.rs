//! ABOUTME: Tenant-scoped generic entity repository — CRUD, embedding change-detection, semantic search
//! ABOUTME: One Repository instance serves every entity family; behavior is a pure function of a ModelDescriptor

pub mod binding;
pub mod client;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod repository;
pub mod retry;
pub mod session;

pub use client::{Filter, StorageClient};
pub use memory::InMemoryStorageClient;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStorageClient;
pub use repository::Repository;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use session::{append_message, get_messages, COMPRESSION_THRESHOLD_BYTES};
