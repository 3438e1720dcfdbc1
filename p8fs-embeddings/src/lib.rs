//! ABOUTME: Embedding provider abstraction, HTTP and deterministic-local implementations, and caching
//! ABOUTME: Every field-level embedding generation in the repository crate goes through this seam

pub mod cache;
pub mod factory;
pub mod http;
pub mod local;
pub mod provider;

pub use cache::{CacheStats, CachedEmbeddingProvider};
pub use factory::build_provider;
pub use http::HttpEmbeddingProvider;
pub use local::LocalEmbeddingProvider;
pub use provider::EmbeddingProvider;
