//! ABOUTME: Shared types, error taxonomy, and tenant primitives for the P8FS memory substrate
//! ABOUTME: Foundation layer used by every other p8fs-* crate

pub mod error;
pub mod ids;
pub mod json;
pub mod logging;
pub mod model;
pub mod tenant;

pub use error::{P8fsError, Result};
pub use ids::{file_id, resource_chunk_id, user_info_id};
pub use json::Json;
pub use model::{FieldDescriptor, FieldType, ModelDescriptor};
pub use tenant::TenantId;
