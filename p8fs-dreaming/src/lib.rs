//! ABOUTME: Periodic tenant-scoped enrichment worker — moments, resource affinity, entities, summaries, digests
//! ABOUTME: Every pipeline here is a callable idempotent unit of work; an external scheduler decides when to invoke it

pub mod affinity;
pub mod cadence;
pub mod chunking;
pub mod digest;
pub mod entities;
pub mod job;
pub mod json_extractor;
pub mod llm;
pub mod moments;
pub mod summary;

pub use affinity::recompute_affinity;
pub use cadence::{run_daily_affinity_tick, run_moment_affinity_tick, AffinityTarget};
pub use digest::{send_digest, DigestSender};
pub use entities::{apply_entities_to_resource, extract_entities, EntityType, ExtractedEntity};
pub use job::{cancel_job, complete_job, create_job, fail_job, record_task, start_job, JobStatus};
pub use json_extractor::extract_json;
pub use llm::{LlmClient, ScriptedLlmClient};
pub use moments::{extract_and_store_moments, extract_moments_from_chunk, MomentDraft};
pub use summary::{load_or_create_user_context, summarize_user};
