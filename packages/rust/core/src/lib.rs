//! Profile extraction and pipeline orchestration for SiteProfiler.
//!
//! Two independent extraction passes — a deterministic pattern pass and an
//! LLM pass — feed one merger producing the final [`BusinessProfile`].

pub mod llm;
pub mod merge;
pub mod pattern;
pub mod pipeline;

pub use llm::LlmExtractor;
pub use pipeline::{build_profile, PipelineConfig, ProfileResult};

pub use siteprofiler_shared::types::BusinessProfile;
