//! Shared types, error model, and configuration for SiteProfiler.
//!
//! This crate is the foundation depended on by all other SiteProfiler crates.
//! It provides:
//! - [`SiteProfilerError`] — the unified error type
//! - Domain types ([`Page`], [`BusinessProfile`], [`CrawlEvent`], [`CrawlId`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)
//! - URL normalization ([`urlnorm`])

pub mod config;
pub mod error;
pub mod types;
pub mod urlnorm;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlPoliciesConfig, DefaultsConfig, OpenRouterConfig,
    RendererConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_api_key,
};
pub use error::{Result, SiteProfilerError};
pub use types::{
    BusinessProfile, BusinessProfileDraft, CrawlEvent, CrawlId, Page, PriceMention,
    ServiceEntry, StaffEntry,
};
