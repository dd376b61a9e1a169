//! Error types for SiteProfiler.
//!
//! Library crates use [`SiteProfilerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only browser-initialization failures and a crawl that collects zero
//! pages are hard errors. Per-page render failures, sitemap misses, and
//! LLM extraction failures degrade gracefully inside the pipeline and are
//! visible through progress events and logs only.

use std::path::PathBuf;

/// Top-level error type for all SiteProfiler operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteProfilerError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The start URL (or another required URL) could not be parsed.
    #[error("malformed URL: {0}")]
    MalformedUrl(String),

    /// Headless browser could not be launched or contacted.
    #[error("browser error: {0}")]
    Browser(String),

    /// Network/HTTP error outside the render path (discovery, LLM call).
    #[error("network error: {0}")]
    Network(String),

    /// The crawl finished without collecting a single page, so no
    /// profile can be built.
    #[error("crawl collected no pages from {start_url}")]
    NoPagesCollected { start_url: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteProfilerError>;

impl SiteProfilerError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
