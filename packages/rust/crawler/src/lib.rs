//! Crawl orchestration for SiteProfiler.
//!
//! Ties together sitemap discovery, the headless renderer, and signal
//! extraction into a depth-layered crawl with page and depth budgets.

mod engine;
mod events;
mod frontier;

pub use engine::{CrawlController, CrawlOutcome, PageSource, RenderingSource, StopHandle};
pub use events::EventSink;
