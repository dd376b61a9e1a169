//! Progress event emission.
//!
//! The controller produces a per-run sequence of [`CrawlEvent`]s over a
//! `tokio::sync::mpsc` channel; the caller consumes it concurrently with
//! awaiting the final result. A sink without a sender is a no-op, so the
//! crawl code never branches on whether anyone is listening.

use tokio::sync::mpsc::UnboundedSender;

use siteprofiler_shared::CrawlEvent;

/// Cloneable handle used by the controller (and its workers) to emit
/// progress events. Send failures mean the consumer went away, which is
/// not the crawl's problem — they are ignored.
#[derive(Clone)]
pub struct EventSink {
    tx: Option<UnboundedSender<CrawlEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<CrawlEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops every event (headless/test usage).
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: CrawlEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
