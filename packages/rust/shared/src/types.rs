//! Core domain types for the SiteProfiler acquisition pipeline.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// CrawlId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one crawl run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrawlId(pub Uuid);

impl CrawlId {
    /// Generate a new time-sortable crawl identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CrawlId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CrawlId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CrawlId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// A price mention found in page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMention {
    /// The full matched text, including any label phrase
    /// (e.g. `"Haircut – 20€"`).
    pub raw_text: String,
    /// Just the amount with its currency marker (e.g. `"20€"`).
    pub amount_text: String,
}

/// Structured signals extracted from one successfully rendered URL.
///
/// Created once per page and immutable afterwards; owned by the crawl
/// controller until the whole collection is handed to the extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Normalized page URL.
    pub url: Url,
    /// Page title, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Cleaned main text, bounded in length.
    pub main_text: String,
    /// Currency-tagged price mentions.
    pub prices: Vec<PriceMention>,
    /// Phone numbers found on the page.
    pub phones: BTreeSet<String>,
    /// Email addresses found on the page.
    pub emails: BTreeSet<String>,
    /// Opening-hours phrases.
    pub hours: Vec<String>,
    /// Same-site outbound links, navigation links first.
    pub outbound_links: Vec<Url>,
    /// SHA-256 of the raw HTML, for duplicate-content suppression.
    pub content_hash: String,
    /// When the page was rendered.
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Business profile
// ---------------------------------------------------------------------------

/// A single offered service, optionally with price and category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// An intermediate, not-yet-merged profile produced by one extraction
/// strategy (pattern-based or LLM-based).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfileDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Opening-hours lines, weekday-first entries sorted ahead.
    #[serde(default)]
    pub hours: Vec<String>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
    #[serde(default)]
    pub staff: Vec<StaffEntry>,
    /// Free-text excerpt from the richest page (pattern draft only).
    #[serde(default)]
    pub free_text_excerpt: Option<String>,
    /// "About us" positioning text (LLM draft only).
    #[serde(default)]
    pub about: Option<String>,
    /// Customer-benefit positioning text (LLM draft only).
    #[serde(default)]
    pub benefits: Option<String>,
    /// Frequently asked questions text (LLM draft only).
    #[serde(default)]
    pub faq: Option<String>,
}

/// The final merged business knowledge profile — the pipeline's sole output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub hours: Vec<String>,
    pub services: Vec<ServiceEntry>,
    pub staff: Vec<StaffEntry>,
    pub free_text_excerpt: Option<String>,
    pub about: String,
    pub benefits: String,
    pub faq: String,
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

/// Typed progress event streamed by the crawl controller and pipeline.
///
/// Consumers receive these over a `tokio::sync::mpsc` channel concurrently
/// with awaiting the final profile; counters are sufficient to render a
/// progress UI without waiting for the whole crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    /// Crawl accepted; discovery is starting.
    Start { crawl_id: CrawlId, url: String },
    /// A new depth layer is being dispatched.
    Depth { depth: u32, queued: usize },
    /// A worker started rendering a URL.
    Scraping {
        url: String,
        collected: usize,
        budget: usize,
    },
    /// A page was rendered and extracted successfully.
    PageDone { url: String, collected: usize },
    /// A page failed permanently (after retry, where applicable).
    PageError { url: String, reason: String },
    /// The crawl is over; extraction and merge follow.
    ScrapeComplete {
        pages: usize,
        failures: usize,
        duration_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_id_roundtrip() {
        let id = CrawlId::new();
        let s = id.to_string();
        let parsed: CrawlId = s.parse().expect("parse CrawlId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn event_serialization_uses_snake_case_tags() {
        let event = CrawlEvent::PageDone {
            url: "https://example.com/pricing".into(),
            collected: 3,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains(r#""type":"page_done""#));
    }

    #[test]
    fn draft_deserializes_from_partial_json() {
        // The LLM often omits fields; every field must default cleanly.
        let json = r#"{"name": "Corner Barbershop", "services": [{"name": "Haircut", "price": "20€"}]}"#;
        let draft: BusinessProfileDraft = serde_json::from_str(json).expect("deserialize");
        assert_eq!(draft.name.as_deref(), Some("Corner Barbershop"));
        assert_eq!(draft.services.len(), 1);
        assert!(draft.staff.is_empty());
        assert!(draft.about.is_none());
    }

    #[test]
    fn profile_serializes_with_all_fields() {
        let profile = BusinessProfile {
            name: Some("Corner Barbershop".into()),
            address: None,
            phone: Some("+49 30 1234567".into()),
            email: None,
            hours: vec!["Mon–Fri 9:00–18:00".into()],
            services: vec![],
            staff: vec![],
            free_text_excerpt: None,
            about: String::new(),
            benefits: String::new(),
            faq: String::new(),
        };
        let json = serde_json::to_string(&profile).expect("serialize");
        let parsed: BusinessProfile = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.name.as_deref(), Some("Corner Barbershop"));
        assert_eq!(parsed.hours.len(), 1);
    }
}
