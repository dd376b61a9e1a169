//! The acquisition pipeline: crawl, extract twice, merge once.
//!
//! [`build_profile`] is the single inbound contract of this crate. The
//! resulting [`BusinessProfile`] is handed on unmodified as read-only
//! grounding context for whatever consumes it.

use tracing::{info, instrument, warn};
use url::Url;

use siteprofiler_crawler::{CrawlController, EventSink};
use siteprofiler_shared::config::{CrawlConfig, OpenRouterConfig};
use siteprofiler_shared::types::{BusinessProfile, CrawlId};
use siteprofiler_shared::Result;

use crate::llm::LlmExtractor;
use crate::{merge, pattern};

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where the crawl starts.
    pub start_url: Url,
    /// Crawl budgets, timeouts, and frontier policies.
    pub crawl: CrawlConfig,
    /// LLM endpoint settings.
    pub openrouter: OpenRouterConfig,
    /// Skip the LLM pass entirely (pattern-only profile).
    pub use_llm: bool,
}

/// A finished run: the profile plus run metadata.
#[derive(Debug, serde::Serialize)]
pub struct ProfileResult {
    pub crawl_id: CrawlId,
    pub start_url: String,
    pub pages_crawled: usize,
    pub failures: usize,
    pub duration_ms: u64,
    pub profile: BusinessProfile,
}

/// Run the full pipeline: crawl the site, build both drafts, merge.
///
/// Progress events stream through `events` while this future runs. The
/// only hard errors are a malformed start URL, a browser that will not
/// launch, and a crawl that collects nothing.
#[instrument(skip_all, fields(start_url = %config.start_url))]
pub async fn build_profile(config: &PipelineConfig, events: EventSink) -> Result<ProfileResult> {
    let controller = CrawlController::new(config.crawl.clone(), events);

    // A first Ctrl-C stops after the current depth; already-dispatched
    // renders finish or time out and still make it into the profile.
    let stop = controller.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current depth");
            stop.stop();
        }
    });

    let crawl_result = controller.crawl(&config.start_url).await;
    interrupt.abort();
    controller.shutdown().await;
    let outcome = crawl_result?;

    let pattern_draft = pattern::normalize(&outcome.pages);
    let llm_draft = if config.use_llm {
        match resolve_api_key(&config.openrouter) {
            Some(key) => {
                LlmExtractor::new(config.openrouter.clone(), key)
                    .extract(&outcome.pages)
                    .await
            }
            None => {
                warn!(
                    var = %config.openrouter.api_key_env,
                    "API key not set, skipping LLM extraction"
                );
                None
            }
        }
    } else {
        None
    };

    let llm_contributed = llm_draft.is_some();
    let profile = merge::merge(pattern_draft, llm_draft);

    info!(
        pages = outcome.pages.len(),
        services = profile.services.len(),
        llm = llm_contributed,
        "profile built"
    );

    Ok(ProfileResult {
        crawl_id: outcome.crawl_id,
        start_url: config.start_url.to_string(),
        pages_crawled: outcome.pages.len(),
        failures: outcome.failures.len(),
        duration_ms: outcome.duration.as_millis() as u64,
        profile,
    })
}

fn resolve_api_key(config: &OpenRouterConfig) -> Option<String> {
    std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_resolves_to_none() {
        let mut config = OpenRouterConfig::default();
        config.api_key_env = "SP_TEST_PIPELINE_NO_SUCH_KEY".into();
        assert!(resolve_api_key(&config).is_none());
    }

    #[test]
    fn result_serializes_for_json_output() {
        let result = ProfileResult {
            crawl_id: CrawlId::new(),
            start_url: "https://example.com/".into(),
            pages_crawled: 3,
            failures: 1,
            duration_ms: 1234,
            profile: merge::merge(Default::default(), None),
        };
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["pages_crawled"], 3);
        assert!(json["profile"].is_object());
    }
}
