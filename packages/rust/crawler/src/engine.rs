//! Depth-layered crawl controller.
//!
//! The controller owns the frontier, the visited set, and a bounded worker
//! pool. Workers are pure functions of a URL: they render and extract one
//! page and return the result as a message; only the coordinating loop
//! mutates crawl state, so there is no shared-state locking anywhere in the
//! hot path. Depth `d` fully completes before any depth `d+1` page is
//! dispatched, because next-depth candidates are derived from depth-`d`
//! results.
//!
//! State machine: `Idle → Discovering → CrawlingDepth(d) → Completed |
//! Aborted`. The only aborting failure is the rendering backend refusing to
//! initialize; individual page failures merely emit events.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use siteprofiler_discovery::DiscoveryOptions;
use siteprofiler_extract::SignalPatterns;
use siteprofiler_renderer::{RenderFailure, Renderer, RendererOptions};
use siteprofiler_shared::config::CrawlConfig;
use siteprofiler_shared::types::{CrawlEvent, CrawlId, Page};
use siteprofiler_shared::urlnorm;
use siteprofiler_shared::{Result, SiteProfilerError};

use crate::events::EventSink;
use crate::frontier;

// ---------------------------------------------------------------------------
// Page source
// ---------------------------------------------------------------------------

/// A worker's view of the world: turn one URL into a [`Page`] or a
/// [`RenderFailure`]. Implemented by the real renderer+extractor stack and
/// by test stubs.
pub trait PageSource: Send + Sync + 'static {
    /// Prepare the backing resources (e.g. launch the browser). A failure
    /// here aborts the crawl before anything is dispatched.
    fn warm_up(&self) -> impl Future<Output = Result<()>> + Send;

    /// Render and extract one URL.
    fn fetch(
        &self,
        url: Url,
    ) -> impl Future<Output = std::result::Result<Page, RenderFailure>> + Send;
}

/// The production page source: headless render followed by signal
/// extraction.
pub struct RenderingSource {
    renderer: Renderer,
    patterns: SignalPatterns,
}

impl RenderingSource {
    pub fn new(config: &CrawlConfig) -> Self {
        Self {
            renderer: Renderer::new(RendererOptions::from(config)),
            patterns: SignalPatterns::new(config.min_text_len),
        }
    }

    /// Close the shared browser.
    pub async fn shutdown(&self) {
        self.renderer.shutdown().await;
    }
}

impl PageSource for RenderingSource {
    fn warm_up(&self) -> impl Future<Output = Result<()>> + Send {
        self.renderer.warm_up()
    }

    fn fetch(
        &self,
        url: Url,
    ) -> impl Future<Output = std::result::Result<Page, RenderFailure>> + Send {
        async move {
            let raw = self.renderer.render(&url).await?;
            Ok(siteprofiler_extract::extract(
                &url,
                &raw.html,
                raw.title.as_deref(),
                &self.patterns,
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Summary of a completed crawl.
#[derive(Debug)]
pub struct CrawlOutcome {
    /// Identifier of this run, stamped on every progress event.
    pub crawl_id: CrawlId,
    /// Successfully collected pages, in completion order.
    pub pages: Vec<Page>,
    /// Permanently failed pages (URL, reason).
    pub failures: Vec<(String, String)>,
    /// Total crawl duration.
    pub duration: Duration,
}

/// Asks a running crawl to stop after the current depth. In-flight workers
/// are allowed to finish or time out.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Depth-bounded, priority-ordered crawl coordinator.
pub struct CrawlController<S: PageSource> {
    config: CrawlConfig,
    source: Arc<S>,
    events: EventSink,
    stop: Arc<AtomicBool>,
}

impl CrawlController<RenderingSource> {
    /// Controller backed by the real headless renderer.
    pub fn new(config: CrawlConfig, events: EventSink) -> Self {
        let source = Arc::new(RenderingSource::new(&config));
        Self::with_source(config, source, events)
    }

    /// Close the underlying browser once crawling is done.
    pub async fn shutdown(&self) {
        self.source.shutdown().await;
    }
}

impl<S: PageSource> CrawlController<S> {
    pub fn with_source(config: CrawlConfig, source: Arc<S>, events: EventSink) -> Self {
        Self {
            config,
            source,
            events,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for requesting a stop after the current depth completes.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Run the crawl from `start_url` until a budget is exhausted or the
    /// frontier empties. Fails only on initialization errors or when no
    /// page at all could be collected.
    #[instrument(skip_all, fields(start_url = %start_url))]
    pub async fn crawl(&self, start_url: &Url) -> Result<CrawlOutcome> {
        let started = Instant::now();
        let crawl_id = CrawlId::new();

        let start = urlnorm::normalize(start_url.as_str(), None)
            .ok_or_else(|| SiteProfilerError::MalformedUrl(start_url.to_string()))?;

        self.events.emit(CrawlEvent::Start {
            crawl_id: crawl_id.clone(),
            url: start.to_string(),
        });

        info!(
            max_depth = self.config.max_depth,
            max_pages = self.config.max_pages,
            concurrency = self.config.concurrency,
            "starting crawl"
        );

        // Discovering: sitemap seeding runs concurrently with backend warm-up.
        let discovery_opts = DiscoveryOptions::default();
        let (warm, seeds) = tokio::join!(
            self.source.warm_up(),
            siteprofiler_discovery::discover(&start, &discovery_opts),
        );
        warm?;

        let mut initial: Vec<Url> = Vec::with_capacity(seeds.len() + 1);
        let mut seen: HashSet<Url> = HashSet::new();
        for url in std::iter::once(start.clone()).chain(seeds) {
            if seen.insert(url.clone()) {
                initial.push(url);
            }
        }
        let mut frontier: VecDeque<Url> =
            frontier::prioritize(initial, &self.config.priority_patterns).into();

        let mut visited: HashSet<Url> = HashSet::new();
        let mut pages: Vec<Page> = Vec::new();
        let mut failures: Vec<(String, String)> = Vec::new();
        let mut seen_hashes: HashSet<String> = HashSet::new();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1) as usize));
        // Live collected-page count, read by workers when they emit
        // `Scraping` so concurrent workers report fresh numbers.
        let collected = Arc::new(AtomicUsize::new(0));

        let mut depth: u32 = 0;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!(depth, "stop requested, not advancing to next depth");
                break;
            }

            let budget = self.config.max_pages.saturating_sub(pages.len());
            if budget == 0 {
                break;
            }

            let batch = take_batch(
                &mut frontier,
                &mut visited,
                budget,
                &self.config.ignore_patterns,
            );
            if batch.is_empty() {
                break;
            }

            self.events.emit(CrawlEvent::Depth {
                depth,
                queued: batch.len(),
            });
            debug!(depth, queued = batch.len(), "dispatching depth batch");

            let mut handles = Vec::with_capacity(batch.len());
            for url in batch {
                let source = Arc::clone(&self.source);
                let semaphore = Arc::clone(&semaphore);
                let events = self.events.clone();
                let counter = Arc::clone(&collected);
                let max_pages = self.config.max_pages;

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    events.emit(CrawlEvent::Scraping {
                        url: url.to_string(),
                        collected: counter.load(Ordering::Relaxed),
                        budget: max_pages,
                    });
                    let result = source.fetch(url.clone()).await;
                    if result.is_ok() {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                    (url, result)
                }));
            }

            // Fold worker results back into crawl state. Workers never touch
            // this state themselves.
            let mut depth_pages: Vec<Page> = Vec::new();
            for handle in handles {
                match handle.await {
                    Ok((url, Ok(page))) => {
                        if !seen_hashes.insert(page.content_hash.clone()) {
                            debug!(%url, "duplicate content, skipping");
                            collected.fetch_sub(1, Ordering::Relaxed);
                            continue;
                        }
                        self.events.emit(CrawlEvent::PageDone {
                            url: url.to_string(),
                            collected: pages.len() + depth_pages.len() + 1,
                        });
                        depth_pages.push(page);
                    }
                    Ok((url, Err(failure))) => {
                        warn!(%url, error = %failure, "page dropped");
                        self.events.emit(CrawlEvent::PageError {
                            url: url.to_string(),
                            reason: failure.message.clone(),
                        });
                        failures.push((url.to_string(), failure.message));
                    }
                    Err(e) => {
                        warn!(error = %e, "render worker panicked");
                        failures.push(("worker".into(), e.to_string()));
                    }
                }
            }

            // Next-depth candidates come exclusively from this depth's
            // successes, so depth d is fully done before d+1 starts.
            if depth < self.config.max_depth {
                let mut queued: HashSet<Url> = HashSet::new();
                let mut next: Vec<Url> = Vec::new();
                for page in &depth_pages {
                    for link in &page.outbound_links {
                        if !urlnorm::same_origin(link, &start)
                            || visited.contains(link)
                            || frontier::matches_any(link, &self.config.ignore_patterns)
                            || !queued.insert(link.clone())
                        {
                            continue;
                        }
                        next.push(link.clone());
                    }
                }
                frontier = frontier::prioritize(next, &self.config.priority_patterns).into();
            } else {
                frontier.clear();
            }

            pages.extend(depth_pages);

            if depth >= self.config.max_depth {
                break;
            }
            depth += 1;
        }

        let duration = started.elapsed();
        self.events.emit(CrawlEvent::ScrapeComplete {
            pages: pages.len(),
            failures: failures.len(),
            duration_ms: duration.as_millis() as u64,
        });

        if pages.is_empty() {
            return Err(SiteProfilerError::NoPagesCollected {
                start_url: start.to_string(),
            });
        }

        info!(
            pages = pages.len(),
            failures = failures.len(),
            duration_ms = duration.as_millis(),
            "crawl completed"
        );

        Ok(CrawlOutcome {
            crawl_id,
            pages,
            failures,
            duration,
        })
    }
}

/// Pop up to `budget` dispatchable URLs, marking them visited before
/// dispatch (at-most-once-fetch invariant).
fn take_batch(
    frontier: &mut VecDeque<Url>,
    visited: &mut HashSet<Url>,
    budget: usize,
    ignore_patterns: &[String],
) -> Vec<Url> {
    let mut batch = Vec::new();
    while batch.len() < budget {
        let Some(url) = frontier.pop_front() else {
            break;
        };
        if visited.contains(&url) || frontier::matches_any(&url, ignore_patterns) {
            continue;
        }
        visited.insert(url.clone());
        batch.push(url);
    }
    batch
}
