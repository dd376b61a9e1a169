//! Headless-browser page rendering for SiteProfiler.
//!
//! One Chromium instance is launched lazily and shared read-only across
//! workers; each render opens an isolated tab, blocks non-essential
//! resources, navigates under a retrying timeout, waits for content to
//! settle, performs a bounded carousel sweep, and returns the raw HTML with
//! any accumulated carousel text appended as an auxiliary content block.
//!
//! A failed render never fails the crawl: it yields a [`RenderFailure`]
//! carrying the URL and a failure classification, and only that page is
//! dropped.

mod carousel;
mod retry;

pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use siteprofiler_shared::config::CrawlConfig;
use siteprofiler_shared::{Result, SiteProfilerError};

/// User-Agent string for rendered navigation.
const USER_AGENT: &str = concat!("SiteProfiler/", env!("CARGO_PKG_VERSION"));

/// Poll interval during the settle wait.
const SETTLE_POLL: Duration = Duration::from_millis(250);

/// Resource patterns blocked before navigation: images, fonts, media, and
/// known analytics hosts. Cuts latency without losing textual content.
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg", "*.webp", "*.ico",
    "*.woff", "*.woff2", "*.ttf", "*.otf",
    "*.mp4", "*.webm", "*.mp3", "*.avi",
    "*googletagmanager.com*",
    "*google-analytics.com*",
    "*doubleclick.net*",
    "*connect.facebook.net*",
    "*hotjar.com*",
    "*clarity.ms*",
];

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// How a render attempt failed. Timeouts are the only retryable class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Navigation or readiness wait exceeded its timeout.
    Timeout,
    /// Navigation failed for a non-timeout reason (DNS, TLS, HTTP error page).
    Navigation,
    /// The browser or CDP session itself misbehaved.
    Browser,
}

/// A permanently failed page render. Carries enough context for progress
/// events and logs; never aborts the crawl.
#[derive(Debug, Clone)]
pub struct RenderFailure {
    pub url: Url,
    pub kind: FailureKind,
    pub message: String,
}

impl std::fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}: {}", self.url, self.kind, self.message)
    }
}

/// A successfully rendered page, before signal extraction.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The rendered URL (already normalized by the caller).
    pub url: Url,
    /// Full page HTML, with accumulated carousel text appended as an
    /// auxiliary `<section data-accumulated>` block.
    pub html: String,
    /// Browser-reported document title.
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Renderer options
// ---------------------------------------------------------------------------

/// Tuning knobs for a render, derived from the crawl configuration.
#[derive(Debug, Clone)]
pub struct RendererOptions {
    /// Navigation timeout for the first attempt (doubled on retry).
    pub nav_timeout: Duration,
    /// Ceiling on the dynamic-content settle wait.
    pub render_wait: Duration,
    /// Visible-text length considered "ready".
    pub min_text_len: usize,
    /// Upper bound on carousel interactions per page.
    pub carousel_max_steps: u32,
}

impl From<&CrawlConfig> for RendererOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            nav_timeout: Duration::from_millis(config.nav_timeout_ms),
            render_wait: Duration::from_millis(config.render_wait_ms),
            min_text_len: config.min_text_len,
            carousel_max_steps: config.carousel_max_steps,
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Drives one shared headless browser; each call to [`Renderer::render`]
/// owns an isolated tab, so concurrent workers never share a rendering
/// surface.
pub struct Renderer {
    browser: Arc<Mutex<Option<Arc<Browser>>>>,
    opts: RendererOptions,
}

impl Renderer {
    pub fn new(opts: RendererOptions) -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            opts,
        }
    }

    /// Launch the browser eagerly. A launch failure here is the one
    /// non-recoverable initialization error of the pipeline.
    pub async fn warm_up(&self) -> Result<()> {
        self.get_or_launch().await.map(|_| ())
    }

    /// Close the shared browser, if it was ever launched.
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.take() {
            if let Ok(mut browser) = Arc::try_unwrap(browser) {
                if let Err(e) = browser.close().await {
                    warn!(error = %e, "browser close error");
                }
            }
        }
    }

    async fn get_or_launch(&self) -> Result<Arc<Browser>> {
        let mut guard = self.browser.lock().await;
        if let Some(ref browser) = *guard {
            return Ok(Arc::clone(browser));
        }

        let config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={USER_AGENT}"))
            .build()
            .map_err(|e| SiteProfilerError::Browser(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SiteProfilerError::Browser(format!("browser launch failed: {e}")))?;

        // The CDP handler must be polled for the browser to make progress.
        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let shared = Arc::new(browser);
        *guard = Some(Arc::clone(&shared));
        Ok(shared)
    }

    /// Render a page: navigate, settle, sweep carousels, snapshot HTML.
    ///
    /// A timeout-classified failure is retried exactly once with a doubled
    /// timeout; any other failure, or a second timeout, is permanent.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn render(&self, url: &Url) -> std::result::Result<RawPage, RenderFailure> {
        let policy = RetryPolicy::new(2, self.opts.nav_timeout);
        retry::retry_timeouts(policy, |_, nav_timeout| self.render_once(url, nav_timeout)).await
    }

    async fn render_once(
        &self,
        url: &Url,
        nav_timeout: Duration,
    ) -> std::result::Result<RawPage, RenderFailure> {
        let browser = self.get_or_launch().await.map_err(|e| RenderFailure {
            url: url.clone(),
            kind: FailureKind::Browser,
            message: e.to_string(),
        })?;

        let page = browser.new_page("about:blank").await.map_err(|e| RenderFailure {
            url: url.clone(),
            kind: FailureKind::Browser,
            message: format!("new page: {e}"),
        })?;

        let result = self.drive(&page, url, nav_timeout).await;

        // Close the tab in all cases; a leak here starves later workers.
        if let Err(e) = page.close().await {
            debug!(%url, error = %e, "page close error");
        }

        result
    }

    /// The per-tab render sequence, separated so the tab is closed on every
    /// exit path of [`Renderer::render_once`].
    async fn drive(
        &self,
        page: &Page,
        url: &Url,
        nav_timeout: Duration,
    ) -> std::result::Result<RawPage, RenderFailure> {
        let fail = |kind: FailureKind, message: String| RenderFailure {
            url: url.clone(),
            kind,
            message,
        };

        // Block heavy resources before any navigation happens.
        page.execute(EnableParams::default())
            .await
            .map_err(|e| fail(FailureKind::Browser, format!("network enable: {e}")))?;
        let patterns: Vec<String> = BLOCKED_URL_PATTERNS.iter().map(|p| p.to_string()).collect();
        page.execute(SetBlockedUrLsParams::new(patterns))
            .await
            .map_err(|e| fail(FailureKind::Browser, format!("resource blocking: {e}")))?;

        // Navigation under the per-attempt timeout.
        let navigation = async {
            page.goto(url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(nav_timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(fail(FailureKind::Navigation, e.to_string())),
            Err(_) => {
                return Err(fail(
                    FailureKind::Timeout,
                    format!("navigation exceeded {nav_timeout:?}"),
                ));
            }
        }

        self.settle(page).await;

        let extra = carousel::sweep(page, self.opts.carousel_max_steps).await;

        let mut html = page.content().await.map_err(|e| {
            fail(FailureKind::Browser, format!("content snapshot: {e}"))
        })?;
        if !extra.is_empty() {
            html.push_str("\n<section data-accumulated>\n");
            for text in &extra {
                html.push_str(&escape_html(text));
                html.push('\n');
            }
            html.push_str("</section>\n");
        }

        let title = page.get_title().await.ok().flatten();

        Ok(RawPage {
            url: url.clone(),
            html,
            title,
        })
    }

    /// Wait until the visible text crosses the readiness threshold, or give
    /// up after the (shorter) settle ceiling. Not an error either way.
    async fn settle(&self, page: &Page) {
        let deadline = tokio::time::Instant::now() + self.opts.render_wait;
        loop {
            let len = page
                .evaluate("document.body ? document.body.innerText.length : 0")
                .await
                .ok()
                .and_then(|r| r.into_value::<u64>().ok())
                .unwrap_or(0);
            if len as usize >= self.opts.min_text_len {
                return;
            }
            if tokio::time::Instant::now() + SETTLE_POLL > deadline {
                debug!(visible_len = len, "settle wait elapsed below threshold");
                return;
            }
            tokio::time::sleep(SETTLE_POLL).await;
        }
    }
}

/// Minimal HTML escaping for the accumulated-text block.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
