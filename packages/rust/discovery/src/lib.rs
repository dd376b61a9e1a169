//! Sitemap discovery: optional seed-link source for the crawl frontier.
//!
//! Before crawling, SiteProfiler checks the site's robots.txt for sitemap
//! references and falls back to the two conventional sitemap paths. Sitemap
//! indexes are expanded recursively up to a hard URL cap. Discovery is
//! best-effort: any individual fetch or parse failure is swallowed, and a
//! total failure yields an empty seed list — the crawl proceeds from the
//! start URL alone.

use std::collections::HashSet;
use std::io::Cursor;

use reqwest::Client;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use tracing::{debug, info, instrument};
use url::Url;

use siteprofiler_shared::urlnorm;

/// Default timeout in seconds for discovery requests.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default hard cap on discovered URLs, guarding against huge or malicious
/// sitemap trees.
const DEFAULT_MAX_URLS: usize = 500;

/// Conventional sitemap locations probed when robots.txt names none.
const FALLBACK_SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("SiteProfiler/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for the discovery process.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
    /// Hard cap on the number of URLs returned.
    pub max_urls: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_urls: DEFAULT_MAX_URLS,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Discover same-origin page URLs from the site's sitemaps.
///
/// Reads `<origin>/robots.txt` for `Sitemap:` references; when none are
/// found, probes the conventional sitemap paths. Never fails: all errors
/// degrade to an empty (or shorter) result.
#[instrument(skip_all, fields(url = %start))]
pub async fn discover(start: &Url, opts: &DiscoveryOptions) -> Vec<Url> {
    let Some(origin) = origin_url(start) else {
        debug!("start URL has no host, skipping discovery");
        return Vec::new();
    };

    let client = match build_client(opts) {
        Ok(client) => client,
        Err(e) => {
            debug!(error = %e, "could not build discovery client");
            return Vec::new();
        }
    };

    let mut sitemap_urls = sitemaps_from_robots(&client, &origin).await;
    if sitemap_urls.is_empty() {
        sitemap_urls = FALLBACK_SITEMAP_PATHS
            .iter()
            .map(|path| format!("{origin}{path}"))
            .collect();
    }

    let mut collected: Vec<String> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    for sitemap_url in &sitemap_urls {
        if collected.len() >= opts.max_urls {
            break;
        }
        collect_sitemap_urls(&client, sitemap_url, opts.max_urls, &mut collected, &mut visited)
            .await;
    }

    // Normalize, keep same-origin pages only, and deduplicate in order.
    let mut seen: HashSet<Url> = HashSet::new();
    let seeds: Vec<Url> = collected
        .iter()
        .filter_map(|raw| urlnorm::normalize(raw, None))
        .filter(|u| urlnorm::same_origin(u, start))
        .filter(|u| seen.insert(u.clone()))
        .collect();

    info!(
        sitemaps = sitemap_urls.len(),
        seeds = seeds.len(),
        "sitemap discovery finished"
    );
    seeds
}

// ---------------------------------------------------------------------------
// robots.txt
// ---------------------------------------------------------------------------

/// Extract `Sitemap:` references from the site's robots.txt.
async fn sitemaps_from_robots(client: &Client, origin: &str) -> Vec<String> {
    let robots_url = format!("{origin}/robots.txt");
    let body = match fetch_text(client, &robots_url).await {
        Some(body) => body,
        None => {
            debug!(%robots_url, "robots.txt unavailable");
            return Vec::new();
        }
    };

    body.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("sitemap") {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sitemap expansion
// ---------------------------------------------------------------------------

/// Recursively expand a sitemap (or sitemap index) into page URLs.
///
/// Bounded by `limit` and guarded against cycles via `visited`.
async fn collect_sitemap_urls(
    client: &Client,
    url: &str,
    limit: usize,
    collected: &mut Vec<String>,
    visited: &mut HashSet<String>,
) {
    if collected.len() >= limit || !visited.insert(url.to_string()) {
        return;
    }

    let Some(body) = fetch_text(client, url).await else {
        debug!(%url, "sitemap fetch failed");
        return;
    };

    let cursor = Cursor::new(body.into_bytes());
    let parser = SiteMapReader::new(cursor);
    let mut child_sitemaps = Vec::new();

    for entity in parser {
        if collected.len() >= limit {
            break;
        }
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(loc) = entry.loc.get_url() {
                    collected.push(loc.to_string());
                }
            }
            SiteMapEntity::SiteMap(index_entry) => {
                if let Some(loc) = index_entry.loc.get_url() {
                    child_sitemaps.push(loc.to_string());
                }
            }
            SiteMapEntity::Err(_) => {}
        }
    }

    for child in child_sitemaps {
        if collected.len() >= limit {
            break;
        }
        Box::pin(collect_sitemap_urls(client, &child, limit, collected, visited)).await;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the origin (scheme + host + port) from a URL.
fn origin_url(url: &Url) -> Option<String> {
    let scheme = url.scheme();
    let host = url.host_str()?;

    match url.port() {
        Some(port) => Some(format!("{scheme}://{host}:{port}")),
        None => Some(format!("{scheme}://{host}")),
    }
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &DiscoveryOptions) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(3))
        .timeout(std::time::Duration::from_secs(opts.timeout_secs))
        .build()
}

/// Fetch a URL body as text; `None` on any failure or non-2xx status.
async fn fetch_text(client: &Client, url: &str) -> Option<String> {
    let response = client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urlset(urls: &[&str]) -> String {
        let entries: String = urls
            .iter()
            .map(|u| format!("<url><loc>{u}</loc></url>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
        )
    }

    fn sitemap_index(sitemaps: &[&str]) -> String {
        let entries: String = sitemaps
            .iter()
            .map(|u| format!("<sitemap><loc>{u}</loc></sitemap>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#
        )
    }

    #[test]
    fn origin_url_with_and_without_port() {
        let url = Url::parse("https://shop.example.com/foo/bar").unwrap();
        assert_eq!(origin_url(&url).unwrap(), "https://shop.example.com");

        let url = Url::parse("http://localhost:3000/docs").unwrap();
        assert_eq!(origin_url(&url).unwrap(), "http://localhost:3000");
    }

    #[tokio::test]
    async fn robots_sitemap_reference_is_followed() {
        let server = wiremock::MockServer::start().await;
        let base = server.uri();

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(format!(
                "User-agent: *\nDisallow: /admin\nSitemap: {base}/custom-sitemap.xml\n"
            )))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/custom-sitemap.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(urlset(&[
                &format!("{base}/pricing"),
                &format!("{base}/team"),
            ])))
            .mount(&server)
            .await;

        let start = Url::parse(&base).unwrap();
        let seeds = discover(&start, &DiscoveryOptions::default()).await;

        assert_eq!(seeds.len(), 2);
        assert!(seeds.iter().any(|u| u.path() == "/pricing"));
        assert!(seeds.iter().any(|u| u.path() == "/team"));
    }

    #[tokio::test]
    async fn conventional_paths_probed_when_robots_is_silent() {
        let server = wiremock::MockServer::start().await;
        let base = server.uri();

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap.xml"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string(urlset(&[&format!("{base}/services")])),
            )
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap_index.xml"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let start = Url::parse(&base).unwrap();
        let seeds = discover(&start, &DiscoveryOptions::default()).await;

        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].path(), "/services");
    }

    #[tokio::test]
    async fn total_failure_yields_empty_list() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let start = Url::parse(&server.uri()).unwrap();
        let seeds = discover(&start, &DiscoveryOptions::default()).await;

        assert!(seeds.is_empty());
    }

    #[tokio::test]
    async fn sitemap_index_expands_recursively_and_respects_cap() {
        let server = wiremock::MockServer::start().await;
        let base = server.uri();

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(sitemap_index(&[
                &format!("{base}/sitemap-a.xml"),
                &format!("{base}/sitemap-b.xml"),
            ])))
            .mount(&server)
            .await;

        let a_urls: Vec<String> = (0..5).map(|i| format!("{base}/a/{i}")).collect();
        let a_refs: Vec<&str> = a_urls.iter().map(|s| s.as_str()).collect();
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap-a.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(urlset(&a_refs)))
            .mount(&server)
            .await;

        let b_urls: Vec<String> = (0..5).map(|i| format!("{base}/b/{i}")).collect();
        let b_refs: Vec<&str> = b_urls.iter().map(|s| s.as_str()).collect();
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap-b.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(urlset(&b_refs)))
            .mount(&server)
            .await;

        let start = Url::parse(&base).unwrap();
        let opts = DiscoveryOptions {
            max_urls: 6,
            ..Default::default()
        };
        let seeds = discover(&start, &opts).await;

        // Hard cap cuts the second child sitemap short.
        assert_eq!(seeds.len(), 6);
    }

    #[tokio::test]
    async fn cross_origin_sitemap_entries_are_dropped() {
        let server = wiremock::MockServer::start().await;
        let base = server.uri();

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(urlset(&[
                &format!("{base}/local"),
                "https://other.example.com/foreign",
            ])))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap_index.xml"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let start = Url::parse(&base).unwrap();
        let seeds = discover(&start, &DiscoveryOptions::default()).await;

        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].path(), "/local");
    }
}
