//! URL normalization and origin comparison.
//!
//! Every other component deduplicates and compares URLs through this module,
//! so the rules here define the crawl's identity of a page: no fragment, no
//! tracking parameters, lowercase host, no default port, no trailing slash
//! on non-root paths. Normalizing an already-normalized URL is a no-op.

use url::Url;

/// Query parameters stripped during normalization. Two URLs differing only
/// in these must normalize identically.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "igshid",
    "ref",
];

/// Normalize a URL, optionally resolving it against `base` first.
///
/// Returns `None` on malformed input or non-http(s) schemes. Pure function;
/// normalizing twice yields the same value.
pub fn normalize(raw: &str, base: Option<&Url>) -> Option<Url> {
    let mut url = match base {
        Some(base) => base.join(raw.trim()).ok()?,
        None => Url::parse(raw.trim()).ok()?,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;

    url.set_fragment(None);

    // Hosts are case-insensitive; paths are not.
    let host = url.host_str()?.to_ascii_lowercase();
    url.set_host(Some(&host)).ok()?;

    // `Url` already omits default ports on serialization, but an explicit
    // `:80`/`:443` still compares unequal, so clear it.
    if url.port() == Some(default_port(url.scheme())) {
        url.set_port(None).ok()?;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        // `query_pairs` percent-decodes, so the kept pairs must be
        // re-encoded; joining them raw would turn an encoded separator
        // inside a value into a structural one.
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.extend_pairs(&kept);
        url.set_query(Some(&serializer.finish()));
    }

    // Trailing slash is not significant except for the root path.
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url)
}

/// Compare scheme + host only.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str().unwrap_or("") == b.host_str().unwrap_or("")
}

fn default_port(scheme: &str) -> u16 {
    if scheme == "https" { 443 } else { 80 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "https://Example.com/Pricing/?utm_source=x&page=2#top",
            "http://example.com:80/",
            "https://example.com/a/b/",
            "https://example.com/?ref=partner",
        ];
        for raw in inputs {
            let once = normalize(raw, None).expect("first pass");
            let twice = normalize(once.as_str(), None).expect("second pass");
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn fragment_and_tracking_params_do_not_distinguish_urls() {
        let a = normalize("https://example.com/pricing?utm_campaign=spring", None).unwrap();
        let b = normalize("https://example.com/pricing#plans", None).unwrap();
        let c = normalize("https://example.com/pricing", None).unwrap();
        assert_eq!(a, c);
        assert_eq!(b, c);
    }

    #[test]
    fn meaningful_query_params_survive() {
        let url = normalize("https://example.com/shop?category=hair&utm_source=fb", None).unwrap();
        assert_eq!(url.query(), Some("category=hair"));
    }

    #[test]
    fn encoded_separator_inside_a_value_stays_encoded() {
        let url = normalize("https://example.com/search?q=a%26b", None).unwrap();
        assert_eq!(url.query(), Some("q=a%26b"));
        // Still one parameter, still idempotent.
        let twice = normalize(url.as_str(), None).unwrap();
        assert_eq!(url, twice);
    }

    #[test]
    fn relative_links_resolve_against_base() {
        let base = Url::parse("https://example.com/services/list").unwrap();
        let url = normalize("../team", Some(&base)).unwrap();
        assert_eq!(url.as_str(), "https://example.com/team");
    }

    #[test]
    fn malformed_and_non_http_inputs_are_rejected() {
        assert!(normalize("not a url", None).is_none());
        assert!(normalize("mailto:info@example.com", None).is_none());
        assert!(normalize("javascript:void(0)", None).is_none());
        assert!(normalize("ftp://example.com/file", None).is_none());
    }

    #[test]
    fn host_case_and_default_port_fold() {
        let a = normalize("https://EXAMPLE.com:443/about", None).unwrap();
        let b = normalize("https://example.com/about", None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn same_origin_compares_scheme_and_host_only() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("https://example.com/b?x=1").unwrap();
        let c = Url::parse("http://example.com/a").unwrap();
        let d = Url::parse("https://other.com/a").unwrap();
        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
        assert!(!same_origin(&a, &d));
    }
}
