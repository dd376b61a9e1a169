//! Frontier filtering and prioritization.
//!
//! Ignore patterns and priority patterns are plain URL substrings injected
//! from configuration; they are matched case-insensitively against the full
//! URL string.

use url::Url;

/// True when the URL matches any of the given substrings.
pub(crate) fn matches_any(url: &Url, patterns: &[String]) -> bool {
    let haystack = url.as_str().to_ascii_lowercase();
    patterns
        .iter()
        .any(|p| !p.is_empty() && haystack.contains(&p.to_ascii_lowercase()))
}

/// Stable partition: URLs matching a priority pattern first, original order
/// preserved within both groups.
pub(crate) fn prioritize(urls: Vec<Url>, priority_patterns: &[String]) -> Vec<Url> {
    let (mut high, low): (Vec<Url>, Vec<Url>) = urls
        .into_iter()
        .partition(|u| matches_any(u, priority_patterns));
    high.extend(low);
    high
}
