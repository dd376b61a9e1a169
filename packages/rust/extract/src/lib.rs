//! Signal extraction: rendered HTML → structured [`Page`] record.
//!
//! The extractor applies a prioritized list of content-container selectors
//! and keeps the candidate with the most text above a quality threshold,
//! falling back to whole-body text. Independent regex passes then pull out
//! price mentions, phones, emails, and opening-hour phrases. Every pass is
//! non-fatal: zero matches simply yields an empty list, never an error.

pub mod patterns;

pub use patterns::SignalPatterns;

use std::collections::{BTreeSet, HashSet};

use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use siteprofiler_shared::types::{Page, PriceMention};
use siteprofiler_shared::urlnorm;

/// Extract structured signals from one rendered page.
pub fn extract(
    url: &Url,
    html: &str,
    title: Option<&str>,
    patterns: &SignalPatterns,
) -> Page {
    let doc = Html::parse_document(html);

    let body_text = body_visible_text(&doc);
    let main_text = main_content_text(&doc, patterns, &body_text);

    let prices = price_mentions(&body_text, patterns);
    let phones = phone_numbers(&body_text, patterns);
    let emails = email_addresses(&body_text, patterns);
    let hours = opening_hours(&body_text, patterns);
    let outbound_links = outbound_links(&doc, url);

    let title = title
        .map(str::to_string)
        .or_else(|| document_title(&doc))
        .filter(|t| !t.is_empty());

    debug!(
        url = %url,
        text_len = main_text.len(),
        prices = prices.len(),
        phones = phones.len(),
        hours = hours.len(),
        links = outbound_links.len(),
        "page extracted"
    );

    Page {
        url: url.clone(),
        title,
        main_text: truncate_chars(&main_text, patterns.max_text_len),
        prices,
        phones,
        emails,
        hours,
        outbound_links,
        content_hash: compute_hash(html),
        fetched_at: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Text extraction
// ---------------------------------------------------------------------------

/// Pick the content container with the most text at or above the quality
/// threshold; fall back to whole-body text when nothing qualifies.
fn main_content_text(doc: &Html, patterns: &SignalPatterns, body_text: &str) -> String {
    let mut best: Option<String> = None;
    for selector in &patterns.content_selectors {
        if let Some(el) = doc.select(selector).next() {
            let text = visible_text(el);
            if text.len() >= patterns.min_text_len
                && best.as_ref().is_none_or(|b| text.len() > b.len())
            {
                best = Some(text);
            }
        }
    }
    best.unwrap_or_else(|| body_text.to_string())
}

fn body_visible_text(doc: &Html) -> String {
    let body_sel = Selector::parse("body").expect("static selector");
    doc.select(&body_sel)
        .next()
        .map(visible_text)
        .unwrap_or_default()
}

/// Visible text of an element, one line per text node, with script/style
/// contents skipped and intra-line whitespace collapsed.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();
    for node in el.descendants() {
        if let Some(text) = node.value().as_text() {
            let parent = node
                .parent()
                .and_then(ElementRef::wrap)
                .map(|e| e.value().name().to_string());
            if matches!(
                parent.as_deref(),
                Some("script" | "style" | "noscript" | "template")
            ) {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(collapse_ws(trimmed));
            }
        }
    }
    lines.join("\n")
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn document_title(doc: &Html) -> Option<String> {
    let sel = Selector::parse("title").expect("static selector");
    doc.select(&sel)
        .next()
        .map(|el| collapse_ws(&el.text().collect::<String>()))
}

// ---------------------------------------------------------------------------
// Signal passes
// ---------------------------------------------------------------------------

/// Currency-tagged amounts, with the preceding label phrase on the same
/// line (if any) kept in `raw_text`.
fn price_mentions(text: &str, patterns: &SignalPatterns) -> Vec<PriceMention> {
    let mut out = Vec::new();
    for line in text.lines() {
        for m in patterns.amount.find_iter(line) {
            let amount_text = m.as_str().trim().to_string();
            let raw_text = match label_start(&line[..m.start()]) {
                Some(start) => collapse_ws(line[start..m.end()].trim()),
                None => amount_text.clone(),
            };
            out.push(PriceMention {
                raw_text,
                amount_text,
            });
        }
    }
    out
}

/// Byte offset where the label phrase preceding an amount begins, or `None`
/// when the prefix holds no usable label.
fn label_start(prefix: &str) -> Option<usize> {
    // Drop separator punctuation between label and amount ("Haircut – ", "Trim: ").
    let head_len = prefix
        .trim_end_matches(|c: char| {
            c.is_whitespace() || matches!(c, ':' | '-' | '–' | '—' | '…' | '*')
        })
        .len();
    if head_len == 0 {
        return None;
    }
    let head = &prefix[..head_len];

    // The label is whatever follows the last sentence/list separator.
    let start = head
        .char_indices()
        .rev()
        .find(|(_, c)| matches!(c, '.' | ',' | ';' | '|' | '•' | '·' | '(' | ')'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);

    let label = head[start..].trim_start();
    if label.is_empty() || !label.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    Some(head_len - label.len())
}

/// Country-code-aware phone candidates, filtered by digit count and a
/// date-shape guard.
fn phone_numbers(text: &str, patterns: &SignalPatterns) -> BTreeSet<String> {
    patterns
        .phone
        .find_iter(text)
        .map(|m| collapse_ws(m.as_str().trim()))
        .filter(|s| {
            let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
            (7..=15).contains(&digits)
                && !patterns.date_like.is_match(s)
                && (s.starts_with('+') || s.starts_with('0') || s.starts_with('('))
        })
        .collect()
}

fn email_addresses(text: &str, patterns: &SignalPatterns) -> BTreeSet<String> {
    patterns
        .email
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

/// Opening-hour phrases, deduplicated preserving first-seen order.
fn opening_hours(text: &str, patterns: &SignalPatterns) -> Vec<String> {
    let mut seen = HashSet::new();
    patterns
        .hours
        .find_iter(text)
        .map(|m| collapse_ws(m.as_str().trim()))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Outbound links: navigation-role containers first, then the rest of the
/// body, normalized and deduplicated preserving order. Navigation links are
/// likely higher-value, so they get priority when the frontier is trimmed.
fn outbound_links(doc: &Html, base: &Url) -> Vec<Url> {
    let nav_sel = Selector::parse("nav a[href], [role='navigation'] a[href], header a[href]")
        .expect("static selector");
    let all_sel = Selector::parse("a[href]").expect("static selector");

    let mut seen: HashSet<Url> = HashSet::new();
    let mut links = Vec::new();
    for el in doc.select(&nav_sel).chain(doc.select(&all_sel)) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if let Some(url) = urlnorm::normalize(href, Some(base)) {
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }
    }
    links
}

/// SHA-256 hash of content, for duplicate-content suppression.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
