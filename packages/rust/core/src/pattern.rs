//! Deterministic profile draft from collected pages.
//!
//! No network, no model calls: everything here is derivable from the
//! [`Page`] signals alone, so this pass always succeeds and the pipeline
//! can fall back to it when the LLM pass fails. Completeness is preferred
//! over brevity — no service or staff count cap is applied here.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use siteprofiler_shared::types::{BusinessProfileDraft, Page, ServiceEntry, StaffEntry};

/// Weekday tokens (lowercased) used to sort opening-hours lines that start
/// with a day ahead of vaguer phrasings.
const WEEKDAY_PREFIXES: &[&str] = &[
    "mon", "tue", "wed", "thu", "fri", "sat", "sun",
    "mo", "di", "mi", "do", "fr", "sa", "so",
    "lun", "mar", "mer", "jeu", "ven", "sam", "dim",
    "mie", "mié", "jue", "vie", "sab", "sáb", "dom",
];

/// Street markers for the address line heuristic.
const STREET_KEYWORDS: &[&str] = &[
    "straße", "strasse", "str.", "street", "avenue", "ave.", "road", "rd.",
    "platz", "weg", "gasse", "allee", "lane", "boulevard", "blvd",
];

/// `"Jane Doe — Master Barber"` style lines: a capitalized two-or-three
/// word name, a dash, then a short role phrase.
static STAFF_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\p{Lu}[\p{L}'’.-]+(?:\s+\p{Lu}[\p{L}'’.-]+){1,2})\s*[–—-]\s*(\p{L}[\p{L} &/'’.-]{2,39})$",
    )
    .expect("static regex")
});

/// Bound on the free-text excerpt taken from the richest page.
const EXCERPT_MAX_CHARS: usize = 600;

/// Build the pattern-derived draft from all collected pages.
pub fn normalize(pages: &[Page]) -> BusinessProfileDraft {
    let draft = BusinessProfileDraft {
        name: business_name(pages),
        address: address(pages),
        phone: phone(pages),
        email: email(pages),
        hours: hours(pages),
        services: services(pages),
        staff: staff(pages),
        free_text_excerpt: excerpt(pages),
        about: None,
        benefits: None,
        faq: None,
    };
    debug!(
        services = draft.services.len(),
        staff = draft.staff.len(),
        hours = draft.hours.len(),
        "pattern draft built"
    );
    draft
}

// ---------------------------------------------------------------------------
// Field heuristics
// ---------------------------------------------------------------------------

/// The brand is the title segment repeated across pages ("Pricing | Corner
/// Barbershop", "Team | Corner Barbershop"). Ties break toward the segment
/// seen first; with no usable titles, fall back to a cleaned host label.
fn business_name(pages: &[Page]) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for page in pages {
        let Some(title) = &page.title else { continue };
        for segment in title.split(['|', '–', '—']).flat_map(|s| s.split(" - ")) {
            let segment = segment.trim();
            if segment.chars().count() < 3 || segment.chars().count() > 60 {
                continue;
            }
            let entry = counts.entry(segment.to_string()).or_insert(0);
            if *entry == 0 {
                order.push(segment.to_string());
            }
            *entry += 1;
        }
    }

    most_frequent(order, |segment| counts[segment.as_str()])
        .or_else(|| pages.first().and_then(|p| host_label(p)))
}

fn host_label(page: &Page) -> Option<String> {
    let host = page.url.host_str()?;
    let label = host.strip_prefix("www.").unwrap_or(host);
    let label = label.split('.').next()?;
    if label.is_empty() {
        return None;
    }
    Some(
        label
            .split('-')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// First line containing a street keyword and a house number.
fn address(pages: &[Page]) -> Option<String> {
    for page in pages {
        for line in page.main_text.lines() {
            let line = line.trim();
            if line.is_empty() || line.chars().count() > 120 {
                continue;
            }
            let lower = line.to_lowercase();
            if STREET_KEYWORDS.iter().any(|kw| lower.contains(kw))
                && line.chars().any(|c| c.is_ascii_digit())
            {
                return Some(line.to_string());
            }
        }
    }
    None
}

/// The number repeated most often across pages is most likely the main
/// line; ties break toward the first one seen.
fn phone(pages: &[Page]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for page in pages {
        for number in &page.phones {
            let entry = counts.entry(number.as_str()).or_insert(0);
            if *entry == 0 {
                order.push(number.as_str());
            }
            *entry += 1;
        }
    }

    most_frequent(order, |number| counts[number]).map(str::to_string)
}

/// First-seen element with the highest count (`max_by_key` would break
/// ties toward the last).
fn most_frequent<T, F: Fn(&T) -> usize>(order: Vec<T>, count: F) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    for item in order {
        let n = count(&item);
        if best.as_ref().is_none_or(|(_, m)| n > *m) {
            best = Some((item, n));
        }
    }
    best.map(|(item, _)| item)
}

fn email(pages: &[Page]) -> Option<String> {
    pages
        .iter()
        .flat_map(|page| page.emails.iter())
        .next()
        .cloned()
}

/// Deduplicated hours lines, weekday-first entries sorted ahead (stable).
fn hours(pages: &[Page]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut lines: Vec<String> = Vec::new();
    for page in pages {
        for line in &page.hours {
            if seen.insert(line.to_lowercase()) {
                lines.push(line.clone());
            }
        }
    }

    let (mut weekday_first, rest): (Vec<String>, Vec<String>) =
        lines.into_iter().partition(|line| starts_with_weekday(line));
    weekday_first.extend(rest);
    weekday_first
}

fn starts_with_weekday(line: &str) -> bool {
    let lower = line.trim_start().to_lowercase();
    WEEKDAY_PREFIXES.iter().any(|day| lower.starts_with(day))
}

/// One service per price mention: the label phrase becomes the name, the
/// amount becomes the price. Deduplicated by lowercased trimmed name, first
/// mention wins.
fn services(pages: &[Page]) -> Vec<ServiceEntry> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut services: Vec<ServiceEntry> = Vec::new();

    for page in pages {
        for mention in &page.prices {
            let Some(name) = service_name(&mention.raw_text, &mention.amount_text) else {
                continue;
            };
            if !seen.insert(name.to_lowercase()) {
                continue;
            }
            services.push(ServiceEntry {
                name,
                price: Some(mention.amount_text.clone()),
                category: None,
            });
        }
    }
    services
}

/// Strip the amount from the mention and trim label separators.
fn service_name(raw_text: &str, amount_text: &str) -> Option<String> {
    let label = raw_text.replacen(amount_text, "", 1);
    let label = label
        .trim()
        .trim_matches(|c: char| matches!(c, ':' | '-' | '–' | '—' | '…' | '*' | '.' | ','))
        .trim();
    if label.chars().any(|c| c.is_alphabetic()) {
        Some(label.to_string())
    } else {
        None
    }
}

/// Staff from "Name — Role" lines, deduplicated by lowercased surname.
fn staff(pages: &[Page]) -> Vec<StaffEntry> {
    let mut seen_surnames: HashSet<String> = HashSet::new();
    let mut staff: Vec<StaffEntry> = Vec::new();

    for page in pages {
        for line in page.main_text.lines() {
            let Some(captures) = STAFF_LINE.captures(line.trim()) else {
                continue;
            };
            let name = captures[1].trim().to_string();
            let role = captures[2].trim().to_string();
            if role.chars().any(|c| c.is_ascii_digit()) {
                continue;
            }
            let Some(surname) = name.split_whitespace().last() else {
                continue;
            };
            if !seen_surnames.insert(surname.to_lowercase()) {
                continue;
            }
            staff.push(StaffEntry {
                name,
                role: Some(role),
            });
        }
    }
    staff
}

/// Opening text of the page with the most content, bounded.
fn excerpt(pages: &[Page]) -> Option<String> {
    let richest = pages.iter().max_by_key(|page| page.main_text.len())?;
    let text = richest.main_text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(EXCERPT_MAX_CHARS).collect())
}
