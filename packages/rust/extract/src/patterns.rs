//! Compiled signal patterns: immutable configuration data built once and
//! injected into the extractor (and, for day tables, into the hour regex).

use regex::Regex;
use scraper::Selector;

/// Day names and abbreviations across the locales we commonly encounter
/// (English, German, French, Spanish). Used to anchor opening-hour phrases.
const DAY_NAMES: &[&str] = &[
    // English
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "mon", "tue", "tues", "wed", "thu", "thur", "thurs", "fri", "sat", "sun",
    // German
    "montag", "dienstag", "mittwoch", "donnerstag", "freitag", "samstag", "sonntag",
    "mo", "di", "mi", "fr", "sa", "so",
    // French
    "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
    // Spanish
    "lunes", "martes", "miercoles", "miércoles", "jueves", "viernes", "sabado",
    "sábado", "domingo",
];

/// Content containers tried in priority order before falling back to body.
const CONTENT_SELECTORS: &[&str] = &["main", "article", "[role='main']", "#content", ".content"];

/// Currency-tagged amount: symbol before or after the number.
const AMOUNT_PATTERN: &str =
    r"(?:[€$£]\s?\d{1,6}(?:[.,]\d{1,2})?|\d{1,6}(?:[.,]\d{1,2})?\s?(?:€|\$|£|CHF|EUR|USD))";

/// Everything the signal extractor needs, compiled once per crawl.
pub struct SignalPatterns {
    /// Prioritized content-container selectors.
    pub(crate) content_selectors: Vec<Selector>,
    /// Minimum text length for a container to qualify as main content.
    pub min_text_len: usize,
    /// Bound on the stored main text.
    pub max_text_len: usize,
    /// Currency-tagged amount, used per line together with a label lookbehind.
    pub(crate) amount: Regex,
    /// Country-code-aware phone candidate.
    pub(crate) phone: Regex,
    /// `dd.dd.dddd`-style dates that the phone pattern would otherwise eat.
    pub(crate) date_like: Regex,
    /// Standard email pattern.
    pub(crate) email: Regex,
    /// Day name or abbreviation followed by a time range.
    pub(crate) hours: Regex,
}

impl SignalPatterns {
    pub fn new(min_text_len: usize) -> Self {
        let day_alt = DAY_NAMES.join("|");
        // Day token, up to a short gap, then "9:00 - 18:00" / "9 bis 18" style ranges.
        let hours_pattern = format!(
            r"(?i)\b(?:{day_alt})\b[^\n]{{0,40}}?\d{{1,2}}(?:[:.]\d{{2}})?\s*(?:h)?\s*(?:-|–|—|to|bis|à|a)\s*\d{{1,2}}(?:[:.]\d{{2}})?\s*(?:h|uhr)?",
        );

        Self {
            content_selectors: CONTENT_SELECTORS
                .iter()
                .map(|s| Selector::parse(s).expect("static selector"))
                .collect(),
            min_text_len,
            max_text_len: 20_000,
            amount: Regex::new(AMOUNT_PATTERN).expect("static regex"),
            phone: Regex::new(
                r"(?:(?:\+|00)[1-9]\d{0,2}[\s./-]?)?(?:\(\d{1,5}\)|\d{2,5})(?:[\s./-]?\d{2,5}){2,5}",
            )
            .expect("static regex"),
            date_like: Regex::new(r"^\d{1,2}[./]\d{1,2}[./]\d{2,4}$").expect("static regex"),
            email: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                .expect("static regex"),
            hours: Regex::new(&hours_pattern).expect("static regex"),
        }
    }
}

impl Default for SignalPatterns {
    fn default() -> Self {
        Self::new(200)
    }
}
