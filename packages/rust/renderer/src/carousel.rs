//! Bounded best-effort carousel/pagination content accumulation.
//!
//! Many business sites hide price lists and product details behind sliders
//! or paginated widgets. Rather than scripting each widget, we run a bounded
//! state loop: trigger the first visible "next" affordance, wait, snapshot
//! the visible text, and deduplicate snapshots by exact text. The loop stops
//! as soon as no affordance is found or the iteration cap is reached.

use std::collections::HashSet;
use std::time::Duration;

use chromiumoxide::Page;
use tracing::debug;

/// Common slider/carousel/pagination "next" controls, most specific first.
const NEXT_AFFORDANCE_SELECTORS: &[&str] = &[
    ".swiper-button-next",
    ".slick-next",
    ".carousel-control-next",
    ".splide__arrow--next",
    ".owl-next",
    "[data-glide-dir='>']",
    "button[aria-label*='next' i]",
    "a[aria-label*='next' i]",
    "[rel='next']",
    ".pagination .next a",
    ".pagination a.next",
    "button.next",
];

/// Wait between an interaction and its text snapshot.
const STEP_WAIT: Duration = Duration::from_millis(400);

/// Click through next-affordances up to `max_steps` times, collecting
/// de-duplicated visible-text snapshots after each interaction.
///
/// Best-effort: any in-page scripting error ends the sweep with whatever
/// was accumulated so far.
pub(crate) async fn sweep(page: &Page, max_steps: u32) -> Vec<String> {
    let click_js = click_script();

    let mut seen: HashSet<String> = HashSet::new();
    let mut accumulated: Vec<String> = Vec::new();

    // The pre-interaction text is already in the page HTML; seed the dedup
    // set with it so only newly revealed content is accumulated.
    if let Some(initial) = snapshot_text(page).await {
        seen.insert(initial);
    }

    for step in 0..max_steps {
        let clicked = match page.evaluate(click_js.clone()).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(e) => {
                debug!(step, error = %e, "carousel interaction failed, stopping sweep");
                break;
            }
        };
        if !clicked {
            break;
        }

        tokio::time::sleep(STEP_WAIT).await;

        let Some(text) = snapshot_text(page).await else {
            break;
        };
        if seen.insert(text.clone()) {
            accumulated.push(text);
        }
    }

    if !accumulated.is_empty() {
        debug!(snapshots = accumulated.len(), "carousel sweep accumulated content");
    }
    accumulated
}

/// Visible text of the whole page, or `None` when evaluation fails.
async fn snapshot_text(page: &Page) -> Option<String> {
    page.evaluate("document.body ? document.body.innerText : ''")
        .await
        .ok()?
        .into_value::<String>()
        .ok()
}

/// JS that clicks the first visible, enabled next-affordance and reports
/// whether anything was clicked.
fn click_script() -> String {
    let selectors = serde_json::to_string(NEXT_AFFORDANCE_SELECTORS)
        .unwrap_or_else(|_| "[]".into());
    format!(
        r#"(function(selectors) {{
            for (const sel of selectors) {{
                let el;
                try {{ el = document.querySelector(sel); }} catch (e) {{ continue; }}
                if (el && el.offsetParent !== null && !el.disabled) {{
                    el.click();
                    return true;
                }}
            }}
            return false;
        }})({selectors})"#
    )
}
