//! LLM-based profile extraction via an OpenRouter-compatible endpoint.
//!
//! One prompt, one chat-completion request, one draft. Every failure mode
//! (HTTP error, timeout, malformed JSON) degrades to `None` with a warning;
//! the pipeline then proceeds with the pattern draft alone.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use siteprofiler_shared::config::OpenRouterConfig;
use siteprofiler_shared::types::{BusinessProfileDraft, Page};

/// Request timeout for the single extraction call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const SYSTEM_PROMPT: &str = "\
You extract structured business information from website text. \
Respond with a single JSON object and nothing else, using exactly these keys:\n\
{\n\
  \"name\": string or null,\n\
  \"address\": string or null,\n\
  \"phone\": string or null,\n\
  \"email\": string or null,\n\
  \"hours\": [string],\n\
  \"services\": [{\"name\": string, \"price\": string or null, \"category\": string or null}],\n\
  \"staff\": [{\"name\": string, \"role\": string or null}],\n\
  \"about\": string or null,\n\
  \"benefits\": string or null,\n\
  \"faq\": string or null\n\
}\n\
Use null for anything the text does not state. Keep prices exactly as \
written, including the currency marker. Do not invent services or staff.";

/// Minimal shape of a chat-completions response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// One-shot structured extractor. Construct only when an API key is
/// available; key resolution from the environment is the caller's job.
pub struct LlmExtractor {
    client: reqwest::Client,
    config: OpenRouterConfig,
    api_key: String,
}

impl LlmExtractor {
    pub fn new(config: OpenRouterConfig, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key,
        }
    }

    /// Ask the model for a profile draft. `None` on any failure.
    #[instrument(skip_all, fields(model = %self.config.default_model, pages = pages.len()))]
    pub async fn extract(&self, pages: &[Page]) -> Option<BusinessProfileDraft> {
        if pages.is_empty() {
            return None;
        }

        let prompt = build_prompt(pages, self.config.char_budget);
        debug!(prompt_chars = prompt.chars().count(), "sending extraction request");

        let body = json!({
            "model": self.config.default_model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.0,
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = match self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "LLM request failed, continuing pattern-only");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "LLM endpoint returned an error, continuing pattern-only");
            return None;
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "unparseable LLM response envelope, continuing pattern-only");
                return None;
            }
        };

        let content = parsed.choices.first().map(|c| c.message.content.as_str())?;
        match serde_json::from_str::<BusinessProfileDraft>(strip_fences(content)) {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!(error = %e, "LLM emitted invalid draft JSON, continuing pattern-only");
                None
            }
        }
    }
}

/// Concatenate page blocks, richest pages first, up to `char_budget`
/// characters. The page that would overflow the remaining budget is
/// truncated rather than skipped, to preserve breadth.
fn build_prompt(pages: &[Page], char_budget: usize) -> String {
    let mut ordered: Vec<&Page> = pages.iter().collect();
    ordered.sort_by(|a, b| b.main_text.len().cmp(&a.main_text.len()));

    let mut prompt = String::new();
    let mut remaining = char_budget;
    for page in ordered {
        if remaining == 0 {
            break;
        }
        let block = page_block(page);
        let len = block.chars().count();
        if len <= remaining {
            prompt.push_str(&block);
            remaining -= len;
        } else {
            prompt.extend(block.chars().take(remaining));
            prompt.push('\n');
            remaining = 0;
        }
    }
    prompt
}

fn page_block(page: &Page) -> String {
    let mut block = format!("## {}\n", page.url);
    if let Some(title) = &page.title {
        block.push_str(&format!("Title: {title}\n"));
    }
    if !page.hours.is_empty() {
        block.push_str(&format!("Hours found: {}\n", page.hours.join("; ")));
    }
    if !page.prices.is_empty() {
        let mentions: Vec<&str> = page.prices.iter().map(|m| m.raw_text.as_str()).collect();
        block.push_str(&format!("Price mentions: {}\n", mentions.join("; ")));
    }
    block.push_str(&page.main_text);
    block.push_str("\n\n");
    block
}

/// Some models wrap the JSON object in a markdown code fence despite the
/// json_object response format.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(url: &str, text: &str) -> Page {
        Page {
            url: Url::parse(url).unwrap(),
            title: None,
            main_text: text.to_string(),
            prices: vec![],
            phones: BTreeSet::new(),
            emails: BTreeSet::new(),
            hours: vec![],
            outbound_links: vec![],
            content_hash: url.to_string(),
            fetched_at: chrono::Utc::now(),
        }
    }

    fn extractor(base_url: &str) -> LlmExtractor {
        let mut config = OpenRouterConfig::default();
        config.base_url = base_url.to_string();
        LlmExtractor::new(config, "test-key".into())
    }

    fn chat_body(content: &str) -> serde_json::Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    #[tokio::test]
    async fn well_formed_response_becomes_a_draft() {
        let server = MockServer::start().await;
        let draft_json = r#"{"name": "Corner Barbershop", "services": [{"name": "Haircut", "price": "20€"}]}"#;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(draft_json)))
            .mount(&server)
            .await;

        let pages = vec![page("https://example.com", "Haircut – 20€")];
        let draft = extractor(&server.uri()).extract(&pages).await.unwrap();
        assert_eq!(draft.name.as_deref(), Some("Corner Barbershop"));
        assert_eq!(draft.services[0].price.as_deref(), Some("20€"));
    }

    #[tokio::test]
    async fn fenced_json_is_unwrapped() {
        let server = MockServer::start().await;
        let content = "```json\n{\"name\": \"Corner Barbershop\"}\n```";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(content)))
            .mount(&server)
            .await;

        let pages = vec![page("https://example.com", "hello")];
        let draft = extractor(&server.uri()).extract(&pages).await.unwrap();
        assert_eq!(draft.name.as_deref(), Some("Corner Barbershop"));
    }

    #[tokio::test]
    async fn http_error_degrades_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let pages = vec![page("https://example.com", "hello")];
        assert!(extractor(&server.uri()).extract(&pages).await.is_none());
    }

    #[tokio::test]
    async fn invalid_draft_json_degrades_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("not json at all")))
            .mount(&server)
            .await;

        let pages = vec![page("https://example.com", "hello")];
        assert!(extractor(&server.uri()).extract(&pages).await.is_none());
    }

    #[tokio::test]
    async fn no_pages_means_no_request() {
        // An unreachable base URL would fail the test if a request went out.
        let extractor = extractor("http://127.0.0.1:1");
        assert!(extractor.extract(&[]).await.is_none());
    }

    #[test]
    fn prompt_orders_pages_richest_first() {
        let pages = vec![
            page("https://example.com/thin", "short"),
            page("https://example.com/rich", &"detail ".repeat(50)),
        ];
        let prompt = build_prompt(&pages, 10_000);
        let rich_pos = prompt.find("/rich").unwrap();
        let thin_pos = prompt.find("/thin").unwrap();
        assert!(rich_pos < thin_pos);
    }

    #[test]
    fn overflowing_page_is_truncated_not_skipped() {
        let pages = vec![
            page("https://example.com/a", &"a".repeat(200)),
            page("https://example.com/b", &"b".repeat(200)),
        ];
        let prompt = build_prompt(&pages, 280);
        assert!(prompt.chars().count() <= 281);
        // Both pages contribute despite the budget cutting the second short.
        assert!(prompt.contains("/a"));
        assert!(prompt.contains("/b"));
    }
}
