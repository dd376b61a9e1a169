//! Application configuration for SiteProfiler.
//!
//! User config lives at `~/.siteprofiler/siteprofiler.toml`.
//! Environment variables override config file values, which override
//! defaults. The pattern tables here (ignore/priority keywords) are loaded
//! once and injected into the crawl controller at construction time.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteProfilerError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "siteprofiler.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".siteprofiler";

// ---------------------------------------------------------------------------
// Config structs (matching siteprofiler.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Headless renderer settings.
    #[serde(default)]
    pub renderer: RendererConfig,

    /// OpenRouter settings for the LLM extraction pass.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Frontier filtering and prioritization.
    #[serde(default)]
    pub crawl_policies: CrawlPoliciesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Maximum link-hops from the start URL.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum successfully collected pages per crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Concurrent render workers.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_max_depth() -> u32 {
    2
}
fn default_max_pages() -> usize {
    25
}
fn default_concurrency() -> u32 {
    4
}

/// `[renderer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Navigation timeout in milliseconds (doubled on the single retry).
    #[serde(default = "default_nav_timeout_ms")]
    pub nav_timeout_ms: u64,

    /// Dynamic-content settle wait ceiling in milliseconds.
    #[serde(default = "default_render_wait_ms")]
    pub render_wait_ms: u64,

    /// Visible-text length considered "ready" during the settle wait.
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,

    /// Upper bound on carousel/pagination interactions per page.
    #[serde(default = "default_carousel_max_steps")]
    pub carousel_max_steps: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            nav_timeout_ms: default_nav_timeout_ms(),
            render_wait_ms: default_render_wait_ms(),
            min_text_len: default_min_text_len(),
            carousel_max_steps: default_carousel_max_steps(),
        }
    }
}

fn default_nav_timeout_ms() -> u64 {
    15_000
}
fn default_render_wait_ms() -> u64 {
    3_000
}
fn default_min_text_len() -> usize {
    200
}
fn default_carousel_max_steps() -> u32 {
    8
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model to use for structured extraction.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Chat-completions endpoint base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Total character budget for the extraction prompt.
    #[serde(default = "default_char_budget")]
    pub char_budget: usize,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            char_budget: default_char_budget(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_char_budget() -> usize {
    48_000
}

/// `[crawl_policies]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// URL substrings that exclude a candidate from the frontier.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// URL substrings that sort a candidate ahead of others.
    #[serde(default = "default_priority_patterns")]
    pub priority_patterns: Vec<String>,
}

impl Default for CrawlPoliciesConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            priority_patterns: default_priority_patterns(),
        }
    }
}

fn default_ignore_patterns() -> Vec<String> {
    [
        "/login", "/signin", "/cart", "/checkout", "/wp-admin", "/wp-login",
        "/privacy", "/datenschutz", "/terms", "/agb", "/cookie",
        ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".zip",
        ".mp4", ".mp3", ".ico", ".css", ".js",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_priority_patterns() -> Vec<String> {
    [
        "pricing", "price", "preise", "prix", "precio", "tarif", "kosten",
        "contact", "kontakt", "contacto",
        "team", "staff", "about", "ueber", "uber-uns",
        "service", "leistung", "angebot", "treatment", "menu",
        "product", "produkt", "model", "shop",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config + env + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration — merged from config file, environment
/// overrides, and CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum crawl depth from the start URL.
    pub max_depth: u32,
    /// Maximum successfully collected pages.
    pub max_pages: usize,
    /// Concurrent render workers.
    pub concurrency: u32,
    /// Navigation timeout in milliseconds.
    pub nav_timeout_ms: u64,
    /// Settle wait ceiling in milliseconds.
    pub render_wait_ms: u64,
    /// Visible-text readiness threshold.
    pub min_text_len: usize,
    /// Carousel interaction cap.
    pub carousel_max_steps: u32,
    /// URL substrings excluded from the frontier.
    pub ignore_patterns: Vec<String>,
    /// URL substrings sorted ahead in the frontier.
    pub priority_patterns: Vec<String>,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_depth: config.defaults.max_depth,
            max_pages: config.defaults.max_pages,
            concurrency: config.defaults.concurrency,
            nav_timeout_ms: config.renderer.nav_timeout_ms,
            render_wait_ms: config.renderer.render_wait_ms,
            min_text_len: config.renderer.min_text_len,
            carousel_max_steps: config.renderer.carousel_max_steps,
            ignore_patterns: config.crawl_policies.ignore_patterns.clone(),
            priority_patterns: config.crawl_policies.priority_patterns.clone(),
        }
    }
}

impl CrawlConfig {
    /// Apply `SITEPROFILER_*` environment overrides for the runtime knobs.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<u32>("SITEPROFILER_CONCURRENCY") {
            self.concurrency = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("SITEPROFILER_NAV_TIMEOUT_MS") {
            self.nav_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u64>("SITEPROFILER_RENDER_WAIT_MS") {
            self.render_wait_ms = v;
        }
        if let Some(v) = env_parse::<usize>("SITEPROFILER_MAX_PAGES") {
            self.max_pages = v;
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.siteprofiler/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteProfilerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.siteprofiler/siteprofiler.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteProfilerError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SiteProfilerError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteProfilerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteProfilerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteProfilerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(SiteProfilerError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("nav_timeout_ms"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_depth, 2);
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.openrouter.api_key_env, "OPENROUTER_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
max_pages = 50

[renderer]
nav_timeout_ms = 30000
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.max_pages, 50);
        assert_eq!(config.defaults.max_depth, 2);
        assert_eq!(config.renderer.nav_timeout_ms, 30_000);
        assert_eq!(config.renderer.carousel_max_steps, 8);
        assert!(!config.crawl_policies.priority_patterns.is_empty());
    }

    #[test]
    fn crawl_config_from_app_config() {
        let app = AppConfig::default();
        let crawl = CrawlConfig::from(&app);
        assert_eq!(crawl.max_depth, 2);
        assert_eq!(crawl.max_pages, 25);
        assert_eq!(crawl.nav_timeout_ms, 15_000);
        assert!(crawl.ignore_patterns.iter().any(|p| p == "/login"));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        // Unique var names would be nicer, but the override surface is fixed;
        // serialize access via a process-wide lock is overkill for one test.
        unsafe {
            std::env::set_var("SITEPROFILER_MAX_PAGES", "7");
            std::env::set_var("SITEPROFILER_CONCURRENCY", "2");
        }
        let crawl = CrawlConfig::from(&AppConfig::default()).apply_env_overrides();
        assert_eq!(crawl.max_pages, 7);
        assert_eq!(crawl.concurrency, 2);
        unsafe {
            std::env::remove_var("SITEPROFILER_MAX_PAGES");
            std::env::remove_var("SITEPROFILER_CONCURRENCY");
        }
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "SP_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
