use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Progressively less specific candidate selectors with a cardinality threshold.
    #[default]
    Heuristic,
    /// Cards anchored on status links.
    Anchored,
    /// Anchored first, heuristic when no status links are found.
    Auto,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    #[serde(default = "default_listing_base")]
    pub base_url: String,
    #[serde(default = "default_listing_path")]
    pub path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    #[serde(default = "default_listing_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tweets")]
    pub max_tweets: usize,
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default = "default_candidate_selectors")]
    pub candidate_selectors: Vec<String>,
    /// A candidate selector must match strictly more elements than this.
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Only ever populated from `AI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_prompt_tweets")]
    pub prompt_tweets: usize,
    #[serde(default = "default_prompt_hot_tags")]
    pub prompt_hot_tags: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreviewConfig {
    #[serde(default = "default_oembed_url")]
    pub oembed_url: String,
    #[serde(default = "default_preview_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,
    #[serde(default = "default_preview_lang")]
    pub lang: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_listing_base() -> String {
    "https://trends.xhunt.ai".to_string()
}

fn default_listing_path() -> String {
    "/zh/tweets".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_accept_language() -> String {
    "zh-CN,zh;q=0.9,en;q=0.8".to_string()
}

fn default_listing_timeout() -> u64 {
    15
}

fn default_max_tweets() -> usize {
    100
}

fn default_max_tags() -> usize {
    20
}

fn default_candidate_selectors() -> Vec<String> {
    [
        "article",
        "[class*='tweet']",
        "[class*='Tweet']",
        "[class*='card']",
        "li[class*='item']",
        "div[class*='item']",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_min_candidates() -> usize {
    5
}

fn default_api_base() -> String {
    "https://max.openai365.top/v1".to_string()
}

fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_models() -> Vec<String> {
    [
        "gemini-2.5-pro",
        "gemini-3-pro-preview",
        "gemini-3-flash-preview",
        "claude-sonnet-4-6",
        "claude-opus-4-6",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_relay_timeout() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.75
}

fn default_prompt_tweets() -> usize {
    20
}

fn default_prompt_hot_tags() -> usize {
    8
}

fn default_oembed_url() -> String {
    "https://publish.twitter.com/oembed".to_string()
}

fn default_preview_timeout() -> u64 {
    8
}

fn default_cache_max_age() -> u64 {
    3600
}

fn default_preview_lang() -> String {
    "zh".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: default_listing_base(),
            path: default_listing_path(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            timeout_secs: default_listing_timeout(),
            max_tweets: default_max_tweets(),
            max_tags: default_max_tags(),
            strategy: StrategyKind::default(),
            candidate_selectors: default_candidate_selectors(),
            min_candidates: default_min_candidates(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            models: default_models(),
            timeout_secs: default_relay_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            prompt_tweets: default_prompt_tweets(),
            prompt_hot_tags: default_prompt_hot_tags(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            oembed_url: default_oembed_url(),
            timeout_secs: default_preview_timeout(),
            cache_max_age_secs: default_cache_max_age(),
            lang: default_preview_lang(),
        }
    }
}

impl ListingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PreviewConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults; environment overrides apply either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };

        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(&p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", p.display()))?
            }
            _ => Config::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("trendscope").join("config.toml"))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("AI_API_KEY") {
            self.relay.api_key = Some(key);
        }
        if let Some(base) = non_empty("AI_API_BASE") {
            self.relay.api_base = base;
        }
        if let Some(model) = non_empty("AI_MODEL") {
            self.relay.model = model;
        }
        if let Some(bind) = non_empty("TRENDSCOPE_BIND") {
            self.server.bind = bind;
        }
    }
}
