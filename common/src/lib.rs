/*!
common/src/lib.rs

Shared configuration types for Newsjacker.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- Validation of the values the generation pipeline relies on
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Feeds polled when the operator does not supply their own list.
pub const DEFAULT_FEED_URLS: &[&str] = &[
    "https://www.coindesk.com/arc/outboundfeeds/rss/",
    "https://cointelegraph.com/rss",
    "https://beincrypto.com/feed/",
    "https://decrypt.co/feed",
    "https://bitcoinmagazine.com/feed",
];

/// Feed aggregation configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Feed URLs in display order. Blank entries are ignored at fetch time.
    #[serde(default = "default_feed_urls")]
    pub urls: Vec<String>,
    /// Maximum number of entries taken from each feed
    #[serde(default = "default_limit_per_feed")]
    pub limit_per_feed: usize,
    pub fetch_timeout_seconds: Option<u64>,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            urls: default_feed_urls(),
            limit_per_feed: default_limit_per_feed(),
            fetch_timeout_seconds: None,
        }
    }
}

fn default_feed_urls() -> Vec<String> {
    DEFAULT_FEED_URLS.iter().map(|u| u.to_string()).collect()
}

fn default_limit_per_feed() -> usize {
    3
}

/// A single generation endpoint (used by both the `anthropic` and `remote` adapters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmEndpointConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API key. Read by the binary only.
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// LLM top-level config grouping the adapter specifics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "anthropic", "remote"
    pub anthropic: Option<LlmEndpointConfig>,
    // OpenAI-compatible chat completions endpoint
    pub remote: Option<LlmEndpointConfig>,
}

impl LlmConfig {
    /// Endpoint block matching the selected adapter, if any.
    pub fn endpoint(&self) -> Option<&LlmEndpointConfig> {
        match self.adapter.as_deref().unwrap_or("anthropic") {
            "anthropic" => self.anthropic.as_ref(),
            "remote" => self.remote.as_ref(),
            _ => None,
        }
    }
}

/// Title and brief generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Publication the title editor writes for
    pub publication: String,
    /// Number of titles requested per batch (not enforced on the response)
    pub title_count: usize,
    pub title_max_tokens: usize,
    pub brief_max_tokens: usize,
    /// Number of brief requests allowed in flight at once. 1 = strictly sequential.
    pub brief_concurrency: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            publication: "Fantokens.com".to_string(),
            title_count: 10,
            title_max_tokens: 1000,
            brief_max_tokens: 1500,
            brief_concurrency: 1,
        }
    }
}

/// HTTP adapter bind settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feeds: FeedsConfig,
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
    pub server: Option<ServerConfig>,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (label, path) in [("default", default_path), ("override", override_path)] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Non-blank feed URLs, trimmed, in configured order.
    pub fn feed_urls(&self) -> Vec<String> {
        self.feeds
            .urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.generation.title_count == 0 {
            anyhow::bail!("generation.title_count must be at least 1");
        }
        if self.generation.brief_concurrency == 0 {
            anyhow::bail!("generation.brief_concurrency must be at least 1");
        }
        if let Some(endpoint) = self.llm.as_ref().and_then(|l| l.endpoint()) {
            if let Some(api_url) = &endpoint.api_url {
                url::Url::parse(api_url)
                    .with_context(|| format!("llm api_url is not a valid URL: {}", api_url))?;
            }
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
