use anyhow::{Context, Result};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Placeholder for entries without a publish date.
pub const UNKNOWN_PUBLISHED: &str = "unknown";
/// Placeholder for feeds without a channel title.
pub const UNKNOWN_SOURCE: &str = "Unknown";
pub const DEFAULT_LIMIT_PER_FEED: usize = 3;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// One syndicated headline, as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeadlineRecord {
    pub source: String,
    pub title: String,
    /// RFC 2822 date, or `"unknown"`
    pub published: String,
    pub link: String,
}

/// Identity of a headline for selection purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeadlineKey {
    pub source: String,
    pub title: String,
    pub link: String,
}

impl HeadlineRecord {
    pub fn key(&self) -> HeadlineKey {
        HeadlineKey {
            source: self.source.clone(),
            title: self.title.clone(),
            link: self.link.clone(),
        }
    }
}

/// Why a single feed was left out of an aggregation run.
#[derive(Debug, thiserror::Error)]
pub enum FeedFetchError {
    #[error("network error during fetch: {0}")]
    Network(#[from] reqwest::Error),
    #[error("feed fetch failed with status: {0}")]
    Status(StatusCode),
    #[error("failed to parse feed: {0}")]
    Parse(#[from] parser::ParseFeedError),
}

/// Fetches feeds and flattens them into headline records.
pub struct FeedAggregator {
    client: Client,
}

impl FeedAggregator {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Newsjacker/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client })
    }

    /// Fetches every non-blank URL in order and keeps at most `limit_per_feed`
    /// entries from each. Feeds that fail to download or parse are skipped.
    pub async fn fetch<S: AsRef<str>>(&self, urls: &[S], limit_per_feed: usize) -> Vec<HeadlineRecord> {
        let mut headlines = Vec::new();

        for url in urls.iter().map(|u| u.as_ref().trim()) {
            if url.is_empty() {
                continue;
            }

            match self.fetch_feed(url).await {
                Ok(feed) => {
                    let records = headlines_from_feed(&feed, limit_per_feed);
                    debug!("Fetched feed '{}': {} entries, kept {}", url, feed.entries.len(), records.len());
                    headlines.extend(records);
                }
                Err(e) => {
                    warn!("Skipping feed {}: {}", url, e);
                }
            }
        }

        info!("Aggregated {} headlines", headlines.len());
        headlines
    }

    /// Fetches a feed from the given URL and parses it. No retries.
    pub async fn fetch_feed(&self, url: &str) -> Result<Feed, FeedFetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedFetchError::Status(status));
        }

        let bytes = response.bytes().await?;
        Ok(parser::parse(bytes.as_ref())?)
    }
}

/// Parses a feed document and returns its first `limit` headlines.
pub fn parse_headlines(bytes: &[u8], limit: usize) -> Result<Vec<HeadlineRecord>, FeedFetchError> {
    let feed = parser::parse(bytes)?;
    Ok(headlines_from_feed(&feed, limit))
}

/// Maps the first `limit` entries of a parsed feed, in document order.
/// Entries without a title are dropped after the cap is applied.
pub fn headlines_from_feed(feed: &Feed, limit: usize) -> Vec<HeadlineRecord> {
    let source = feed
        .title
        .as_ref()
        .map(|t| t.content.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_SOURCE);

    feed.entries
        .iter()
        .take(limit)
        .filter_map(|entry| headline_from_entry(source, entry))
        .collect()
}

fn headline_from_entry(source: &str, entry: &Entry) -> Option<HeadlineRecord> {
    let title = entry.title.as_ref().map(|t| t.content.trim().to_string())?;
    if title.is_empty() {
        debug!("Skipping untitled entry {}", entry.id);
        return None;
    }

    let published = entry
        .published
        .map(|d| d.to_rfc2822())
        .unwrap_or_else(|| UNKNOWN_PUBLISHED.to_string());
    // Use the first link as the URL
    let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();

    Some(HeadlineRecord {
        source: source.to_string(),
        title,
        published,
        link,
    })
}
