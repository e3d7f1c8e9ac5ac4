pub mod listing;
pub mod preview;

use crate::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GROUP: &str = "cn";
pub const DEFAULT_HOURS: u32 = 4;

/// One extracted post.
///
/// Metrics keep the source's display formatting; use
/// [`parse_metric`](crate::metrics::parse_metric) for magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub rank: u32,
    pub author: String,
    pub handle: String,
    pub avatar: String,
    pub content: String,
    pub views: String,
    pub likes: String,
    pub retweets: String,
    /// Either rank-derived (clamped to `[0, 1]`) or relayed from the source unclamped.
    pub heat_score: f64,
    pub tags: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStat {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSnapshot {
    pub tweets: Vec<Tweet>,
    pub domain_tags: Vec<TagStat>,
    pub hot_tags: Vec<TagStat>,
    pub fetched_at: DateTime<Utc>,
    pub group: String,
    pub hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendQuery {
    pub group: String,
    pub hours: u32,
    pub tag: Option<String>,
}

impl TrendQuery {
    pub fn new(group: impl Into<String>, hours: u32) -> Self {
        Self {
            group: group.into(),
            hours,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tag = (!tag.trim().is_empty()).then_some(tag);
        self
    }
}

impl Default for TrendQuery {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP, DEFAULT_HOURS)
    }
}

/// Where the pipeline gets its raw listing markup from.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listing(&self, query: &TrendQuery) -> Result<String, FetchError>;
}
