use super::{ListingSource, TrendQuery};
use crate::config::ListingConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header;
use std::time::Duration;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Fetches the raw listing page with browser-like headers and no caching.
pub struct ListingFetcher {
    base_url: String,
    path: String,
    accept_language: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ListingFetcher {
    pub fn new(config: &ListingConfig) -> Self {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            path: config.path.clone(),
            accept_language: config.accept_language.clone(),
            timeout,
            client,
        }
    }

    pub fn listing_url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    fn query_pairs(query: &TrendQuery) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("group", query.group.clone()),
            ("hours", query.hours.to_string()),
        ];
        if let Some(tag) = &query.tag {
            pairs.push(("tag", tag.clone()));
        }
        pairs
    }
}

#[async_trait]
impl ListingSource for ListingFetcher {
    async fn fetch_listing(&self, query: &TrendQuery) -> Result<String, FetchError> {
        let url = self.listing_url();

        let response = self
            .client
            .get(&url)
            .query(&Self::query_pairs(query))
            .header(header::ACCEPT, ACCEPT_HTML)
            .header(header::ACCEPT_LANGUAGE, &self.accept_language)
            .header(header::REFERER, &self.base_url)
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))
    }
}
