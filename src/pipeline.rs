use crate::config::ListingConfig;
use crate::error::FetchError;
use crate::extract::{RecordExtractor, TagClassifier};
use crate::feeds::listing::ListingFetcher;
use crate::feeds::{ListingSource, TrendQuery, TrendSnapshot};
use chrono::Utc;
use scraper::Html;
use std::sync::Arc;
use tracing::{info, warn};

/// Fetch, extract, classify, assemble. Holds no per-run state, so one
/// pipeline can serve concurrent runs.
pub struct TrendPipeline {
    source: Arc<dyn ListingSource>,
    extractor: RecordExtractor,
    classifier: TagClassifier,
}

impl TrendPipeline {
    pub fn new(
        source: Arc<dyn ListingSource>,
        extractor: RecordExtractor,
        classifier: TagClassifier,
    ) -> Self {
        Self {
            source,
            extractor,
            classifier,
        }
    }

    pub fn from_config(config: &ListingConfig) -> Self {
        Self::new(
            Arc::new(ListingFetcher::new(config)),
            RecordExtractor::from_config(config),
            TagClassifier::new(&config.path, config.max_tags),
        )
    }

    /// The only failure is the fetch itself; extraction always yields a snapshot.
    pub async fn run(&self, query: &TrendQuery) -> Result<TrendSnapshot, FetchError> {
        info!(group = %query.group, hours = query.hours, tag = ?query.tag, "fetching trends");

        let html = self.source.fetch_listing(query).await.map_err(|e| {
            warn!(group = %query.group, hours = query.hours, error = %e, "listing fetch failed");
            e
        })?;

        let snapshot = self.assemble(&html, query);
        info!(
            group = %snapshot.group,
            hours = snapshot.hours,
            tweets = snapshot.tweets.len(),
            domain_tags = snapshot.domain_tags.len(),
            hot_tags = snapshot.hot_tags.len(),
            "trend snapshot assembled"
        );
        Ok(snapshot)
    }

    /// Build a snapshot from already-fetched markup.
    pub fn assemble(&self, html: &str, query: &TrendQuery) -> TrendSnapshot {
        let document = Html::parse_document(html);
        let tweets = self.extractor.extract(&document);
        let tags = self.classifier.classify(&document);

        TrendSnapshot {
            tweets,
            domain_tags: tags.domain,
            hot_tags: tags.hot,
            fetched_at: Utc::now(),
            group: query.group.clone(),
            hours: query.hours,
        }
    }
}
