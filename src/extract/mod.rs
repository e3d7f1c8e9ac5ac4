//! Turning a parsed listing page into ranked [`Tweet`] records.
//!
//! Extraction is organised as a ranked list of [`ExtractionStrategy`]
//! implementations. The first strategy that resolves any candidate cards wins;
//! cards are then turned into records in document order. Nothing in here
//! fails: a page nobody recognises simply yields no records.

pub mod anchored;
pub mod heuristic;
pub mod tags;

use crate::config::{ListingConfig, StrategyKind};
use crate::feeds::Tweet;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

pub use anchored::AnchoredStrategy;
pub use heuristic::HeuristicStrategy;
pub use tags::TagClassifier;

/// Longest label kept in [`Tweet::tags`], in characters.
pub const MAX_TAG_CHARS: usize = 20;

static STATUS_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"status/(\d+)").unwrap());

static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,.]*[KkMm]?").unwrap());

/// One way of locating post cards and reading their fields.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Candidate card elements in document order. Empty when this strategy
    /// does not recognise the page.
    fn candidates<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>>;

    /// Read the raw fields of one card. Queries must stay scoped to `card`.
    fn fields(&self, card: ElementRef<'_>) -> CardFields;
}

/// Raw per-card values before validation and defaulting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFields {
    pub author: String,
    pub handle: String,
    pub avatar: String,
    pub content: String,
    pub metrics: Metrics,
    /// Heat score reported by the source, relayed as-is.
    pub heat: Option<f64>,
    /// Rank reported by the source.
    pub rank: Option<u32>,
    pub tags: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    pub views: Option<String>,
    pub likes: Option<String>,
    pub retweets: Option<String>,
}

impl Metrics {
    fn is_empty(&self) -> bool {
        self.views.is_none() && self.likes.is_none() && self.retweets.is_none()
    }
}

pub struct RecordExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    max_records: usize,
    /// A strategy that is not last in line must resolve strictly more cards
    /// than this to be accepted.
    min_candidates: usize,
}

impl RecordExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>, max_records: usize) -> Self {
        Self {
            strategies,
            max_records,
            min_candidates: 0,
        }
    }

    pub fn with_min_candidates(mut self, min_candidates: usize) -> Self {
        self.min_candidates = min_candidates;
        self
    }

    pub fn from_config(config: &ListingConfig) -> Self {
        let heuristic = || -> Box<dyn ExtractionStrategy> {
            Box::new(HeuristicStrategy::new(
                &config.candidate_selectors,
                config.min_candidates,
            ))
        };
        let strategies = match config.strategy {
            StrategyKind::Heuristic => vec![heuristic()],
            StrategyKind::Anchored => {
                vec![Box::new(AnchoredStrategy::new()) as Box<dyn ExtractionStrategy>]
            }
            StrategyKind::Auto => vec![
                Box::new(AnchoredStrategy::new()) as Box<dyn ExtractionStrategy>,
                heuristic(),
            ],
        };
        Self::new(strategies, config.max_tweets).with_min_candidates(config.min_candidates)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Records in document order, capped at the configured maximum (the tail is dropped).
    pub fn extract(&self, document: &Html) -> Vec<Tweet> {
        let last = self.strategies.len().saturating_sub(1);
        for (position, strategy) in self.strategies.iter().enumerate() {
            let candidates = strategy.candidates(document);
            if candidates.is_empty() {
                debug!(strategy = strategy.name(), "no candidates, trying next strategy");
                continue;
            }
            if position < last && candidates.len() <= self.min_candidates {
                debug!(
                    strategy = strategy.name(),
                    candidates = candidates.len(),
                    "too few candidates, trying next strategy"
                );
                continue;
            }

            let tweets: Vec<Tweet> = candidates
                .into_iter()
                .enumerate()
                .filter_map(|(index, card)| assemble(strategy.fields(card), index))
                .take(self.max_records)
                .collect();

            debug!(
                strategy = strategy.name(),
                tweets = tweets.len(),
                "extracted records"
            );
            return tweets;
        }

        Vec::new()
    }
}

/// Validate and default one card's fields. `index` is the card's 0-based
/// position among the resolved candidates.
pub(crate) fn assemble(fields: CardFields, index: usize) -> Option<Tweet> {
    let content = fields.content.trim().to_string();
    let handle = fields.handle.trim().trim_start_matches('@').to_string();
    let mut author = fields.author.trim().to_string();

    if content.is_empty() || (author.is_empty() && handle.is_empty()) {
        return None;
    }
    if author.is_empty() {
        author = handle.clone();
    }

    let url = fields.url.trim().to_string();
    let id = status_id(&url).unwrap_or_else(|| index.to_string());
    let rank = fields.rank.unwrap_or(index as u32 + 1);
    let heat_score = fields.heat.unwrap_or_else(|| rank_heat(index));
    let zero = || "0".to_string();

    Some(Tweet {
        id,
        rank,
        author,
        handle,
        avatar: fields.avatar.trim().to_string(),
        content,
        views: fields.metrics.views.unwrap_or_else(zero),
        likes: fields.metrics.likes.unwrap_or_else(zero),
        retweets: fields.metrics.retweets.unwrap_or_else(zero),
        heat_score,
        tags: fields.tags,
        url,
    })
}

/// Heat synthesized from position: `(100 - index) / 100`, clamped to `[0, 1]`.
pub fn rank_heat(index: usize) -> f64 {
    ((100.0 - index as f64) / 100.0).clamp(0.0, 1.0)
}

pub fn status_id(url: &str) -> Option<String> {
    STATUS_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Concatenated, trimmed text of an element.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join("").trim().to_string()
}

/// Trimmed text of the first match of `css` inside `scope`, if non-empty.
pub(crate) fn first_text(scope: ElementRef<'_>, css: &str) -> Option<String> {
    let sel = selector(css)?;
    let element = scope.select(&sel).next()?;
    let text = element_text(element);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub(crate) fn first_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css)?;
    scope
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Number-like tokens in `text`, in order of appearance.
pub(crate) fn number_tokens(text: &str) -> Vec<String> {
    NUMBER_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
        .collect()
}

/// The first whitespace-separated word carrying a digit, kept as displayed
/// (`"3.1万"`, `"12.3K"`).
fn display_value(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|word| word.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Metrics read from elements that name themselves through `title` or
/// `aria-label` ("Views", "1,204 Likes", "转发"...).
pub(crate) fn labeled_metrics(card: ElementRef<'_>) -> Metrics {
    let mut metrics = Metrics::default();
    let Some(sel) = selector("[title], [aria-label]") else {
        return metrics;
    };

    for element in card.select(&sel) {
        let label = element
            .value()
            .attr("title")
            .or_else(|| element.value().attr("aria-label"))
            .unwrap_or("");
        let lower = label.to_lowercase();

        let slot = if lower.contains("view") || label.contains("浏览") || label.contains("阅读") {
            &mut metrics.views
        } else if lower.contains("like") || label.contains("点赞") || label.contains("喜欢") {
            &mut metrics.likes
        } else if lower.contains("retweet")
            || lower.contains("repost")
            || label.contains("转推")
            || label.contains("转发")
        {
            &mut metrics.retweets
        } else {
            continue;
        };
        if slot.is_some() {
            continue;
        }

        let value = display_value(&element_text(element))
            .or_else(|| number_tokens(label).into_iter().next());
        if value.is_some() {
            *slot = value;
        }
    }

    metrics
}

/// Labeled metrics when the card exposes any, otherwise the positional scan.
///
/// The positional scan is best effort: the first three number-like tokens in
/// the card text are taken as views, likes and retweets in that order. If the
/// source ever reorders or interleaves other numbers, the metrics are silently
/// mislabeled.
pub(crate) fn card_metrics(card: ElementRef<'_>) -> Metrics {
    let labeled = labeled_metrics(card);
    if !labeled.is_empty() {
        return labeled;
    }
    positional_metrics(&element_text(card))
}

pub(crate) fn positional_metrics(text: &str) -> Metrics {
    let mut tokens = number_tokens(text).into_iter();
    Metrics {
        views: tokens.next(),
        likes: tokens.next(),
        retweets: tokens.next(),
    }
}

/// Leading float of a labeled score (`"87.5"`, `"12 pts"`); zero counts as absent.
pub(crate) fn reported_score(text: &str) -> Option<f64> {
    crate::metrics::leading_number(text.trim()).filter(|n| *n != 0.0)
}

/// Keep short, non-empty labels in discovery order. Duplicates are kept.
pub(crate) fn push_tag(tags: &mut Vec<String>, label: &str) {
    let label = label.trim();
    if !label.is_empty() && label.chars().count() <= MAX_TAG_CHARS {
        tags.push(label.to_string());
    }
}
