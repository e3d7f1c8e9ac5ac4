use super::{
    card_metrics, element_text, first_attr, first_text, push_tag, reported_score, selector,
    status_id, CardFields, ExtractionStrategy,
};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

const HANDLE: &str = "[class*='handle'], [class*='username'], a[href*='twitter.com'], a[href*='x.com']";
const AUTHOR: &str = "[class*='name'], [class*='author']";
const CONTENT: &str = "p, [class*='content'], [class*='text'], [class*='body']";
const HEAT: &str = "[class*='heat'], [class*='score'], [class*='rank']";
const TAGS: &str = "[class*='tag'], [data-tag]";
const STATUS_LINK: &str = "a[href*='twitter.com/'], a[href*='x.com/']";

/// Content falls back to this many characters of the card's full text.
const CONTENT_FALLBACK_CHARS: usize = 200;

/// Tries progressively less specific selectors and keeps the first one that
/// matches strictly more than `min_matches` elements, so that a lone page
/// chrome element sharing a class fragment is never mistaken for the list.
pub struct HeuristicStrategy {
    selectors: Vec<(String, Selector)>,
    min_matches: usize,
}

impl HeuristicStrategy {
    pub fn new(candidates: &[String], min_matches: usize) -> Self {
        let selectors = candidates
            .iter()
            .filter_map(|css| match Selector::parse(css) {
                Ok(sel) => Some((css.clone(), sel)),
                Err(e) => {
                    warn!(selector = %css, error = %e, "ignoring invalid candidate selector");
                    None
                }
            })
            .collect();

        Self {
            selectors,
            min_matches,
        }
    }
}

impl ExtractionStrategy for HeuristicStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn candidates<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for (css, sel) in &self.selectors {
            let found: Vec<ElementRef<'a>> = document.select(sel).collect();
            if found.len() > self.min_matches {
                debug!(selector = %css, matches = found.len(), "candidate selector accepted");
                return found;
            }
        }
        Vec::new()
    }

    fn fields(&self, card: ElementRef<'_>) -> CardFields {
        let all_text = element_text(card);
        if all_text.is_empty() {
            return CardFields::default();
        }

        let mut tags = Vec::new();
        if let Some(sel) = selector(TAGS) {
            for el in card.select(&sel) {
                let text = element_text(el);
                let label = if text.is_empty() {
                    el.value().attr("data-tag").unwrap_or("")
                } else {
                    text.as_str()
                };
                push_tag(&mut tags, label);
            }
        }

        CardFields {
            author: first_text(card, AUTHOR).unwrap_or_default(),
            handle: first_text(card, HANDLE).unwrap_or_default(),
            avatar: first_attr(card, "img", "src").unwrap_or_default(),
            content: first_text(card, CONTENT)
                .unwrap_or_else(|| all_text.chars().take(CONTENT_FALLBACK_CHARS).collect()),
            metrics: card_metrics(card),
            heat: first_text(card, HEAT).and_then(|t| reported_score(&t)),
            rank: card
                .value()
                .attr("data-rank")
                .and_then(|r| r.trim().parse().ok()),
            tags,
            url: post_url(card).unwrap_or_default(),
        }
    }
}

/// The first link to a post, or the first site link when none names a status.
fn post_url(card: ElementRef<'_>) -> Option<String> {
    let sel = selector(STATUS_LINK)?;
    let hrefs: Vec<&str> = card
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .collect();
    hrefs
        .iter()
        .find(|h| status_id(h).is_some())
        .or_else(|| hrefs.first())
        .map(|h| h.to_string())
}
