use super::{
    card_metrics, element_text, first_attr, first_text, push_tag, reported_score, selector,
    CardFields, ExtractionStrategy,
};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// `/<handle>/status/<id>` on either domain, or relative to the site root.
static STATUS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://(?:www\.|mobile\.)?(?:twitter|x)\.com)?/([A-Za-z0-9_]+)/status/(\d+)")
        .unwrap()
});

const STATUS_LINKS: &str = "a[href*='/status/']";
const SITE_ROOT: &str = "https://x.com";

/// Anchors on the one stable fact of a post card: a link to the post itself.
///
/// Each card is the largest ancestor of a status link that encloses no other
/// post's link. No cardinality threshold is needed. Cards that embed a quoted
/// post shrink to the innermost block holding a single status.
pub struct AnchoredStrategy {
    status_links: Option<Selector>,
}

impl AnchoredStrategy {
    pub fn new() -> Self {
        Self {
            status_links: selector(STATUS_LINKS),
        }
    }

    fn status_ids(&self, scope: ElementRef<'_>) -> HashSet<String> {
        let Some(sel) = &self.status_links else {
            return HashSet::new();
        };
        scope
            .select(sel)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(parse_status_url)
            .map(|(_, id)| id)
            .collect()
    }

    fn card_for<'a>(&self, anchor: ElementRef<'a>, id: &str) -> ElementRef<'a> {
        let mut card = anchor;
        while let Some(parent) = card.parent().and_then(ElementRef::wrap) {
            if matches!(parent.value().name(), "body" | "html") {
                break;
            }
            if self.status_ids(parent).iter().any(|other| other != id) {
                break;
            }
            card = parent;
        }
        card
    }

    fn status_link<'a>(&self, card: ElementRef<'a>) -> Option<(&'a str, String, String)> {
        let sel = self.status_links.as_ref()?;
        card.select(sel).find_map(|a| {
            let href = a.value().attr("href")?;
            let (handle, id) = parse_status_url(href)?;
            Some((href, handle, id))
        })
    }
}

impl Default for AnchoredStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// `(handle, id)` of a status URL. The handle is empty for `/i/status/` links.
pub fn parse_status_url(href: &str) -> Option<(String, String)> {
    let caps = STATUS_URL.captures(href.trim())?;
    let handle = caps.get(1)?.as_str();
    let handle = if handle == "i" { "" } else { handle };
    Some((handle.to_string(), caps.get(2)?.as_str().to_string()))
}

fn absolute_url(href: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", SITE_ROOT, href)
    } else {
        href.to_string()
    }
}

impl ExtractionStrategy for AnchoredStrategy {
    fn name(&self) -> &'static str {
        "anchored"
    }

    fn candidates<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        let Some(sel) = &self.status_links else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut cards = Vec::new();
        for anchor in document.select(sel) {
            let Some((_, id)) = anchor.value().attr("href").and_then(parse_status_url) else {
                continue;
            };
            let card = self.card_for(anchor, &id);
            if seen.insert(card.id()) {
                cards.push(card);
            }
        }
        cards
    }

    fn fields(&self, card: ElementRef<'_>) -> CardFields {
        let (url, handle) = match self.status_link(card) {
            Some((href, handle, _)) => (absolute_url(href), handle),
            None => (String::new(), String::new()),
        };

        let author = profile_name(card, &handle)
            .or_else(|| first_text(card, "[class*='author'], [class*='name']"))
            .unwrap_or_default();

        let avatar = first_attr(card, "img[src*='profile_images']", "src")
            .or_else(|| first_attr(card, "img", "src"))
            .unwrap_or_default();

        let content = first_text(card, "[lang]")
            .or_else(|| first_text(card, "p"))
            .unwrap_or_default();

        let mut tags = Vec::new();
        if let Some(sel) = selector("[data-tag], a[href*='tag=']") {
            for el in card.select(&sel) {
                match el.value().attr("data-tag") {
                    Some(tag) => push_tag(&mut tags, tag),
                    None => push_tag(&mut tags, element_text(el).trim_start_matches('#')),
                }
            }
        }

        CardFields {
            author,
            handle,
            avatar,
            content,
            metrics: card_metrics(card),
            heat: reported_heat(card),
            rank: reported_rank(card),
            tags,
            url,
        }
    }
}

/// Display name from the link to the author's profile, if the card has one.
fn profile_name(card: ElementRef<'_>, handle: &str) -> Option<String> {
    if handle.is_empty() {
        return None;
    }
    let sel = selector("a[href]")?;
    let suffix = format!("/{}", handle.to_lowercase());
    card.select(&sel)
        .filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|h| h.trim_end_matches('/').to_lowercase().ends_with(&suffix))
        })
        .map(element_text)
        .find(|text| !text.is_empty() && !text.starts_with('@'))
}

fn reported_heat(card: ElementRef<'_>) -> Option<f64> {
    if let Some(value) = card
        .value()
        .attr("data-heat")
        .or_else(|| {
            selector("[data-heat]").and_then(|sel| {
                card.select(&sel)
                    .next()
                    .and_then(|el| el.value().attr("data-heat"))
            })
        })
    {
        return reported_score(value);
    }
    labeled_value(card, &["heat", "热度"]).and_then(|t| reported_score(&t))
}

fn reported_rank(card: ElementRef<'_>) -> Option<u32> {
    let raw = card
        .value()
        .attr("data-rank")
        .map(str::to_string)
        .or_else(|| first_attr(card, "[data-rank]", "data-rank"))
        .or_else(|| labeled_value(card, &["rank", "排名"]))?;
    raw.trim()
        .trim_start_matches('#')
        .trim()
        .parse()
        .ok()
        .filter(|r| *r > 0)
}

/// Text of the first element whose `title`/`aria-label` mentions one of `labels`.
fn labeled_value(card: ElementRef<'_>, labels: &[&str]) -> Option<String> {
    let sel = selector("[title], [aria-label]")?;
    card.select(&sel)
        .find(|el| {
            let label = el
                .value()
                .attr("title")
                .or_else(|| el.value().attr("aria-label"))
                .unwrap_or("")
                .to_lowercase();
            labels.iter().any(|l| label.contains(l))
        })
        .map(element_text)
        .filter(|t| !t.is_empty())
}
