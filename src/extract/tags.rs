use super::{element_text, selector};
use crate::feeds::TagStat;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

/// An inline `color:` or `background-color:` declaration with a value.
static COLOR_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[;\s])(?:background-)?color\s*:\s*[^;\s]").unwrap());

static TRAILING_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*)\D*$").unwrap());

/// Splits the listing's tag-filter links into domain tags and hot tags.
///
/// A link is a hot tag when its inline style carries a color, a domain tag
/// otherwise. That presentational signal is the classification; the source
/// exposes nothing more semantic.
pub struct TagClassifier {
    listing_segment: String,
    max_tags: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedTags {
    pub domain: Vec<TagStat>,
    pub hot: Vec<TagStat>,
}

impl TagClassifier {
    pub fn new(listing_path: &str, max_tags: usize) -> Self {
        Self {
            listing_segment: last_segment(listing_path).to_string(),
            max_tags,
        }
    }

    pub fn classify(&self, document: &Html) -> ClassifiedTags {
        let mut tags = ClassifiedTags::default();
        let Some(sel) = selector("a[href*='tag=']") else {
            return tags;
        };

        for anchor in document.select(&sel) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(name) = self.tag_param(href) else {
                continue;
            };
            let Some(count) = nested_count(anchor) else {
                continue;
            };

            let stat = TagStat { name, count };
            let hot = anchor
                .value()
                .attr("style")
                .is_some_and(|style| COLOR_STYLE.is_match(style));
            let bucket = if hot { &mut tags.hot } else { &mut tags.domain };
            if bucket.len() < self.max_tags {
                bucket.push(stat);
            }
        }

        tags
    }

    /// Decoded `tag` parameter of a link back to the listing page.
    fn tag_param(&self, href: &str) -> Option<String> {
        let href = href.split('#').next().unwrap_or(href);
        let (path, query) = href.split_once('?')?;
        if !path.is_empty() && last_segment(path) != self.listing_segment {
            return None;
        }

        let raw = query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == "tag").then_some(value)
        })?;

        let spaced = raw.replace('+', " ");
        let name = urlencoding::decode(&spaced)
            .map(|d| d.into_owned())
            .unwrap_or(spaced);
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Count token from the last nested element whose text carries a number.
fn nested_count(anchor: ElementRef<'_>) -> Option<u32> {
    anchor
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter_map(|el| {
            let text = element_text(el);
            let caps = TRAILING_COUNT.captures(&text)?;
            caps.get(1)?.as_str().replace(',', "").parse().ok()
        })
        .last()
}
