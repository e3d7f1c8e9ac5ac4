use crate::config::PreviewConfig;
use crate::error::PreviewError;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Plain-text rendering of a single post, fetched through oEmbed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetPreview {
    pub text: String,
    pub author: String,
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    author_name: String,
    #[serde(default)]
    html: String,
}

pub struct PreviewFetcher {
    oembed_url: String,
    lang: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl PreviewFetcher {
    pub fn new(config: &PreviewConfig) -> Self {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            oembed_url: config.oembed_url.clone(),
            lang: config.lang.clone(),
            timeout,
            client,
        }
    }

    pub async fn fetch(&self, tweet_id: &str) -> Result<TweetPreview, PreviewError> {
        if !is_valid_tweet_id(tweet_id) {
            return Err(PreviewError::InvalidId);
        }

        let tweet_url = format!("https://twitter.com/i/status/{}", tweet_id);
        let response = self
            .client
            .get(&self.oembed_url)
            .query(&[
                ("url", tweet_url.as_str()),
                ("omit_script", "true"),
                ("lang", self.lang.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PreviewError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(PreviewError::Status(response.status().as_u16()));
        }

        let embed: OEmbedResponse = response
            .json()
            .await
            .map_err(|e| PreviewError::from_reqwest(e, self.timeout))?;

        Ok(TweetPreview {
            text: extract_embed_text(&embed.html),
            author: embed.author_name,
        })
    }
}

pub fn is_valid_tweet_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

/// Text of the embed's blockquote, minus scripts and the trailing attribution link.
fn extract_embed_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let Ok(blockquote_sel) = Selector::parse("blockquote") else {
        return String::new();
    };
    let Ok(anchor_sel) = Selector::parse("a") else {
        return String::new();
    };

    let mut parts: Vec<&str> = Vec::new();
    for blockquote in fragment.select(&blockquote_sel) {
        let attribution = blockquote.select(&anchor_sel).last().map(|a| a.id());

        for node in blockquote.descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let skipped = node.ancestors().any(|ancestor| {
                Some(ancestor.id()) == attribution
                    || ElementRef::wrap(ancestor).is_some_and(|el| el.value().name() == "script")
            });
            if !skipped {
                parts.push(&**text);
            }
        }
    }

    collapse_whitespace(&parts.concat())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
