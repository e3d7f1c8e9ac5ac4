use crate::error::RelayError;
use crate::feeds::{TagStat, TrendSnapshot, Tweet, DEFAULT_GROUP, DEFAULT_HOURS};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Topics,
    Article,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleFormat {
    Short,
    #[default]
    Long,
}

/// The slice of a [`Tweet`] a generation request carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetSummary {
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub views: String,
    #[serde(default)]
    pub likes: String,
    #[serde(default)]
    pub heat_score: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<&Tweet> for TweetSummary {
    fn from(tweet: &Tweet) -> Self {
        Self {
            rank: tweet.rank,
            author: tweet.author.clone(),
            content: tweet.content.clone(),
            views: tweet.views.clone(),
            likes: tweet.likes.clone(),
            heat_score: tweet.heat_score,
            tags: tweet.tags.clone(),
        }
    }
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_hours() -> u32 {
    DEFAULT_HOURS
}

/// Body of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub mode: GenerationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub tweets: Vec<TweetSummary>,
    #[serde(default)]
    pub domain_tags: Vec<TagStat>,
    #[serde(default)]
    pub hot_tags: Vec<TagStat>,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_hours")]
    pub hours: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ArticleFormat>,
}

#[derive(Debug, Clone, Copy)]
pub struct PromptLimits {
    pub tweets: usize,
    pub hot_tags: usize,
}

impl GenerationRequest {
    /// A topics request carrying the first `limit` tweets of a snapshot.
    pub fn topics(snapshot: &TrendSnapshot, model: Option<String>, limit: usize) -> Self {
        Self {
            mode: GenerationMode::Topics,
            model,
            tweets: snapshot.tweets.iter().take(limit).map(TweetSummary::from).collect(),
            domain_tags: snapshot.domain_tags.clone(),
            hot_tags: snapshot.hot_tags.clone(),
            group: snapshot.group.clone(),
            hours: snapshot.hours,
            topic: None,
            format: None,
        }
    }

    pub fn messages(&self, limits: PromptLimits) -> Result<Vec<ChatMessage>, RelayError> {
        match self.mode {
            GenerationMode::Topics => Ok(vec![ChatMessage::user(self.topics_prompt(limits))]),
            GenerationMode::Article => {
                let topic = self
                    .topic
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| RelayError::InvalidRequest("topic required".to_string()))?;
                Ok(vec![
                    ChatMessage::system(ARTICLE_STYLE),
                    ChatMessage::user(article_prompt(topic, self.format.unwrap_or_default())),
                ])
            }
        }
    }

    fn topics_prompt(&self, limits: PromptLimits) -> String {
        let audience = match self.group.as_str() {
            "cn" => "Chinese-language Twitter",
            "en" => "English-language Twitter",
            _ => "global Twitter",
        };

        let mut tweet_lines = String::new();
        for (i, t) in self.tweets.iter().take(limits.tweets).enumerate() {
            let _ = writeln!(
                tweet_lines,
                "{}. [heat {:.0} | {} views] {} (@{})",
                i + 1,
                t.heat_score,
                t.views,
                t.content,
                t.author
            );
        }

        let domains = self
            .domain_tags
            .iter()
            .map(|t| format!("{} ({} posts)", t.name, t.count))
            .collect::<Vec<_>>()
            .join(", ");
        let hot = self
            .hot_tags
            .iter()
            .take(limits.hot_tags)
            .map(|t| format!("#{} ({})", t.name, t.count))
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "You are a social media content strategist.\n\n\
             Data: {audience}, top posts of the past {hours} hours:\n\
             {tweet_lines}\n\
             Domains: {domains}\n\
             Hot topics: {hot}\n\n\
             Distil 5 to 10 topics most worth writing about.\n\n\
             Output rules:\n\
             - Output only the list, no preface or summary\n\
             - One topic per line, formatted as: number. title\n\
             - Keep each title short\n\
             - No emoji, headings or separators",
            hours = self.hours,
        )
    }
}

const ARTICLE_STYLE: &str = "You write restrained, analytical posts with dry humour. \
Paragraphs are three to five lines and dense without being compressed. \
Avoid stock transitions, rhetorical self-answers and slogans. \
Open with a contrast or a market reaction, close tight or leave it open. \
Explain mechanisms with analogies where useful, never recommend investments, \
and end long pieces with: This is not investment advice.";

fn article_prompt(topic: &str, format: ArticleFormat) -> String {
    match format {
        ArticleFormat::Short => format!(
            "Write a single short post on this topic in your style.\n\n\
             Topic: {topic}\n\n\
             Requirements:\n\
             - At most 280 characters\n\
             - Dense and pointed, fragments are fine\n\
             - No disclaimer needed\n\
             - Output the post only"
        ),
        ArticleFormat::Long => format!(
            "Write a long-form post on this topic in your style.\n\n\
             Topic: {topic}\n\n\
             Requirements:\n\
             - 600 to 1000 words\n\
             - Follow your style and structure strictly\n\
             - Output the article only"
        ),
    }
}
