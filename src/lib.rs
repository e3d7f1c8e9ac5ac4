//! Trending-post extraction and a streaming completions relay.
//!
//! [`pipeline::TrendPipeline`] fetches a listing page, resolves post cards
//! through the strategies in [`extract`], and assembles a
//! [`feeds::TrendSnapshot`]. [`relay::CompletionRelay`] forwards a streamed
//! chat completion without buffering it. [`server`] exposes both over HTTP.

pub mod config;
pub mod error;
pub mod extract;
pub mod feeds;
pub mod metrics;
pub mod pipeline;
pub mod relay;
pub mod server;

pub use config::Config;
pub use error::{FetchError, PreviewError, RelayError};
pub use feeds::{TagStat, TrendQuery, TrendSnapshot, Tweet};
pub use metrics::parse_metric;
pub use pipeline::TrendPipeline;
