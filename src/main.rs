use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trendscope::feeds::preview::PreviewFetcher;
use trendscope::feeds::{TrendQuery, DEFAULT_GROUP, DEFAULT_HOURS};
use trendscope::relay::prompts::{GenerationRequest, PromptLimits};
use trendscope::relay::CompletionRelay;
use trendscope::{parse_metric, server, Config, TrendPipeline};

#[derive(Parser)]
#[command(name = "trendscope")]
#[command(about = "Trending-tweet snapshots and streamed writing suggestions", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: <config dir>/trendscope/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Address to bind, overrides the config file
        #[arg(long, env = "TRENDSCOPE_BIND")]
        bind: Option<String>,
    },
    /// Fetch one snapshot and print it as JSON
    Fetch {
        #[arg(long, default_value = DEFAULT_GROUP)]
        group: String,
        #[arg(long, default_value_t = DEFAULT_HOURS)]
        hours: u32,
        #[arg(long)]
        tag: Option<String>,
        /// Print a one-line summary per tweet instead of JSON
        #[arg(long)]
        summary: bool,
    },
    /// Print the plain text of one post
    Preview {
        /// Numeric status id
        id: String,
    },
    /// Fetch a snapshot and stream topic suggestions for it
    Topics {
        #[arg(long, default_value = DEFAULT_GROUP)]
        group: String,
        #[arg(long, default_value_t = DEFAULT_HOURS)]
        hours: u32,
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendscope=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            server::serve(config).await
        }
        Command::Fetch {
            group,
            hours,
            tag,
            summary,
        } => {
            let pipeline = TrendPipeline::from_config(&config.listing);
            let mut query = TrendQuery::new(group, hours);
            if let Some(tag) = tag {
                query = query.with_tag(tag);
            }
            let snapshot = pipeline.run(&query).await?;

            if summary {
                for t in &snapshot.tweets {
                    println!(
                        "{:>3}. @{:<16} {:>10.0} views  {}",
                        t.rank,
                        t.handle,
                        parse_metric(&t.views),
                        t.content.chars().take(60).collect::<String>()
                    );
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Ok(())
        }
        Command::Preview { id } => {
            let preview = PreviewFetcher::new(&config.preview).fetch(&id).await?;
            println!("{}: {}", preview.author, preview.text);
            Ok(())
        }
        Command::Topics {
            group,
            hours,
            model,
        } => {
            let relay = CompletionRelay::new(&config.relay);
            if !relay.is_configured() {
                anyhow::bail!("AI_API_KEY not configured");
            }

            let pipeline = TrendPipeline::from_config(&config.listing);
            let snapshot = pipeline.run(&TrendQuery::new(group, hours)).await?;
            let request =
                GenerationRequest::topics(&snapshot, model, config.relay.prompt_tweets);
            let messages = request.messages(PromptLimits {
                tweets: config.relay.prompt_tweets,
                hot_tags: config.relay.prompt_hot_tags,
            })?;
            let model = request.model.as_deref().unwrap_or(&config.relay.model);

            let mut deltas = Box::pin(relay.open(model, &messages).await?.into_deltas());
            let mut stdout = std::io::stdout();
            while let Some(delta) = deltas.next().await {
                let delta = delta.context("completion stream failed")?;
                stdout.write_all(delta.as_bytes())?;
                stdout.flush()?;
            }
            println!();
            Ok(())
        }
    }
}
