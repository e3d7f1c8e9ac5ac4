//! HTTP surface: listing snapshot, generation relay, tweet preview.

use crate::config::Config;
use crate::error::{PreviewError, RelayError};
use crate::feeds::preview::PreviewFetcher;
use crate::feeds::{TrendQuery, DEFAULT_GROUP, DEFAULT_HOURS};
use crate::pipeline::TrendPipeline;
use crate::relay::prompts::{GenerationRequest, PromptLimits};
use crate::relay::CompletionRelay;
use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TrendPipeline>,
    pub relay: Arc<CompletionRelay>,
    pub preview: Arc<PreviewFetcher>,
    pub default_model: String,
    pub models: Vec<String>,
    pub prompt_limits: PromptLimits,
    pub preview_max_age: u64,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pipeline: Arc::new(TrendPipeline::from_config(&config.listing)),
            relay: Arc::new(CompletionRelay::new(&config.relay)),
            preview: Arc::new(PreviewFetcher::new(&config.preview)),
            default_model: config.relay.model.clone(),
            models: config.relay.models.clone(),
            prompt_limits: PromptLimits {
                tweets: config.relay.prompt_tweets,
                hot_tags: config.relay.prompt_hot_tags,
            },
            preview_max_age: config.preview.cache_max_age_secs,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/trends", get(trends_handler))
        .route("/api/writing-advice", post(writing_advice_handler))
        .route("/api/tweet-preview", get(tweet_preview_handler))
        .route("/api/models", get(models_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<()> {
    let bind = config.server.bind.clone();
    let app = build_router(AppState::from_config(&config));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(%bind, "trendscope listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn models_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "default": state.default_model,
        "models": state.models,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TrendParams {
    group: Option<String>,
    hours: Option<String>,
    tag: Option<String>,
}

impl TrendParams {
    fn into_query(self) -> TrendQuery {
        let group = self
            .group
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());
        let hours = self
            .hours
            .and_then(|h| h.trim().parse().ok())
            .unwrap_or(DEFAULT_HOURS);

        let query = TrendQuery::new(group, hours);
        match self.tag {
            Some(tag) => query.with_tag(tag),
            None => query,
        }
    }
}

async fn trends_handler(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> Response {
    let query = params.into_query();
    match state.pipeline.run(&query).await {
        Ok(snapshot) => (
            [(header::CACHE_CONTROL, "no-store")],
            Json(snapshot),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn writing_advice_handler(State(state): State<AppState>, body: Bytes) -> Response {
    if !state.relay.is_configured() {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "AI_API_KEY not configured",
        );
    }

    let request: GenerationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejecting generation request");
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let messages = match request.messages(state.prompt_limits) {
        Ok(messages) => messages,
        Err(e) => return relay_error_response(e),
    };
    let model = request
        .model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(&state.default_model);

    info!(mode = ?request.mode, %model, tweets = request.tweets.len(), "relaying generation");
    match state.relay.open(model, &messages).await {
        Ok(session) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(session.into_byte_stream()))
            .unwrap_or_else(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        Err(e) => relay_error_response(e),
    }
}

fn relay_error_response(err: RelayError) -> Response {
    let status = match &err {
        RelayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        RelayError::UpstreamStatus { .. } | RelayError::Timeout(_) | RelayError::Upstream(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    error_response(status, err.to_string())
}

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    id: Option<String>,
}

async fn tweet_preview_handler(
    State(state): State<AppState>,
    Query(params): Query<PreviewParams>,
) -> Response {
    let id = params.id.unwrap_or_default();
    match state.preview.fetch(&id).await {
        Ok(preview) => (
            [(
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.preview_max_age),
            )],
            Json(preview),
        )
            .into_response(),
        Err(e @ PreviewError::InvalidId) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            warn!(%id, error = %e, "tweet preview failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}
