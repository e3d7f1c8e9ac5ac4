//! End-to-end tests of the HTTP surface against mocked upstreams.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use trendscope::server::{build_router, AppState};
use trendscope::Config;
use wiremock::matchers::{body_partial_json, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIXTURE: &str = include_str!("fixtures/trends.html");

fn config(upstream: &MockServer, api_key: Option<&str>) -> Config {
    let mut config = Config::default();
    config.listing.base_url = upstream.uri();
    config.relay.api_base = format!("{}/v1", upstream.uri());
    config.relay.api_key = api_key.map(String::from);
    config.preview.oembed_url = format!("{}/oembed", upstream.uri());
    config
}

fn app(config: &Config) -> Router {
    build_router(AppState::from_config(config))
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

fn expected_fixture_tweets() -> Value {
    json!([
        {
            "id": "1790000000000000001", "rank": 1, "author": "Alice Chen", "handle": "alice",
            "avatar": "https://pbs.twimg.com/profile_images/1/alice.jpg",
            "content": "Bitcoin ETF inflows hit a new weekly record",
            "views": "12.3K", "likes": "1,204", "retweets": "88",
            "heatScore": 98.5, "tags": ["ETF", "BTC"],
            "url": "https://x.com/alice/status/1790000000000000001"
        },
        {
            "id": "1790000000000000002", "rank": 2, "author": "Carol Wu", "handle": "carolwu",
            "avatar": "https://pbs.twimg.com/profile_images/2/carol.jpg",
            "content": "Layer two fees dropped below a cent today",
            "views": "8,950", "likes": "640", "retweets": "72",
            "heatScore": 0.99, "tags": ["L2"],
            "url": "https://x.com/carolwu/status/1790000000000000002"
        },
        {
            "id": "1790000000000000003", "rank": 3, "author": "Bob Li", "handle": "bob_li",
            "avatar": "https://pbs.twimg.com/profile_images/3/bob.jpg",
            "content": "Why the market shrugged off the rate decision",
            "views": "3,400", "likes": "210", "retweets": "15",
            "heatScore": 0.98, "tags": [],
            "url": "https://x.com/bob_li/status/1790000000000000003"
        },
        {
            "id": "4", "rank": 5, "author": "Dave Kim", "handle": "davekim",
            "avatar": "https://pbs.twimg.com/profile_images/5/dave.jpg",
            "content": "Stablecoin supply keeps climbing this quarter",
            "views": "5.1K", "likes": "300", "retweets": "41",
            "heatScore": 77.0, "tags": ["Stablecoins"],
            "url": ""
        },
        {
            "id": "1790000000000000006", "rank": 6, "author": "Erin Sato", "handle": "erinsato",
            "avatar": "https://pbs.twimg.com/profile_images/6/erin.jpg",
            "content": "Airdrop season is back and so are the farmers",
            "views": "2M", "likes": "45.6K", "retweets": "9,876",
            "heatScore": 120.25, "tags": ["Airdrop"],
            "url": "https://twitter.com/erinsato/status/1790000000000000006"
        },
        {
            "id": "1790000000000000007", "rank": 7, "author": "Frank Ho", "handle": "frankho",
            "avatar": "https://pbs.twimg.com/profile_images/7/frank.jpg",
            "content": "Gas wars are back on mainnet",
            "views": "990", "likes": "12", "retweets": "3",
            "heatScore": 0.94, "tags": [],
            "url": "https://x.com/frankho/status/1790000000000000007"
        }
    ])
}

#[tokio::test]
async fn test_trends_end_to_end() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zh/tweets"))
        .and(query_param("group", "en"))
        .and(query_param("hours", "8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, headers, body) = get(app(&config(&upstream, None)), "/api/trends?group=en&hours=8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");

    let snapshot: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot["group"], "en");
    assert_eq!(snapshot["hours"], 8);
    assert!(snapshot["fetchedAt"].is_string());
    assert_eq!(snapshot["tweets"], expected_fixture_tweets());
    assert_eq!(
        snapshot["domainTags"],
        json!([{"name": "AI", "count": 42}, {"name": "Crypto", "count": 31}])
    );
    assert_eq!(
        snapshot["hotTags"],
        json!([{"name": "ETF", "count": 12}, {"name": "Solana Memes", "count": 7}])
    );
}

#[tokio::test]
async fn test_trends_repeat_runs_differ_only_in_timestamp() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
        .mount(&upstream)
        .await;

    let config = config(&upstream, None);
    let (_, _, first) = get(app(&config), "/api/trends?group=en&hours=8").await;
    let (_, _, second) = get(app(&config), "/api/trends?group=en&hours=8").await;

    let mut first: Value = serde_json::from_slice(&first).unwrap();
    let mut second: Value = serde_json::from_slice(&second).unwrap();
    first.as_object_mut().unwrap().remove("fetchedAt");
    second.as_object_mut().unwrap().remove("fetchedAt");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_trends_defaults() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("group", "cn"))
        .and(query_param("hours", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, _, body) = get(app(&config(&upstream, None)), "/api/trends").await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot["group"], "cn");
    assert_eq!(snapshot["hours"], 4);
    assert_eq!(snapshot["tweets"], json!([]));
}

#[tokio::test]
async fn test_trends_upstream_failure_is_500() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;

    let (status, _, body) = get(app(&config(&upstream, None)), "/api/trends?group=en").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error, json!({"error": "Failed to fetch: 503 Service Unavailable"}));
}

#[tokio::test]
async fn test_writing_advice_requires_credentials() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let (status, _, body) = post_json(
        app(&config(&upstream, None)),
        "/api/writing-advice",
        r#"{"mode":"topics"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "AI_API_KEY not configured");
}

#[tokio::test]
async fn test_writing_advice_rejects_malformed_body() {
    let upstream = MockServer::start().await;
    let app = app(&config(&upstream, Some("sk-test")));

    let (status, _, body) = post_json(app.clone(), "/api/writing-advice", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "Invalid JSON");

    let (status, _, body) = post_json(app, "/api/writing-advice", r#"{"mode":"article"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "topic required");
}

#[tokio::test]
async fn test_writing_advice_streams_upstream_bytes() {
    let upstream = MockServer::start().await;
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"1. ETF flows\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header_eq("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gemini-2.5-pro",
            "stream": true,
            "max_tokens": 4096
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .expect(1)
        .mount(&upstream)
        .await;

    let request = json!({
        "mode": "topics",
        "tweets": [{"rank": 1, "author": "alice", "content": "ETF inflows", "views": "1K", "likes": "2", "heatScore": 0.9, "tags": []}],
        "domainTags": [], "hotTags": [], "group": "en", "hours": 8
    });
    let (status, headers, body) = post_json(
        app(&config(&upstream, Some("sk-test"))),
        "/api/writing-advice",
        &request.to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(String::from_utf8(body).unwrap(), sse);
}

#[tokio::test]
async fn test_writing_advice_upstream_error_is_relayed() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "gemini-3-flash-preview"})))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"error":{"message":"invalid key"}}"#),
        )
        .mount(&upstream)
        .await;

    let (status, _, body) = post_json(
        app(&config(&upstream, Some("sk-bad"))),
        "/api/writing-advice",
        r#"{"mode":"article","topic":"ETF flows","format":"short","model":"gemini-3-flash-preview"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], r#"{"error":{"message":"invalid key"}}"#);
}

#[tokio::test]
async fn test_tweet_preview() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .and(query_param("url", "https://twitter.com/i/status/1790000000000000001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "author_name": "Alice Chen",
            "html": "<blockquote><p>Bitcoin ETF inflows hit a new weekly record</p>&mdash; Alice Chen (@alice) <a href=\"https://twitter.com/alice/status/1790000000000000001\">May 1, 2025</a></blockquote>"
        })))
        .mount(&upstream)
        .await;

    let (status, headers, body) = get(
        app(&config(&upstream, None)),
        "/api/tweet-preview?id=1790000000000000001",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
    let preview: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        preview,
        json!({
            "text": "Bitcoin ETF inflows hit a new weekly record— Alice Chen (@alice)",
            "author": "Alice Chen"
        })
    );
}

#[tokio::test]
async fn test_tweet_preview_errors() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&upstream)
        .await;
    let app = app(&config(&upstream, None));

    let (status, _, _) = get(app.clone(), "/api/tweet-preview?id=12ab").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(app.clone(), "/api/tweet-preview").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = get(app, "/api/tweet-preview?id=42").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "oEmbed 404");
}

#[tokio::test]
async fn test_models_and_health() {
    let upstream = MockServer::start().await;
    let app = app(&config(&upstream, None));

    let (status, _, body) = get(app.clone(), "/api/models").await;
    assert_eq!(status, StatusCode::OK);
    let models: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(models["default"], "gemini-2.5-pro");
    assert!(models["models"].as_array().unwrap().len() > 1);

    let (status, _, _) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
}
