// Integration tests for the RelayServer routes backed by fake upstreams.

use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use yt_audio_relay::config::RelayConfig;
use yt_audio_relay::relay::tool::Tool;
use yt_audio_relay::resolve::chain::ResolverChain;
use yt_audio_relay::resolve::piped::PipedResolver;
use yt_audio_relay::resolve::traits::AudioResolver;
use yt_audio_relay::search::traits::SearchItem;
use yt_audio_relay::search::web::WebSearch;
use yt_audio_relay::server::handler::RelayServer;
use yt_audio_relay::server::state::AppState;

#[derive(Deserialize)]
struct ResultsQuery {
    search_query: String,
}

/// Fake results page: 12 videos plus one untitled renderer, embedded as `ytInitialData`.
async fn fake_results_page(Query(q): Query<ResultsQuery>) -> impl IntoResponse {
    let mut contents: Vec<Value> = vec![json!({ "videoRenderer": { "videoId": "untitled000" } })];
    for i in 0..12 {
        contents.push(json!({
            "videoRenderer": {
                "videoId": format!("vid{:08}", i),
                "title": { "runs": [{ "text": format!("{} #{}", q.search_query, i) }] },
                "lengthText": { "simpleText": "4:20" },
                "ownerText": { "runs": [{ "text": "Fake Channel" }] },
            }
        }));
    }
    let data = json!({
        "contents": { "twoColumnSearchResultsRenderer": { "primaryContents": {
            "sectionListRenderer": { "contents": [
                { "itemSectionRenderer": { "contents": contents } }
            ]}
        }}}
    });
    Html(format!(
        "<html><body><script>var ytInitialData = {};</script><script>var other = {{}};</script></body></html>",
        data
    ))
}

async fn fake_streams(Path(id): Path<String>) -> impl IntoResponse {
    Json(json!({
        "title": "Fake",
        "audioStreams": [
            { "url": format!("https://cdn.example/{}/low", id), "mimeType": "audio/mp4", "bitrate": 48000 },
            { "url": format!("https://cdn.example/{}/high", id), "mimeType": "audio/webm", "bitrate": 160000 },
        ]
    }))
}

async fn missing_streams() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

async fn start_upstream() -> String {
    let app = Router::new()
        .route("/results", get(fake_results_page))
        .route("/good/streams/{id}", get(fake_streams))
        .route("/bad/streams/{id}", get(missing_streams));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://127.0.0.1:{}", port)
}

async fn start_relay(upstream: &str, resolver_bases: &[&str]) -> RelayServer {
    let dir = std::env::temp_dir().join("yt-audio-relay-server-test");
    let config = RelayConfig {
        tool_dir: dir,
        ..RelayConfig::default()
    };
    let tool = Arc::new(Tool::new(config, None, None));
    let client = reqwest::Client::new();

    let search = WebSearch::with_results_url(client.clone(), format!("{}/results", upstream));
    let resolvers: Vec<Arc<dyn AudioResolver>> = resolver_bases
        .iter()
        .map(|base| {
            Arc::new(PipedResolver::new(client.clone(), format!("{}{}", upstream, base)))
                as Arc<dyn AudioResolver>
        })
        .collect();

    let state = AppState::new(tool, Arc::new(search), Arc::new(ResolverChain::new(resolvers)));
    RelayServer::start("127.0.0.1:0".parse().unwrap(), state)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_search_returns_top_ten() {
    let upstream = start_upstream().await;
    let server = start_relay(&upstream, &[]).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(server.url_for("/search"))
        .query(&[("q", "lofi beats")])
        .header(header::ORIGIN.as_str(), "http://localhost:5173")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let items: Vec<SearchItem> = resp.json().await.unwrap();
    assert_eq!(items.len(), 10);
    for item in &items {
        assert!(!item.title.is_empty());
        assert!(item.url.starts_with("https://youtube.com/watch?v="));
        assert_eq!(item.duration, "4:20");
        assert_eq!(item.author, "Fake Channel");
    }
    assert_eq!(items[0].title, "lofi beats #0");
    assert_eq!(
        items[0].thumbnail,
        "https://i.ytimg.com/vi/vid00000000/hqdefault.jpg"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_search_requires_query() {
    let upstream = start_upstream().await;
    let server = start_relay(&upstream, &[]).await;
    let client = reqwest::Client::new();

    let absent = client.get(server.url_for("/search")).send().await.unwrap();
    assert_eq!(absent.status(), 400);
    let body: Value = absent.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("q"));

    let blank = client
        .get(server.url_for("/search?q=%20%20"))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status(), 400);

    server.shutdown().await;
}

#[tokio::test]
async fn test_search_upstream_failure_is_server_error() {
    let upstream = start_upstream().await;
    let dir = std::env::temp_dir();
    let tool = Arc::new(Tool::new(
        RelayConfig {
            tool_dir: dir,
            ..RelayConfig::default()
        },
        None,
        None,
    ));
    // No such route on the fake upstream: 404.
    let search = WebSearch::with_results_url(reqwest::Client::new(), format!("{}/nope", upstream));
    let state = AppState::new(
        tool,
        Arc::new(search),
        Arc::new(ResolverChain::new(Vec::new())),
    );
    let server = RelayServer::start("127.0.0.1:0".parse().unwrap(), state)
        .await
        .unwrap();

    let resp = reqwest::get(server.url_for("/search?q=anything")).await.unwrap();
    assert_eq!(resp.status(), 500);

    server.shutdown().await;
}

#[tokio::test]
async fn test_get_audio_url_falls_back_between_instances() {
    let upstream = start_upstream().await;
    let server = start_relay(&upstream, &["/bad", "/good"]).await;

    let resp = reqwest::get(server.url_for(
        "/get-audio-url?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ",
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["url"], "https://cdn.example/dQw4w9WgXcQ/high");
    assert_eq!(body["mimeType"], "audio/webm");

    server.shutdown().await;
}

#[tokio::test]
async fn test_get_audio_url_errors() {
    let upstream = start_upstream().await;
    let server = start_relay(&upstream, &["/bad"]).await;
    let client = reqwest::Client::new();

    let missing = client
        .get(server.url_for("/get-audio-url"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);

    let malformed = client
        .get(server.url_for("/get-audio-url?url=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);

    let failed = client
        .get(server.url_for("/get-audio-url?url=dQw4w9WgXcQ"))
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), 500);
    let body: Value = failed.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("HTTP 404"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_get_audio_url_unreachable_resolver() {
    // Bind then drop a listener so the port refuses connections.
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port())
    };
    let server = start_relay(&closed, &[""]).await;

    let resp = reqwest::get(server.url_for("/get-audio-url?url=dQw4w9WgXcQ"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    server.shutdown().await;
}
