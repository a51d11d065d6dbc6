// Axum request handlers for the relay routes.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use super::state::AppState;
use crate::config::SEARCH_RESULT_LIMIT;
use crate::error::RelayError;
use crate::relay::stats::StatsSnapshot;
use crate::resolve::traits::{is_absolute_http, ResolvedAudio};
use crate::search::traits::SearchItem;
use crate::video::VideoId;

pub struct RelayServer {
    addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RelayServer {
    /// Bind `addr` and serve the relay routes in the background.
    pub async fn start(addr: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = router(state);

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                warn!("relay server stopped with error: {}", e);
            }
        });

        info!("relay listening on {}", addr);
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Build a loopback URL for `path_and_query` on this server.
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port(), path_and_query)
    }

    /// Stop accepting connections and wait for in-flight requests to drain.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!("relay server task failed: {}", e);
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/search", get(search_handler))
        .route("/stream", get(stream_handler))
        .route("/get-audio-url", get(audio_url_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoParams {
    url: Option<String>,
}

fn video_from(params: &VideoParams) -> Result<VideoId, RelayError> {
    match params.url.as_deref() {
        Some(raw) => VideoId::parse(raw),
        None => Err(RelayError::MissingParam("url")),
    }
}

/// GET /search?q= returns the top results from the configured backend.
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchItem>>, RelayError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(RelayError::MissingParam("q"))?;

    let mut items = state
        .search
        .search(query, SEARCH_RESULT_LIMIT)
        .await
        .map_err(|e| {
            warn!("search {:?} via {} failed: {:#}", query, state.search.name(), e);
            RelayError::from_backend(e)
        })?;
    items.retain(SearchItem::is_complete);
    items.truncate(SEARCH_RESULT_LIMIT);

    debug!("search {:?} -> {} items", query, items.len());
    Ok(Json(items))
}

/// GET /stream?url= relays the tool's stdout as the response body.
async fn stream_handler(
    State(state): State<AppState>,
    Query(params): Query<VideoParams>,
) -> Result<Response, RelayError> {
    let video = video_from(&params)?;
    info!("stream request for {}", video);

    let stream = state.relay.open(&video).await?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(stream.content_type)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Body::from_stream(stream.body),
    )
        .into_response())
}

/// GET /get-audio-url?url= resolves a direct CDN URL without relaying bytes.
async fn audio_url_handler(
    State(state): State<AppState>,
    Query(params): Query<VideoParams>,
) -> Result<Json<ResolvedAudio>, RelayError> {
    let video = video_from(&params)?;

    let audio = state
        .resolver
        .resolve(&video)
        .await
        .map_err(RelayError::from_backend)?;

    if !is_absolute_http(&audio.url) {
        return Err(RelayError::Upstream(format!(
            "resolver returned a non-absolute url for {}",
            video
        )));
    }
    Ok(Json(audio))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub binary: bool,
    pub cookies: bool,
    pub stats: StatsSnapshot,
}

/// GET /health reports tool availability and relay counters.
async fn health_handler(State(state): State<AppState>) -> Json<HealthBody> {
    let binary = state.tool.binary().is_some();
    Json(HealthBody {
        status: if binary { "ok" } else { "degraded" }.to_string(),
        binary,
        cookies: state.tool.cookies().is_some(),
        stats: state.relay.stats().snapshot(),
    })
}
