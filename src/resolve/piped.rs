// Piped-compatible API client: `/streams/{id}` returns direct audio stream URLs.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::traits::{is_absolute_http, AudioResolver, ResolvedAudio};
use crate::config::UPSTREAM_HTTP_TIMEOUT;
use crate::video::VideoId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsResponse {
    #[serde(default)]
    audio_streams: Vec<AudioStreamEntry>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioStreamEntry {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    bitrate: Option<u64>,
}

pub struct PipedResolver {
    client: Client,
    base: String,
}

impl PipedResolver {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AudioResolver for PipedResolver {
    async fn resolve(&self, video: &VideoId) -> Result<ResolvedAudio> {
        let url = format!("{}/streams/{}", self.base, video);
        let resp = self
            .client
            .get(&url)
            .timeout(UPSTREAM_HTTP_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("request {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            warn!("resolver {} status={} for {}", self.base, status.as_u16(), video);
            return Err(anyhow!("{} answered HTTP {}", self.base, status.as_u16()));
        }

        let body: StreamsResponse = resp
            .json()
            .await
            .with_context(|| format!("decode {} response", self.base))?;
        if let Some(err) = body.error {
            return Err(anyhow!("{} reported: {}", self.base, err));
        }

        let picked = pick_best_audio(body.audio_streams)
            .ok_or_else(|| anyhow!("{} returned no usable audio streams", self.base))?;
        debug!("resolver {} picked {} for {}", self.base, picked.mime_type, video);
        Ok(picked)
    }

    fn name(&self) -> String {
        format!("piped:{}", self.base)
    }
}

/// Highest-bitrate entry with an absolute URL.
fn pick_best_audio(entries: Vec<AudioStreamEntry>) -> Option<ResolvedAudio> {
    entries
        .into_iter()
        .filter_map(|e| {
            let url = e.url.filter(|u| is_absolute_http(u))?;
            let mime_type = e
                .mime_type
                .filter(|m| m.starts_with("audio/"))
                .unwrap_or_else(|| "audio/mp4".to_string());
            Some((e.bitrate.unwrap_or(0), ResolvedAudio { url, mime_type }))
        })
        .max_by_key(|(bitrate, _)| *bitrate)
        .map(|(_, audio)| audio)
}
