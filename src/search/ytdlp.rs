use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{format_timestamp, thumbnail_url, watch_url, SearchBackend, SearchItem};
use crate::relay::command::search_args;
use crate::relay::tool::Tool;

#[derive(Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

#[derive(Deserialize)]
struct FlatEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// Search through the extraction tool's `ytsearchN:` pseudo-URL.
pub struct YtDlpSearch {
    tool: Arc<Tool>,
}

impl YtDlpSearch {
    pub fn new(tool: Arc<Tool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl SearchBackend for YtDlpSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchItem>> {
        let stdout = self
            .tool
            .run(search_args(query, limit, self.tool.config()))
            .await?;
        parse_flat_playlist(&stdout, limit)
    }

    fn name(&self) -> &'static str {
        "ytdlp"
    }
}

pub fn parse_flat_playlist(json: &[u8], limit: usize) -> Result<Vec<SearchItem>> {
    let playlist: FlatPlaylist =
        serde_json::from_slice(json).context("parse yt-dlp search output")?;

    Ok(playlist
        .entries
        .into_iter()
        .map(|e| SearchItem {
            title: e.title.unwrap_or_default(),
            thumbnail: thumbnail_url(&e.id),
            url: watch_url(&e.id),
            duration: e
                .duration
                .filter(|d| d.is_finite() && *d >= 0.0)
                .map(|d| format_timestamp(d.round() as u64))
                .unwrap_or_default(),
            author: e.channel.or(e.uploader).unwrap_or_default(),
        })
        .filter(SearchItem::is_complete)
        .take(limit)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_playlist() {
        let json = br#"{
            "_type": "playlist",
            "entries": [
                {"id": "aaaaaaaaaaa", "title": "One", "channel": "Chan", "duration": 225.0},
                {"id": "bbbbbbbbbbb", "title": "Two", "uploader": "Up", "duration": null},
                {"id": "ccccccccccc", "title": null}
            ]
        }"#;
        let items = parse_flat_playlist(json, 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].duration, "3:45");
        assert_eq!(items[0].author, "Chan");
        assert_eq!(items[0].url, "https://youtube.com/watch?v=aaaaaaaaaaa");
        assert_eq!(items[1].duration, "");
        assert_eq!(items[1].author, "Up");
    }

    #[test]
    fn test_parse_flat_playlist_rejects_garbage() {
        assert!(parse_flat_playlist(b"not json", 10).is_err());
    }
}
