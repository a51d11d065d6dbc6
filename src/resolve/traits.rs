use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::video::VideoId;

/// A time-limited direct media URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAudio {
    pub url: String,
    pub mime_type: String,
}

#[async_trait]
pub trait AudioResolver: Send + Sync {
    async fn resolve(&self, video: &VideoId) -> Result<ResolvedAudio>;

    /// Label used in logs.
    fn name(&self) -> String;
}

/// Only absolute http(s) URLs are handed back to clients.
pub fn is_absolute_http(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
