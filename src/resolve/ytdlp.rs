use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::traits::{is_absolute_http, AudioResolver, ResolvedAudio};
use crate::detect::container::ContainerFormat;
use crate::relay::command::resolve_args;
use crate::relay::tool::Tool;
use crate::video::VideoId;

/// The subset of `yt-dlp -j` output describing the selected format.
#[derive(Deserialize)]
struct FormatInfo {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ext: Option<String>,
}

/// Resolve through the local extraction tool without downloading.
pub struct YtDlpResolver {
    tool: Arc<Tool>,
}

impl YtDlpResolver {
    pub fn new(tool: Arc<Tool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl AudioResolver for YtDlpResolver {
    async fn resolve(&self, video: &VideoId) -> Result<ResolvedAudio> {
        let args = resolve_args(
            video,
            self.tool.config(),
            self.tool.cookies().map(|p| p.as_path()),
        );
        let stdout = self.tool.run(args).await?;
        parse_format_info(&stdout)
    }

    fn name(&self) -> String {
        "yt-dlp".to_string()
    }
}

pub fn parse_format_info(json: &[u8]) -> Result<ResolvedAudio> {
    let info: FormatInfo = serde_json::from_slice(json).context("parse yt-dlp -j output")?;
    let url = info
        .url
        .filter(|u| is_absolute_http(u))
        .ok_or_else(|| anyhow!("yt-dlp selected a format without a direct url"))?;
    let mime_type = ContainerFormat::from_extension(info.ext.as_deref().unwrap_or(""))
        .mime_type()
        .to_string();
    Ok(ResolvedAudio { url, mime_type })
}
