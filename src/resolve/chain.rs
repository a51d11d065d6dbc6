use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use super::traits::{AudioResolver, ResolvedAudio};
use crate::video::VideoId;

/// Tries each resolver in order and returns the first success.
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn AudioResolver>>,
}

impl ResolverChain {
    pub fn new(resolvers: Vec<Arc<dyn AudioResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl AudioResolver for ResolverChain {
    async fn resolve(&self, video: &VideoId) -> Result<ResolvedAudio> {
        let mut last_err = anyhow!("no resolvers configured");
        for resolver in &self.resolvers {
            match resolver.resolve(video).await {
                Ok(audio) => {
                    info!("resolved {} via {}", video, resolver.name());
                    return Ok(audio);
                }
                Err(e) => {
                    warn!("resolver {} failed for {}: {:#}", resolver.name(), video, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn name(&self) -> String {
        let names: Vec<String> = self.resolvers.iter().map(|r| r.name()).collect();
        format!("chain[{}]", names.join(","))
    }
}
