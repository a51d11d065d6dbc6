use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::config::SearchBackendKind;
use crate::relay::process::StreamRelay;
use crate::relay::stats::RelayStats;
use crate::relay::tool::Tool;
use crate::resolve::chain::ResolverChain;
use crate::resolve::piped::PipedResolver;
use crate::resolve::traits::AudioResolver;
use crate::resolve::ytdlp::YtDlpResolver;
use crate::search::traits::SearchBackend;
use crate::search::web::WebSearch;
use crate::search::ytdlp::YtDlpSearch;

/// Everything the route handlers share.
#[derive(Clone)]
pub struct AppState {
    pub tool: Arc<Tool>,
    pub search: Arc<dyn SearchBackend>,
    pub resolver: Arc<dyn AudioResolver>,
    pub relay: Arc<StreamRelay>,
}

impl AppState {
    /// Wire backends according to the tool's configuration.
    pub fn from_config(tool: Arc<Tool>, client: Client) -> Self {
        let config = tool.config();

        let search: Arc<dyn SearchBackend> = match config.search_backend {
            SearchBackendKind::Web => Arc::new(WebSearch::new(client.clone())),
            SearchBackendKind::Ytdlp => Arc::new(YtDlpSearch::new(tool.clone())),
        };

        let mut resolvers: Vec<Arc<dyn AudioResolver>> = config
            .resolver_apis
            .iter()
            .map(|base| Arc::new(PipedResolver::new(client.clone(), base.as_str())) as Arc<dyn AudioResolver>)
            .collect();
        resolvers.push(Arc::new(YtDlpResolver::new(tool.clone())));
        let chain = ResolverChain::new(resolvers);
        info!("search backend={} resolver={}", search.name(), chain.name());

        Self::new(tool, search, Arc::new(chain))
    }

    pub fn new(
        tool: Arc<Tool>,
        search: Arc<dyn SearchBackend>,
        resolver: Arc<dyn AudioResolver>,
    ) -> Self {
        let relay = Arc::new(StreamRelay::new(tool.clone(), Arc::new(RelayStats::new())));
        Self {
            tool,
            search,
            resolver,
            relay,
        }
    }
}
