use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Port used when `PORT` is absent or unparsable.
pub const DEFAULT_PORT: u16 = 3000;

/// A downloaded binary smaller than this is treated as truncated (1 MB).
pub const MIN_BINARY_BYTES: u64 = 1_000_000;

/// Maximum number of results returned by `/search`.
pub const SEARCH_RESULT_LIMIT: usize = 10;

/// Seconds to wait for the extraction tool's first output byte.
pub const DEFAULT_FIRST_BYTE_TIMEOUT_SECS: u64 = 30;

/// Timeout for a single binary download attempt.
pub const BINARY_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for one-shot tool runs (search listing, URL resolution).
pub const TOOL_RUN_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for search pages and resolver API calls.
pub const UPSTREAM_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub const DEFAULT_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio/best";
pub const DEFAULT_PLAYER_CLIENT: &str = "tv_embedded";

pub const COOKIES_FILE_NAME: &str = "cookies.txt";

#[cfg(windows)]
pub const BINARY_FILE_NAME: &str = "yt-dlp.exe";
#[cfg(not(windows))]
pub const BINARY_FILE_NAME: &str = "yt-dlp";

/// Download sources for the extraction tool, tried in order.
#[cfg(windows)]
pub const BINARY_DOWNLOAD_URLS: &[&str] = &[
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe",
    "https://github.com/yt-dlp/yt-dlp-nightly-builds/releases/latest/download/yt-dlp.exe",
];
#[cfg(target_os = "linux")]
pub const BINARY_DOWNLOAD_URLS: &[&str] = &[
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_linux",
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp",
    "https://github.com/yt-dlp/yt-dlp-nightly-builds/releases/latest/download/yt-dlp",
];
#[cfg(all(not(windows), not(target_os = "linux")))]
pub const BINARY_DOWNLOAD_URLS: &[&str] = &[
    "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp",
    "https://github.com/yt-dlp/yt-dlp-nightly-builds/releases/latest/download/yt-dlp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendKind {
    /// Scrape the public results page.
    Web,
    /// Ask the extraction tool (`ytsearchN:`).
    Ytdlp,
}

/// Top-level configuration for the relay server.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Directory holding the extraction tool and the cookie file.
    pub tool_dir: PathBuf,
    /// Raw cookie-file content, possibly with literal `\n` escapes.
    pub cookies: Option<String>,
    /// `-f` format selector passed to the tool.
    pub format: String,
    /// `youtube:player_client=` value; empty disables the flag.
    pub player_client: String,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    /// Base URLs of Piped-compatible APIs used by `/get-audio-url`.
    pub resolver_apis: Vec<String>,
    pub first_byte_timeout_secs: u64,
    pub search_backend: SearchBackendKind,
    /// Download sources for the managed tool, tried in order.
    pub binary_sources: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            tool_dir: default_tool_dir(),
            cookies: None,
            format: DEFAULT_FORMAT.to_string(),
            player_client: DEFAULT_PLAYER_CLIENT.to_string(),
            proxy: None,
            user_agent: None,
            resolver_apis: Vec::new(),
            first_byte_timeout_secs: DEFAULT_FIRST_BYTE_TIMEOUT_SECS,
            search_backend: SearchBackendKind::Web,
            binary_sources: BINARY_DOWNLOAD_URLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RelayConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_blank("PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("invalid PORT {:?}, using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => defaults.port,
        };

        let host = match non_blank("HOST") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("invalid HOST {:?}, using {}", raw, defaults.host);
                defaults.host
            }),
            None => defaults.host,
        };

        let first_byte_timeout_secs = match non_blank("FIRST_BYTE_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    warn!(
                        "invalid FIRST_BYTE_TIMEOUT_SECS {:?}, using {}",
                        raw, DEFAULT_FIRST_BYTE_TIMEOUT_SECS
                    );
                    DEFAULT_FIRST_BYTE_TIMEOUT_SECS
                }
            },
            None => defaults.first_byte_timeout_secs,
        };

        let search_backend = match non_blank("SEARCH_BACKEND").as_deref().map(str::trim) {
            Some("ytdlp") | Some("yt-dlp") => SearchBackendKind::Ytdlp,
            Some("web") | None => SearchBackendKind::Web,
            Some(other) => {
                warn!("unknown SEARCH_BACKEND {:?}, using web", other);
                SearchBackendKind::Web
            }
        };

        let resolver_apis = non_blank("RESOLVER_API_URLS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let binary_sources = non_blank("YTDLP_DOWNLOAD_URLS")
            .map(|raw| split_list(&raw))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.binary_sources);

        Self {
            host,
            port,
            tool_dir: non_blank("YTDLP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.tool_dir),
            // Cookies are raw file content; keep whitespace as given.
            cookies: non_blank("YOUTUBE_COOKIES"),
            format: non_blank("YTDLP_FORMAT").unwrap_or(defaults.format),
            // An explicitly empty value turns the extractor flag off.
            player_client: lookup("YTDLP_PLAYER_CLIENT")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.player_client),
            proxy: non_blank("YTDLP_PROXY"),
            user_agent: non_blank("YTDLP_USER_AGENT"),
            resolver_apis,
            first_byte_timeout_secs,
            search_backend,
            binary_sources,
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.tool_dir.join(BINARY_FILE_NAME)
    }

    pub fn cookies_path(&self) -> PathBuf {
        self.tool_dir.join(COOKIES_FILE_NAME)
    }

    pub fn first_byte_timeout(&self) -> Duration {
        Duration::from_secs(self.first_byte_timeout_secs)
    }
}

/// Comma-separated URL list; blanks dropped, trailing `/` trimmed.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Windows keeps the tool next to the working directory; elsewhere it lives in the temp dir.
fn default_tool_dir() -> PathBuf {
    if cfg!(windows) {
        env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        env::temp_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> RelayConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.format, DEFAULT_FORMAT);
        assert_eq!(config.player_client, "tv_embedded");
        assert!(config.cookies.is_none());
        assert!(config.resolver_apis.is_empty());
        assert_eq!(config.search_backend, SearchBackendKind::Web);
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = config_from(&[("PORT", "not-a-port")]);
        assert_eq!(config.port, DEFAULT_PORT);

        let config = config_from(&[("PORT", "8080")]);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_resolver_list_is_split_and_trimmed() {
        let config = config_from(&[(
            "RESOLVER_API_URLS",
            " https://a.example/ ,,https://b.example",
        )]);
        assert_eq!(
            config.resolver_apis,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_download_sources_override() {
        let config = config_from(&[]);
        assert_eq!(config.binary_sources.len(), BINARY_DOWNLOAD_URLS.len());

        let config = config_from(&[("YTDLP_DOWNLOAD_URLS", "http://mirror.local/yt-dlp, ")]);
        assert_eq!(config.binary_sources, vec!["http://mirror.local/yt-dlp".to_string()]);
    }

    #[test]
    fn test_empty_player_client_disables_flag() {
        let config = config_from(&[("YTDLP_PLAYER_CLIENT", "")]);
        assert_eq!(config.player_client, "");
    }

    #[test]
    fn test_paths_live_in_tool_dir() {
        let config = config_from(&[("YTDLP_DIR", "/opt/relay")]);
        assert_eq!(config.binary_path(), PathBuf::from("/opt/relay").join(BINARY_FILE_NAME));
        assert_eq!(config.cookies_path(), PathBuf::from("/opt/relay/cookies.txt"));
    }
}
