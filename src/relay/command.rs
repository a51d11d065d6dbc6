// Argument assembly for the extraction tool.

use std::ffi::OsString;
use std::path::Path;

use crate::config::RelayConfig;
use crate::video::VideoId;

/// Options shared by every invocation of the tool.
fn common_args(config: &RelayConfig, cookies: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--no-playlist".into(),
        "--no-warnings".into(),
        "--force-ipv4".into(),
    ];
    if !config.player_client.is_empty() {
        args.push("--extractor-args".into());
        args.push(format!("youtube:player_client={}", config.player_client).into());
    }
    if let Some(proxy) = &config.proxy {
        args.push("--proxy".into());
        args.push(proxy.into());
    }
    if let Some(ua) = &config.user_agent {
        args.push("--user-agent".into());
        args.push(ua.into());
    }
    if let Some(cookies) = cookies {
        args.push("--cookies".into());
        args.push(cookies.as_os_str().to_owned());
    }
    args
}

/// Arguments that write the selected audio format to stdout.
pub fn stream_args(video: &VideoId, config: &RelayConfig, cookies: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        video.watch_url().into(),
        "-f".into(),
        config.format.as_str().into(),
        "-o".into(),
        "-".into(),
        "--quiet".into(),
    ];
    args.extend(common_args(config, cookies));
    args
}

/// Arguments that print the selected format's metadata as JSON without downloading.
pub fn resolve_args(video: &VideoId, config: &RelayConfig, cookies: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        video.watch_url().into(),
        "-f".into(),
        config.format.as_str().into(),
        "-j".into(),
    ];
    args.extend(common_args(config, cookies));
    args
}

/// Arguments for a flat `ytsearchN:` listing.
pub fn search_args(query: &str, limit: usize, config: &RelayConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--flat-playlist".into(),
        "-J".into(),
        format!("ytsearch{}:{}", limit, query).into(),
    ];
    args.extend(common_args(config, None));
    args
}
