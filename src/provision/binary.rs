// Extraction tool provisioning: reuse, download with fallbacks, or fall back to PATH.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{RelayConfig, BINARY_DOWNLOAD_TIMEOUT, MIN_BINARY_BYTES};

/// A binary counts as installed only when it is larger than [`MIN_BINARY_BYTES`].
pub fn binary_is_present(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > MIN_BINARY_BYTES)
        .unwrap_or(false)
}

/// Download one candidate into `dest`. Returns the number of bytes written.
pub async fn download_binary(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    let resp = client
        .get(url)
        .timeout(BINARY_DOWNLOAD_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("request {}", url))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!("download failed: HTTP {}", status.as_u16()));
    }

    let body = resp.bytes().await.context("read download body")?;
    let len = body.len() as u64;
    if len <= MIN_BINARY_BYTES {
        return Err(anyhow!(
            "download too small: {} bytes (expected > {})",
            len,
            MIN_BINARY_BYTES
        ));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }

    // Write beside the target and rename so a half-written file is never picked up.
    let part = dest.with_extension("part");
    fs::write(&part, &body).with_context(|| format!("write {}", part.display()))?;
    make_executable(&part)?;
    fs::rename(&part, dest).with_context(|| format!("rename into {}", dest.display()))?;

    Ok(len)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Make sure an extraction tool exists at `dest`, downloading from `sources` in order.
pub async fn ensure_binary<S: AsRef<str>>(
    client: &Client,
    dest: &Path,
    sources: &[S],
) -> Result<PathBuf> {
    if binary_is_present(dest) {
        info!("yt-dlp present at {}", dest.display());
        return Ok(dest.to_path_buf());
    }

    let mut last_err = anyhow!("no download sources configured");
    for source in sources {
        let url = source.as_ref();
        info!("downloading yt-dlp from {}", url);
        match download_binary(client, url, dest).await {
            Ok(len) => {
                info!("yt-dlp installed at {} ({} bytes)", dest.display(), len);
                return Ok(dest.to_path_buf());
            }
            Err(e) => {
                warn!("yt-dlp download from {} failed: {:#}", url, e);
                last_err = e;
            }
        }
    }

    Err(last_err)
}

/// Look for an executable named `name` on `PATH`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Same as [`find_on_path`] but against an explicit search list.
pub fn find_in<P: AsRef<OsStr>>(name: &str, paths: P) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    which::which_in(name, Some(paths), cwd).ok()
}

/// Startup provisioning: managed download first, then whatever is on `PATH`.
///
/// Returns `None` when no tool could be found; the server still starts.
pub async fn provision(client: &Client, config: &RelayConfig) -> Option<PathBuf> {
    let dest = config.binary_path();
    match ensure_binary(client, &dest, &config.binary_sources).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("managed yt-dlp unavailable: {:#}", e);
            let file_name = dest.file_name()?.to_str()?;
            match find_on_path(file_name) {
                Some(path) => {
                    info!("falling back to yt-dlp on PATH: {}", path.display());
                    Some(path)
                }
                None => {
                    debug!("no {} on PATH", file_name);
                    None
                }
            }
        }
    }
}
