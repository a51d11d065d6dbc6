use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Turn an environment-supplied cookie blob into Netscape cookie-file text.
///
/// Hosting dashboards often flatten multi-line values, so literal `\n`
/// escapes are expanded into real newlines.
pub fn normalize_cookies(raw: &str) -> String {
    let mut text = raw.replace("\\n", "\n").replace("\r\n", "\n");
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Write `raw` to `path`, creating the parent directory if needed.
pub fn write_cookie_file(path: &Path, raw: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create cookie dir {}", parent.display()))?;
    }
    fs::write(path, normalize_cookies(raw))
        .with_context(|| format!("write cookie file {}", path.display()))
}

/// Materialise the cookie file for the extraction tool.
///
/// Returns the path the tool should be pointed at, if any.
pub fn setup_cookies(path: &Path, raw: Option<&str>) -> Option<PathBuf> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => match write_cookie_file(path, raw) {
            Ok(()) => {
                info!("youtube cookies loaded into {}", path.display());
                Some(path.to_path_buf())
            }
            Err(e) => {
                warn!("cookie setup failed: {:#}", e);
                None
            }
        },
        _ => {
            if path.is_file() {
                info!("using existing cookie file {}", path.display());
                Some(path.to_path_buf())
            } else {
                None
            }
        }
    }
}
