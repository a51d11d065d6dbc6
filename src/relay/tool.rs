use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::stderr::{classify_stderr, ToolFailure};
use crate::config::{RelayConfig, TOOL_RUN_TIMEOUT};
use crate::error::RelayError;
use crate::provision::binary;

/// Minimum gap between two reinstall attempts.
const REINSTALL_COOLDOWN: Duration = Duration::from_secs(60);

/// Reinstalls the tool when its file disappears at runtime.
struct Reinstaller {
    client: Client,
    /// Serializes attempts so concurrent requests share one download.
    running: tokio::sync::Mutex<()>,
    last_attempt: Mutex<Option<Instant>>,
}

/// Handle on the installed extraction tool, shared by every route.
pub struct Tool {
    binary: RwLock<Option<PathBuf>>,
    cookies: Option<PathBuf>,
    config: RelayConfig,
    reinstaller: Option<Reinstaller>,
}

impl Tool {
    pub fn new(config: RelayConfig, binary: Option<PathBuf>, cookies: Option<PathBuf>) -> Self {
        Self {
            binary: RwLock::new(binary),
            cookies,
            config,
            reinstaller: None,
        }
    }

    /// Provision the tool again through `client` when it goes missing.
    pub fn with_reinstall(mut self, client: Client) -> Self {
        self.reinstaller = Some(Reinstaller {
            client,
            running: tokio::sync::Mutex::new(()),
            last_attempt: Mutex::new(None),
        });
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn cookies(&self) -> Option<&PathBuf> {
        self.cookies.as_ref()
    }

    /// Current binary path, if one was provisioned and is still on disk.
    pub fn binary(&self) -> Option<PathBuf> {
        let path = self.binary.read().clone()?;
        // The managed copy may be wiped from /tmp while we run.
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    /// Binary path, reinstalling first if it went missing and reinstall is enabled.
    pub async fn locate(&self) -> Option<PathBuf> {
        if let Some(path) = self.binary() {
            return Some(path);
        }
        let reinstaller = self.reinstaller.as_ref()?;
        let _running = reinstaller.running.lock().await;

        // Another request may have finished the job while we waited.
        if let Some(path) = self.binary() {
            return Some(path);
        }
        {
            let mut last = reinstaller.last_attempt.lock();
            if last.is_some_and(|at| at.elapsed() < REINSTALL_COOLDOWN) {
                debug!("yt-dlp reinstall attempted recently, skipping");
                return None;
            }
            *last = Some(Instant::now());
        }

        warn!("yt-dlp binary missing, provisioning again");
        let path = binary::provision(&reinstaller.client, &self.config).await;
        match &path {
            Some(p) => info!("yt-dlp available again at {}", p.display()),
            None => warn!("yt-dlp reinstall failed"),
        }
        *self.binary.write() = path.clone();
        path
    }

    /// Build a command for the tool. Fails with 503 when no binary is installed.
    pub async fn command(&self, args: Vec<OsString>) -> Result<Command, RelayError> {
        let binary = self.locate().await.ok_or(RelayError::BinaryUnavailable)?;
        debug!("spawning {} {:?}", binary.display(), args);
        let mut cmd = Command::new(binary);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        Ok(cmd)
    }

    /// Run the tool to completion and return its stdout.
    pub async fn run(&self, args: Vec<OsString>) -> Result<Vec<u8>, RelayError> {
        let mut cmd = self.command(args).await?;
        let output = tokio::time::timeout(TOOL_RUN_TIMEOUT, cmd.output())
            .await
            .map_err(|_| RelayError::Timeout(TOOL_RUN_TIMEOUT.as_secs()))?
            .context("run yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                warn!("yt-dlp stderr: {}", line);
            }
            let failure = stderr
                .lines()
                .find_map(classify_stderr)
                .unwrap_or(ToolFailure::Exit(output.status.code()));
            return Err(RelayError::Tool(failure));
        }

        Ok(output.stdout)
    }
}
