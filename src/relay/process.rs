// Subprocess relay: spawn the tool, wait for audio, then pipe stdout to the client.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::command::stream_args;
use super::stats::RelayStats;
use super::stderr::{classify_stderr, ToolFailure};
use super::tool::Tool;
use crate::detect::container::detect_container;
use crate::error::RelayError;
use crate::video::VideoId;

/// How long to wait for stderr to drain after the tool exits without output.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for the tool to exit once its stdout has closed.
const EXIT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes gathered before sniffing the container.
const SNIFF_LEN: usize = 12;

type FailureSlot = Arc<Mutex<Option<ToolFailure>>>;

/// An audio stream whose first bytes have already arrived.
pub struct AudioStream {
    pub content_type: &'static str,
    pub body: BoxStream<'static, io::Result<Bytes>>,
}

pub struct StreamRelay {
    tool: Arc<Tool>,
    stats: Arc<RelayStats>,
}

impl StreamRelay {
    pub fn new(tool: Arc<Tool>, stats: Arc<RelayStats>) -> Self {
        Self { tool, stats }
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Spawn the tool for `video` and hold the response until audio bytes arrive.
    ///
    /// Errors before the first byte map onto an HTTP status. After that the
    /// headers are committed, so later failures only end the body.
    pub async fn open(&self, video: &VideoId) -> Result<AudioStream, RelayError> {
        let config = self.tool.config();
        let args = stream_args(video, config, self.tool.cookies().map(|p| p.as_path()));
        let mut cmd = self.tool.command(args).await?;
        cmd.stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().context("spawn yt-dlp")?;
        info!("yt-dlp started for {} (pid {:?})", video, child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("yt-dlp stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("yt-dlp stderr not captured"))?;

        let failure: FailureSlot = Arc::new(Mutex::new(None));
        let stderr_task = tokio::spawn(watch_stderr(stderr, video.clone(), failure.clone()));

        let mut reader = ReaderStream::new(stdout);
        let timeout = config.first_byte_timeout();
        let first = match tokio::time::timeout(timeout, read_header(&mut reader)).await {
            Ok(Ok(bytes)) if !bytes.is_empty() => bytes,
            Ok(Ok(_)) => {
                self.stats.record_failure();
                let status = wait_bounded(&mut child, video).await;
                let _ = tokio::time::timeout(STDERR_DRAIN_TIMEOUT, stderr_task).await;
                let reason = failure.lock().take().unwrap_or_else(|| match status {
                    Some(code) if code.success() => {
                        ToolFailure::Error("no audio data produced".to_string())
                    }
                    Some(code) => ToolFailure::Exit(code.code()),
                    None => ToolFailure::Error("stdout closed without audio".to_string()),
                });
                warn!("yt-dlp failed for {} before any output: {}", video, reason);
                return Err(RelayError::Tool(reason));
            }
            Ok(Err(e)) => {
                self.stats.record_failure();
                return Err(anyhow!(e).context("read yt-dlp stdout").into());
            }
            Err(_) => {
                self.stats.record_failure();
                warn!(
                    "yt-dlp produced nothing for {} within {:?}, killing",
                    video, timeout
                );
                let _ = child.start_kill();
                return Err(RelayError::Timeout(timeout.as_secs()));
            }
        };

        let format = detect_container(&first);
        debug!(
            "first chunk for {}: {} bytes, container {:?}",
            video,
            first.len(),
            format
        );

        self.stats.stream_started();
        self.stats.record_relayed(first.len() as u64);

        let pump = Pump {
            reader,
            child,
            video: video.clone(),
            stats: self.stats.clone(),
            finished: false,
        };

        let body = stream::once(async move { Ok::<Bytes, io::Error>(first) })
            .chain(stream::unfold(pump, Pump::next_chunk))
            .boxed();

        Ok(AudioStream {
            content_type: format.mime_type(),
            body,
        })
    }
}

/// Owns the child for the lifetime of the response body.
struct Pump {
    reader: ReaderStream<ChildStdout>,
    child: Child,
    video: VideoId,
    stats: Arc<RelayStats>,
    finished: bool,
}

impl Pump {
    async fn next_chunk(mut self) -> Option<(io::Result<Bytes>, Self)> {
        match self.reader.next().await {
            Some(Ok(bytes)) => {
                self.stats.record_relayed(bytes.len() as u64);
                Some((Ok(bytes), self))
            }
            Some(Err(e)) => {
                warn!("reading yt-dlp stdout for {} failed: {}", self.video, e);
                Some((Err(e), self))
            }
            None => {
                match wait_bounded(&mut self.child, &self.video).await {
                    Some(status) if status.success() => {
                        info!("yt-dlp finished for {}", self.video);
                    }
                    Some(status) => {
                        self.stats.record_failure();
                        warn!("yt-dlp exited with {} for {}", status, self.video);
                    }
                    None => self.stats.record_failure(),
                }
                self.finished = true;
                None
            }
        }
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        if !self.finished {
            info!("client disconnected from {}, stopping yt-dlp", self.video);
            if let Err(e) = self.child.start_kill() {
                debug!("kill yt-dlp for {}: {}", self.video, e);
            }
        }
        self.stats.stream_finished();
    }
}

/// Read until [`SNIFF_LEN`] bytes have arrived or stdout ends. Empty means EOF.
async fn read_header(reader: &mut ReaderStream<ChildStdout>) -> io::Result<Bytes> {
    let mut header = BytesMut::new();
    while header.len() < SNIFF_LEN {
        match reader.next().await {
            Some(chunk) => header.extend_from_slice(&chunk?),
            None => break,
        }
    }
    Ok(header.freeze())
}

/// Wait for the tool after stdout closed; kill it if it lingers.
async fn wait_bounded(child: &mut Child, video: &VideoId) -> Option<std::process::ExitStatus> {
    match tokio::time::timeout(EXIT_WAIT_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            warn!("waiting on yt-dlp for {} failed: {}", video, e);
            None
        }
        Err(_) => {
            warn!(
                "yt-dlp for {} still running {:?} after closing stdout, killing",
                video, EXIT_WAIT_TIMEOUT
            );
            if let Err(e) = child.start_kill() {
                debug!("kill yt-dlp for {}: {}", video, e);
            }
            None
        }
    }
}

async fn watch_stderr(stderr: ChildStderr, video: VideoId, failure: FailureSlot) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                warn!("yt-dlp stderr [{}]: {}", video, line);
                if let Some(f) = classify_stderr(&line) {
                    let mut slot = failure.lock();
                    if slot.is_none() {
                        *slot = Some(f);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("stderr read for {} ended: {}", video, e);
                break;
            }
        }
    }
}
