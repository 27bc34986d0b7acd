//! Live transcoding through an external decoder process.
//!
//! One [`TranscodeSession`] owns one decoder child and its stdout pipe. Chunks
//! are pulled only when the consumer asks for the next one, so a stalled
//! client stops reads from the pipe and the decoder blocks on its own output.
//! The session kills the child on every exit path: explicit close, drop
//! (client disconnect), read failure, or the optional hard deadline.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use actix_web::web::Bytes;
use futures_util::{Stream, StreamExt, stream};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::Instant;
use tokio_util::io::ReaderStream;

use crate::error::BrowseError;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// How long a decoder may linger after closing its stdout before it is killed.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// Container/codec written by the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Mp3,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mp3" => Some(OutputFormat::Mp3),
            _ => None,
        }
    }

    /// Value passed to the decoder's `-f` flag.
    pub fn muxer(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "audio/mpeg",
        }
    }
}

/// Fixed output profile applied to every transcode.
#[derive(Clone, Debug)]
pub struct TranscodeProfile {
    /// Decoder executable (name on `PATH` or absolute path).
    pub decoder: PathBuf,
    pub channels: u16,
    pub sample_rate: u32,
    pub format: OutputFormat,
    pub bitrate_kbps: Option<u32>,
    /// Bytes read from the pipe per chunk.
    pub chunk_size: usize,
    /// Hard cap on a session's lifetime.
    pub max_duration: Option<Duration>,
}

impl Default for TranscodeProfile {
    fn default() -> Self {
        Self {
            decoder: PathBuf::from("ffmpeg"),
            channels: 1,
            sample_rate: 16_000,
            format: OutputFormat::Mp3,
            bitrate_kbps: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_duration: None,
        }
    }
}

impl TranscodeProfile {
    /// Decoder arguments for `input`: downmix, resample, encode to stdout.
    pub fn decoder_args(&self, input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "quiet", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_os_string());
        args.push("-vn".into());
        args.push("-ac".into());
        args.push(self.channels.to_string().into());
        args.push("-ar".into());
        args.push(self.sample_rate.to_string().into());
        if let Some(kbps) = self.bitrate_kbps {
            args.push("-b:a".into());
            args.push(format!("{kbps}k").into());
        }
        args.push("-f".into());
        args.push(self.format.muxer().into());
        args.push("pipe:1".into());
        args
    }

    fn decoder_name(&self) -> String {
        self.decoder.to_string_lossy().into_owned()
    }
}

/// A running decoder bound to one response body.
pub struct TranscodeSession {
    input: PathBuf,
    child: Child,
    output: Option<ReaderStream<ChildStdout>>,
    deadline: Option<Instant>,
    pid: Option<u32>,
    bytes_sent: u64,
    reaped: bool,
}

/// Validate `file` and spawn a decoder for it.
///
/// Missing paths and non-regular files fail with `NotFound` before anything
/// is spawned; a decoder that cannot be started yields `TranscodeUnavailable`.
pub async fn open_transcode_stream(
    file: &Path,
    profile: &TranscodeProfile,
) -> Result<TranscodeSession, BrowseError> {
    let meta = tokio::fs::metadata(file).await.map_err(BrowseError::from_io)?;
    if !meta.is_file() {
        return Err(BrowseError::NotFound);
    }

    let mut child = Command::new(&profile.decoder)
        .args(profile.decoder_args(file))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| BrowseError::TranscodeUnavailable {
            decoder: profile.decoder_name(),
            reason: err.to_string(),
        })?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| BrowseError::TranscodeUnavailable {
            decoder: profile.decoder_name(),
            reason: "decoder stdout was not captured".to_string(),
        })?;
    let pid = child.id();
    tracing::info!(pid = ?pid, input = %file.display(), "transcode started");

    Ok(TranscodeSession {
        input: file.to_path_buf(),
        child,
        output: Some(ReaderStream::with_capacity(stdout, profile.chunk_size.max(1))),
        deadline: profile.max_duration.map(|limit| Instant::now() + limit),
        pid,
        bytes_sent: 0,
        reaped: false,
    })
}

impl TranscodeSession {
    /// OS process id of the decoder, if it is still known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Pull the next chunk from the decoder.
    ///
    /// Returns `None` once the decoder's output is exhausted or the session
    /// was terminated. A decoder failure just ends the sequence.
    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        let output = self.output.as_mut()?;
        let next = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, output.next()).await.ok(),
            None => Some(output.next().await),
        };
        let Some(next) = next else {
            tracing::warn!(
                pid = ?self.pid,
                input = %self.input.display(),
                bytes_sent = self.bytes_sent,
                "transcode exceeded max duration; killing decoder"
            );
            self.terminate().await;
            return None;
        };

        match next {
            Some(Ok(chunk)) => {
                self.bytes_sent += chunk.len() as u64;
                Some(Ok(chunk))
            }
            Some(Err(err)) => {
                tracing::warn!(pid = ?self.pid, error = %err, "decoder pipe read failed");
                self.terminate().await;
                Some(Err(err))
            }
            None => {
                self.finish().await;
                None
            }
        }
    }

    /// Stop the decoder and release the pipe.
    pub async fn close(mut self) {
        if !self.reaped {
            tracing::info!(pid = ?self.pid, bytes_sent = self.bytes_sent, "transcode closed");
            self.terminate().await;
        }
    }

    /// Reap a decoder whose output reached EOF and report how it exited.
    async fn finish(&mut self) {
        self.output = None;
        match tokio::time::timeout(REAP_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.reaped = true;
                if status.success() && self.bytes_sent > 0 {
                    tracing::info!(
                        pid = ?self.pid,
                        bytes_sent = self.bytes_sent,
                        "transcode finished"
                    );
                } else {
                    tracing::warn!(
                        pid = ?self.pid,
                        input = %self.input.display(),
                        status = %status,
                        bytes_sent = self.bytes_sent,
                        "decoder failed; stream truncated"
                    );
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(pid = ?self.pid, error = %err, "failed to wait for decoder");
                self.terminate().await;
            }
            Err(_) => {
                tracing::warn!(pid = ?self.pid, "decoder closed its output but kept running");
                self.terminate().await;
            }
        }
    }

    async fn terminate(&mut self) {
        self.output = None;
        if let Err(err) = self.child.kill().await {
            tracing::debug!(pid = ?self.pid, error = %err, "decoder kill failed");
        }
        self.reaped = true;
    }
}

impl Drop for TranscodeSession {
    fn drop(&mut self) {
        self.output = None;
        if self.reaped {
            return;
        }
        tracing::info!(
            pid = ?self.pid,
            bytes_sent = self.bytes_sent,
            "transcode cancelled by consumer"
        );
        if let Err(err) = self.child.start_kill() {
            tracing::debug!(pid = ?self.pid, error = %err, "decoder kill on drop failed");
        }
    }
}

/// Adapt a session into a response body stream.
///
/// Dropping the stream (client disconnect) drops the session, which kills the
/// decoder.
pub fn into_body_stream(session: TranscodeSession) -> impl Stream<Item = io::Result<Bytes>> {
    stream::unfold(session, |mut session| async move {
        session.next_chunk().await.map(|chunk| (chunk, session))
    })
}
