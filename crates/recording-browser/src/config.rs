//! Configuration loading and parsing.
//!
//! Defines the TOML schema and resolves defaults into the immutable values
//! handed to [`crate::state::AppState`].

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::listing::{AudioClassifier, DEFAULT_AUDIO_EXTENSIONS};
use crate::transcode::{DEFAULT_CHUNK_SIZE, OutputFormat, TranscodeProfile};

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Top-level server configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Root directory of the served recordings.
    pub media_dir: Option<String>,
    /// Path segment the API is mounted under, e.g. `/recordings`.
    pub url_prefix: Option<String>,
    /// Case-sensitive allowlist of audio extensions.
    pub audio_extensions: Option<Vec<String>>,
    /// Decoder settings for the live stream endpoint.
    pub transcode: Option<TranscodeConfig>,
}

/// Transcode settings from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct TranscodeConfig {
    /// Decoder executable (default `ffmpeg`).
    pub decoder: Option<String>,
    /// Output channel count (default 1).
    pub channels: Option<u16>,
    /// Output sample rate in Hz (default 16000).
    pub sample_rate: Option<u32>,
    /// Output format (only `mp3`).
    pub format: Option<String>,
    /// Encoder bitrate in kbit/s.
    pub bitrate_kbps: Option<u32>,
    /// Bytes per streamed chunk.
    pub chunk_size: Option<usize>,
    /// Hard cap on a decoder's lifetime in seconds; 0 disables it.
    pub max_duration_secs: Option<u64>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Parse the bind address, falling back to [`DEFAULT_BIND`].
pub fn bind_from_config(cfg: &ServerConfig) -> Result<SocketAddr> {
    let bind = cfg.bind.as_deref().unwrap_or(DEFAULT_BIND);
    bind.parse().with_context(|| format!("parse bind {bind}"))
}

/// Extract the media directory from config.
pub fn media_dir_from_config(cfg: &ServerConfig) -> Result<PathBuf> {
    let dir = cfg
        .media_dir
        .as_deref()
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .ok_or_else(|| anyhow::anyhow!("media_dir is required (config or --media-dir)"))?;
    Ok(PathBuf::from(dir))
}

/// Normalize a mount prefix to `""` or `/segment[/segment..]`.
pub fn normalize_url_prefix(raw: &str) -> String {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    }
}

pub fn url_prefix_from_config(cfg: &ServerConfig) -> String {
    cfg.url_prefix
        .as_deref()
        .map(normalize_url_prefix)
        .unwrap_or_default()
}

/// Build the audio classifier, defaulting to the built-in allowlist.
pub fn audio_classifier_from_config(cfg: &ServerConfig) -> AudioClassifier {
    match cfg.audio_extensions.as_ref() {
        Some(exts) if !exts.is_empty() => AudioClassifier::new(exts.iter().cloned()),
        _ => AudioClassifier::new(DEFAULT_AUDIO_EXTENSIONS.iter().copied()),
    }
}

/// Validate transcode settings and build the fixed output profile.
pub fn transcode_profile_from_config(cfg: &ServerConfig) -> Result<TranscodeProfile> {
    let defaults = TranscodeProfile::default();
    let Some(tc) = cfg.transcode.as_ref() else {
        return Ok(defaults);
    };

    let decoder = tc
        .decoder
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or(defaults.decoder);
    let channels = tc.channels.unwrap_or(defaults.channels);
    if channels == 0 {
        return Err(anyhow::anyhow!("transcode.channels must be at least 1"));
    }
    let sample_rate = tc.sample_rate.unwrap_or(defaults.sample_rate);
    if sample_rate == 0 {
        return Err(anyhow::anyhow!("transcode.sample_rate must be positive"));
    }
    let format = match tc.format.as_deref() {
        Some(raw) => OutputFormat::parse(raw)
            .ok_or_else(|| anyhow::anyhow!("unsupported transcode.format {raw:?}"))?,
        None => defaults.format,
    };
    let chunk_size = tc.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
    if chunk_size == 0 {
        return Err(anyhow::anyhow!("transcode.chunk_size must be positive"));
    }
    let max_duration = tc
        .max_duration_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    Ok(TranscodeProfile {
        decoder,
        channels,
        sample_rate,
        format,
        bitrate_kbps: tc.bitrate_kbps.filter(|kbps| *kbps > 0),
        chunk_size,
        max_duration,
    })
}
