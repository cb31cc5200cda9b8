//! Media probing through `ffprobe`.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use storyreel_common::error::{StoryreelError, StoryreelResult};

/// What a probe learned about a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    /// Container-level duration, falling back to the longest stream.
    pub duration_secs: Option<f64>,
    pub video_streams: usize,
    pub audio_streams: usize,
    /// Dimensions of the first video stream.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format_name: Option<String>,
}

impl ProbeReport {
    /// Duration if finite and strictly positive.
    pub fn positive_duration(&self) -> Option<f64> {
        self.duration_secs.filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// Inspects a materialized media file.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> StoryreelResult<ProbeReport>;
}

/// Probe backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Whether the probe binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> StoryreelResult<ProbeReport> {
        let out = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                StoryreelError::asset_invalid(
                    path.display().to_string(),
                    format!("failed to run {}: {e}", self.binary),
                )
            })?;

        if !out.status.success() {
            return Err(StoryreelError::asset_invalid(
                path.display().to_string(),
                format!(
                    "ffprobe failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            ));
        }

        parse_ffprobe_json(&out.stdout).map_err(|e| {
            StoryreelError::asset_invalid(path.display().to_string(), e.to_string())
        })
    }
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_ffprobe_json(raw: &[u8]) -> Result<ProbeReport, serde_json::Error> {
    let parsed: ProbeOut = serde_json::from_slice(raw)?;

    let stream_duration = parsed
        .streams
        .iter()
        .filter_map(|s| s.duration.as_deref().and_then(parse_secs))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));
    let format_duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_secs);

    let first_video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(ProbeReport {
        duration_secs: format_duration.or(stream_duration),
        video_streams: count_streams(&parsed.streams, "video"),
        audio_streams: count_streams(&parsed.streams, "audio"),
        width: first_video.and_then(|s| s.width),
        height: first_video.and_then(|s| s.height),
        format_name: parsed.format.and_then(|f| f.format_name),
    })
}

fn count_streams(streams: &[ProbeStream], codec_type: &str) -> usize {
    streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some(codec_type))
        .count()
}

fn parse_secs(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|d| d.is_finite())
}
