//! Asset validation.
//!
//! A blob is accepted only if it looks like what its kind promises: stills
//! must decode, audio must carry a known audio container signature and probe
//! to a positive duration, overlays must carry a known video container and a
//! video stream.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use storyreel_common::error::StoryreelError;
use storyreel_job_model::{MediaKind, MediaRef, ValidatedAsset};

use crate::probe::MediaProbe;

/// Leading bytes read from audio and video files; enough for every signature.
pub const SNIFF_LEN: u64 = 64;

/// Container families recognized by signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Mp3,
    Wav,
    Ogg,
    Flac,
    /// ISO base media (`ftyp` box): mp4, m4a, mov.
    IsoBmff,
    /// Raw AAC with ADTS headers.
    Adts,
    /// Matroska or WebM.
    Matroska,
    Avi,
}

impl ContainerFormat {
    pub fn carries_audio(self) -> bool {
        !matches!(self, ContainerFormat::Avi)
    }

    pub fn carries_video(self) -> bool {
        matches!(
            self,
            ContainerFormat::IsoBmff | ContainerFormat::Matroska | ContainerFormat::Avi
        )
    }
}

/// Identify a container from its leading bytes.
pub fn sniff_container(bytes: &[u8]) -> Option<ContainerFormat> {
    if bytes.len() < 4 {
        return None;
    }
    if bytes.starts_with(b"ID3") {
        return Some(ContainerFormat::Mp3);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" {
        return match &bytes[8..12] {
            b"WAVE" => Some(ContainerFormat::Wav),
            b"AVI " => Some(ContainerFormat::Avi),
            _ => None,
        };
    }
    if bytes.starts_with(b"OggS") {
        return Some(ContainerFormat::Ogg);
    }
    if bytes.starts_with(b"fLaC") {
        return Some(ContainerFormat::Flac);
    }
    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(ContainerFormat::Matroska);
    }
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        return Some(ContainerFormat::IsoBmff);
    }
    if bytes[0] == 0xFF {
        // ADTS: 12-bit sync, layer bits 00.
        if bytes[1] & 0xF6 == 0xF0 {
            return Some(ContainerFormat::Adts);
        }
        // MPEG audio frame sync (11 bits set).
        if bytes[1] & 0xE0 == 0xE0 {
            return Some(ContainerFormat::Mp3);
        }
    }
    None
}

/// Why an asset was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} asset {locator} rejected: {reason}")]
pub struct InvalidAsset {
    pub kind: MediaKind,
    pub locator: String,
    pub reason: String,
}

impl InvalidAsset {
    fn new(media: &MediaRef, reason: impl Into<String>) -> Self {
        Self {
            kind: media.kind,
            locator: media.locator.clone(),
            reason: reason.into(),
        }
    }
}

impl From<InvalidAsset> for StoryreelError {
    fn from(err: InvalidAsset) -> Self {
        StoryreelError::asset_invalid(err.locator, err.reason)
    }
}

/// Checks fetched media against what its kind requires.
#[derive(Clone)]
pub struct AssetValidator {
    probe: Arc<dyn MediaProbe>,
}

impl AssetValidator {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    /// Validate already-read bytes of a materialized media reference.
    pub fn validate(&self, media: &MediaRef, bytes: &[u8]) -> Result<ValidatedAsset, InvalidAsset> {
        let path = media
            .local_path
            .clone()
            .ok_or_else(|| InvalidAsset::new(media, "media was never materialized"))?;

        if bytes.is_empty() {
            return Err(InvalidAsset::new(media, "file is empty"));
        }

        if media.kind.is_still() {
            let (w, h) = decode_still(bytes).map_err(|reason| InvalidAsset::new(media, reason))?;
            return Ok(ValidatedAsset::new(media.clone(), path, None, Some((w, h))));
        }

        let container = sniff_container(bytes)
            .ok_or_else(|| InvalidAsset::new(media, "unrecognized container signature"))?;

        let wants_video = media.kind == MediaKind::Overlay;
        if wants_video && !container.carries_video() {
            return Err(InvalidAsset::new(
                media,
                format!("{container:?} is not a video container"),
            ));
        }
        if !wants_video && !container.carries_audio() {
            return Err(InvalidAsset::new(
                media,
                format!("{container:?} is not an audio container"),
            ));
        }

        let report = self
            .probe
            .probe(&path)
            .map_err(|e| InvalidAsset::new(media, e.to_string()))?;

        if wants_video && report.video_streams == 0 {
            return Err(InvalidAsset::new(media, "no video stream"));
        }
        if !wants_video && report.audio_streams == 0 {
            return Err(InvalidAsset::new(media, "no audio stream"));
        }

        let duration = report
            .positive_duration()
            .ok_or_else(|| InvalidAsset::new(media, "duration is missing or not positive"))?;

        let dimensions = match (report.width, report.height) {
            (Some(w), Some(h)) if wants_video => Some((w, h)),
            _ => None,
        };

        Ok(ValidatedAsset::new(
            media.clone(),
            path,
            Some(duration),
            dimensions,
        ))
    }

    /// Read the materialized file and validate it.
    ///
    /// Stills are read whole for decoding. Audio and video only need their
    /// signature, so just the first [`SNIFF_LEN`] bytes are read.
    pub fn validate_file(&self, media: &MediaRef) -> Result<ValidatedAsset, InvalidAsset> {
        let path: &Path = media
            .local_path
            .as_deref()
            .ok_or_else(|| InvalidAsset::new(media, "media was never materialized"))?;
        let bytes = if media.kind.is_still() {
            std::fs::read(path)
        } else {
            read_head(path, SNIFF_LEN)
        }
        .map_err(|e| InvalidAsset::new(media, format!("read {}: {e}", path.display())))?;
        self.validate(media, &bytes)
    }
}

fn read_head(path: &Path, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(limit as usize);
    std::fs::File::open(path)?.take(limit).read_to_end(&mut head)?;
    Ok(head)
}

fn decode_still(bytes: &[u8]) -> Result<(u32, u32), String> {
    let img = image::load_from_memory(bytes).map_err(|e| format!("image decode failed: {e}"))?;
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(format!("image has degenerate size {w}x{h}"));
    }
    Ok((w, h))
}
