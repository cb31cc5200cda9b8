//! Media references and validated assets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What role a piece of media plays in a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// One still image per scene.
    Image,
    /// The narration track; its duration drives the whole output.
    Narration,
    /// Theme-selected background audio loop.
    Ambience,
    /// Theme-selected decorative video loop.
    Overlay,
    /// Closing still shown after the narrated scenes.
    EndCard,
}

impl MediaKind {
    /// Whether a failure to obtain this media fails the job.
    pub fn is_required(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Narration)
    }

    /// Whether the validator should treat the blob as audio.
    pub fn is_audio(self) -> bool {
        matches!(self, MediaKind::Narration | MediaKind::Ambience)
    }

    /// Whether the validator should treat the blob as a still image.
    pub fn is_still(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::EndCard)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Narration => "narration",
            MediaKind::Ambience => "ambience",
            MediaKind::Overlay => "overlay",
            MediaKind::EndCard => "end_card",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical reference to a piece of media.
///
/// Created at request intake, materialized by download, discarded with the
/// job's working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Role of the media.
    pub kind: MediaKind,

    /// Source locator (URL, `file://` URL, or filesystem path).
    pub locator: String,

    /// Local path once fetched.
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl MediaRef {
    pub fn new(kind: MediaKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
            local_path: None,
        }
    }

    /// Record where the media was materialized.
    pub fn materialized(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn is_materialized(&self) -> bool {
        self.local_path.is_some()
    }

    /// Best-effort file extension from the locator, used to name local copies.
    pub fn extension_hint(&self) -> Option<&str> {
        let tail = self
            .locator
            .split(&['?', '#'][..])
            .next()
            .unwrap_or(&self.locator);
        let name = tail.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext)
    }
}

/// A media reference that passed validation.
///
/// Only the asset validator produces these, so holding one means the media
/// is safe to reference from a render plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedAsset {
    media: MediaRef,
    path: PathBuf,
    duration_secs: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
}

impl ValidatedAsset {
    /// Construct a validated asset. Callers are expected to be validators.
    pub fn new(
        media: MediaRef,
        path: PathBuf,
        duration_secs: Option<f64>,
        dimensions: Option<(u32, u32)>,
    ) -> Self {
        Self {
            media,
            path,
            duration_secs,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
        }
    }

    pub fn media(&self) -> &MediaRef {
        &self.media
    }

    pub fn kind(&self) -> MediaKind {
        self.media.kind
    }

    pub fn locator(&self) -> &str {
        &self.media.locator
    }

    /// Local materialized path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probed duration for audio and video assets.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// Pixel dimensions for stills and video.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((self.width?, self.height?))
    }
}

/// The validated optional assets available to a job.
#[derive(Debug, Clone, Default)]
pub struct OptionalAssets {
    pub ambience: Option<ValidatedAsset>,
    pub overlay: Option<ValidatedAsset>,
    pub end_card: Option<ValidatedAsset>,
}

/// Everything a render plan may reference.
#[derive(Debug, Clone)]
pub struct JobAssets {
    /// One validated image per scene, in scene order.
    pub images: Vec<ValidatedAsset>,

    /// The validated narration track.
    pub narration: ValidatedAsset,

    /// Optional decorative assets.
    pub optional: OptionalAssets,
}

impl JobAssets {
    /// Narration duration; validation guarantees it is positive.
    pub fn narration_secs(&self) -> f64 {
        self.narration.duration_secs().unwrap_or(0.0)
    }
}
