//! Inbound render requests.

use serde::{Deserialize, Serialize};

use crate::media::{MediaKind, MediaRef};

/// Output aspect ratio accepted by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "16:9" => Some(AspectRatio::Landscape),
            "9:16" => Some(AspectRatio::Portrait),
            _ => None,
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw request as received from a transport (JSON body or file).
///
/// Every field is optional at this level so that a missing field can be
/// reported precisely instead of as a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    #[serde(default)]
    pub job_id: Option<String>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub narration_audio: Option<String>,

    #[serde(default)]
    pub aspect_ratio: Option<String>,

    #[serde(default)]
    pub theme: Option<String>,

    #[serde(default)]
    pub use_end_card: Option<bool>,
}

/// Request validation failures. All of them are reported before any
/// download is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("missing required field `{0}`")]
    Missing(&'static str),

    #[error("unsupported aspect ratio `{0}` (expected 16:9 or 9:16)")]
    UnsupportedAspect(String),
}

impl RequestError {
    /// The request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            RequestError::Missing(field) => field,
            RequestError::UnsupportedAspect(_) => "aspectRatio",
        }
    }
}

/// A request whose required fields are all present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: String,
    pub images: Vec<MediaRef>,
    pub narration: MediaRef,
    pub aspect_ratio: AspectRatio,
    pub theme: Option<String>,
    pub use_end_card: bool,
}

impl RenderRequest {
    /// Parse a request from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Check required fields and produce a job specification.
    pub fn validate(&self) -> Result<JobSpec, RequestError> {
        let job_id = non_blank(self.job_id.as_deref()).ok_or(RequestError::Missing("jobId"))?;

        let narration = non_blank(self.narration_audio.as_deref())
            .ok_or(RequestError::Missing("narrationAudio"))?;

        // A blank entry is a missing image, not one to skip.
        let images = self
            .images
            .iter()
            .map(|raw| {
                non_blank(Some(raw)).map(|locator| MediaRef::new(MediaKind::Image, locator))
            })
            .collect::<Option<Vec<MediaRef>>>()
            .filter(|images| !images.is_empty())
            .ok_or(RequestError::Missing("images"))?;

        let raw_aspect =
            non_blank(self.aspect_ratio.as_deref()).ok_or(RequestError::Missing("aspectRatio"))?;
        let aspect_ratio = AspectRatio::parse(raw_aspect)
            .ok_or_else(|| RequestError::UnsupportedAspect(raw_aspect.to_string()))?;

        Ok(JobSpec {
            job_id: job_id.to_string(),
            images,
            narration: MediaRef::new(MediaKind::Narration, narration),
            aspect_ratio,
            theme: non_blank(self.theme.as_deref()).map(str::to_string),
            use_end_card: self.use_end_card.unwrap_or(false),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
