//! Error types shared across StoryReel crates.

use std::path::PathBuf;

/// Top-level error type for StoryReel operations.
///
/// The variants follow the job error taxonomy: required-input problems are
/// client errors, engine problems are server errors.
#[derive(Debug, thiserror::Error)]
pub enum StoryreelError {
    #[error("Required input missing: {field}")]
    InputMissing { field: String },

    #[error("Failed to fetch {locator}: {message}")]
    AssetFetchFailed { locator: String, message: String },

    #[error("Asset {locator} is invalid: {reason}")]
    AssetInvalid { locator: String, reason: String },

    #[error("Timeline infeasible: {message}")]
    TimelineInfeasible { message: String },

    #[error("Recoverable engine failure ({feature}): {message}")]
    EngineRecoverable { feature: String, message: String },

    #[error("Engine failure: {message}")]
    EngineFatal { message: String },

    #[error("Renderer busy: another job is in progress")]
    Busy,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Render plan error: {message}")]
    Plan { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StoryreelError.
pub type StoryreelResult<T> = Result<T, StoryreelError>;

impl StoryreelError {
    pub fn input_missing(field: impl Into<String>) -> Self {
        Self::InputMissing {
            field: field.into(),
        }
    }

    pub fn fetch_failed(locator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::AssetFetchFailed {
            locator: locator.into(),
            message: msg.into(),
        }
    }

    pub fn asset_invalid(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetInvalid {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    pub fn timeline(msg: impl Into<String>) -> Self {
        Self::TimelineInfeasible {
            message: msg.into(),
        }
    }

    pub fn engine_fatal(msg: impl Into<String>) -> Self {
        Self::EngineFatal {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn plan(msg: impl Into<String>) -> Self {
        Self::Plan {
            message: msg.into(),
        }
    }

    /// Stable machine-readable kind, reported as `errorKind` to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputMissing { .. } => "InputMissing",
            Self::AssetFetchFailed { .. } => "AssetFetchFailed",
            Self::AssetInvalid { .. } => "AssetInvalid",
            Self::TimelineInfeasible { .. } => "TimelineInfeasible",
            Self::EngineRecoverable { .. } => "EngineRecoverable",
            Self::EngineFatal { .. } => "EngineFatal",
            Self::Busy => "Busy",
            Self::Config { .. } => "Config",
            Self::Plan { .. } => "Plan",
            Self::FileNotFound { .. } => "FileNotFound",
            Self::Io(_) => "Io",
            Self::Json(_) => "Json",
            Self::Other(_) => "Internal",
        }
    }

    /// Whether the failure is attributable to the request (4xx-equivalent).
    ///
    /// Fetch and validation failures only reach callers for required inputs,
    /// so they count as client errors here.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InputMissing { .. }
                | Self::AssetFetchFailed { .. }
                | Self::AssetInvalid { .. }
                | Self::TimelineInfeasible { .. }
        )
    }

    /// Whether the caller should retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// HTTP-equivalent status for transports that need one.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Busy => 503,
            Self::InputMissing { .. } => 400,
            e if e.is_client_error() => 422,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_input_errors_are_client_errors() {
        assert!(StoryreelError::input_missing("narrationAudio").is_client_error());
        assert!(StoryreelError::timeline("story duration is zero").is_client_error());
        assert!(!StoryreelError::engine_fatal("boom").is_client_error());
        assert!(!StoryreelError::Busy.is_client_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(StoryreelError::Busy.status_code(), 503);
        assert_eq!(StoryreelError::engine_fatal("x").status_code(), 500);
        assert_eq!(StoryreelError::input_missing("images").status_code(), 400);
        assert_eq!(StoryreelError::timeline("negative").status_code(), 422);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(StoryreelError::input_missing("x").kind(), "InputMissing");
        assert_eq!(
            StoryreelError::EngineRecoverable {
                feature: "overlay".into(),
                message: "decode".into()
            }
            .kind(),
            "EngineRecoverable"
        );
    }
}
