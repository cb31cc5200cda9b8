//! Classified results of a single render attempt.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::features::Feature;

/// Result of executing exactly one render plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderOutcome {
    /// The engine exited cleanly and produced a non-trivial artifact.
    Success { artifact: PathBuf, bytes: u64 },

    /// The engine failed in a way attributable to one optional feature.
    Recoverable { feature: Feature, diagnostic: String },

    /// The engine failed for an unrecognized reason or left no artifact.
    Fatal { diagnostic: String },
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RenderOutcome::Success { .. })
    }

    /// Diagnostic text for failed attempts.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RenderOutcome::Success { .. } => None,
            RenderOutcome::Recoverable { diagnostic, .. } | RenderOutcome::Fatal { diagnostic } => {
                Some(diagnostic)
            }
        }
    }

    /// Short label for logs and attempt records.
    pub fn label(&self) -> &'static str {
        match self {
            RenderOutcome::Success { .. } => "success",
            RenderOutcome::Recoverable { .. } => "recoverable",
            RenderOutcome::Fatal { .. } => "fatal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let outcome = RenderOutcome::Recoverable {
            feature: Feature::Overlay,
            diagnostic: "moov atom not found".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "recoverable");
        assert_eq!(json["feature"], "overlay");
        assert_eq!(outcome.diagnostic(), Some("moov atom not found"));
        assert!(!outcome.is_success());
    }
}
