//! Optional render features and feature sets.

use serde::{Deserialize, Serialize};

/// An optional part of a render plan that can be dropped on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Overlay,
    Ambience,
    EndCard,
    Crossfade,
    Motion,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::Overlay,
        Feature::Ambience,
        Feature::EndCard,
        Feature::Crossfade,
        Feature::Motion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Overlay => "overlay",
            Feature::Ambience => "ambience",
            Feature::EndCard => "end_card",
            Feature::Crossfade => "crossfade",
            Feature::Motion => "motion",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flag vector of optional features included in a render plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    pub overlay: bool,
    pub ambience: bool,
    pub end_card: bool,
    pub crossfade: bool,
    pub motion: bool,
}

impl FeatureSet {
    /// Every feature enabled.
    pub const FULL: FeatureSet = FeatureSet {
        overlay: true,
        ambience: true,
        end_card: true,
        crossfade: true,
        motion: true,
    };

    /// Scenes only: straight cuts, no motion, no decoration.
    pub const MINIMAL: FeatureSet = FeatureSet {
        overlay: false,
        ambience: false,
        end_card: false,
        crossfade: false,
        motion: false,
    };

    pub fn has(&self, feature: Feature) -> bool {
        match feature {
            Feature::Overlay => self.overlay,
            Feature::Ambience => self.ambience,
            Feature::EndCard => self.end_card,
            Feature::Crossfade => self.crossfade,
            Feature::Motion => self.motion,
        }
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        match feature {
            Feature::Overlay => self.overlay = enabled,
            Feature::Ambience => self.ambience = enabled,
            Feature::EndCard => self.end_card = enabled,
            Feature::Crossfade => self.crossfade = enabled,
            Feature::Motion => self.motion = enabled,
        }
    }

    /// Copy of this set with one feature removed.
    pub fn without(mut self, feature: Feature) -> Self {
        self.set(feature, false);
        self
    }

    /// Features present in both sets.
    pub fn intersect(self, other: FeatureSet) -> Self {
        FeatureSet {
            overlay: self.overlay && other.overlay,
            ambience: self.ambience && other.ambience,
            end_card: self.end_card && other.end_card,
            crossfade: self.crossfade && other.crossfade,
            motion: self.motion && other.motion,
        }
    }

    /// Whether every feature in `self` is also in `other`.
    pub fn is_subset_of(&self, other: &FeatureSet) -> bool {
        Feature::ALL
            .iter()
            .all(|f| !self.has(*f) || other.has(*f))
    }

    /// Enabled features, in declaration order.
    pub fn enabled(&self) -> Vec<Feature> {
        Feature::ALL.into_iter().filter(|f| self.has(*f)).collect()
    }
}

impl std::fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.enabled().into_iter().map(Feature::as_str).collect();
        if names.is_empty() {
            f.write_str("minimal")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_and_subset() {
        let full = FeatureSet::FULL;
        let no_overlay = full.without(Feature::Overlay);
        assert!(!no_overlay.overlay);
        assert!(no_overlay.is_subset_of(&full));
        assert!(!full.is_subset_of(&no_overlay));
        assert!(FeatureSet::MINIMAL.is_subset_of(&no_overlay));
    }

    #[test]
    fn test_display() {
        assert_eq!(FeatureSet::MINIMAL.to_string(), "minimal");
        let set = FeatureSet {
            ambience: true,
            motion: true,
            ..FeatureSet::MINIMAL
        };
        assert_eq!(set.to_string(), "ambience+motion");
    }

    #[test]
    fn test_intersect() {
        let available = FeatureSet {
            overlay: false,
            ..FeatureSet::FULL
        };
        let set = FeatureSet::FULL.intersect(available);
        assert!(!set.overlay);
        assert!(set.ambience && set.crossfade && set.motion && set.end_card);
    }
}
