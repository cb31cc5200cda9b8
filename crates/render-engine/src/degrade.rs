//! Degradation controller.
//!
//! Renders with every available feature first and strips decoration rung by
//! rung when the engine fails. Each rung re-plans the timeline and rebuilds
//! the plan from scratch; nothing from a failed attempt is reused.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_job_model::{Feature, FeatureSet, JobAssets, RenderOutcome, Timeline, TransitionStyle};
use storyreel_planner::TimelinePlanner;
use tracing::{info, warn};

use crate::builder::PlanBuilder;
use crate::ffmpeg::RenderEngine;
use crate::graph::RenderPlan;

/// One step of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rung {
    pub name: &'static str,
    pub features: FeatureSet,
}

const LADDER: [Rung; 4] = [
    Rung {
        name: "full",
        features: FeatureSet::FULL,
    },
    Rung {
        name: "no_overlay",
        features: FeatureSet {
            overlay: false,
            ..FeatureSet::FULL
        },
    },
    Rung {
        name: "no_ambience",
        features: FeatureSet {
            overlay: false,
            ambience: false,
            ..FeatureSet::FULL
        },
    },
    Rung {
        name: "minimal",
        features: FeatureSet::MINIMAL,
    },
];

/// The ladder restricted to `available`, with consecutive duplicates removed.
pub fn ladder(available: FeatureSet) -> Vec<Rung> {
    let mut rungs: Vec<Rung> = Vec::with_capacity(LADDER.len());
    for rung in LADDER {
        let features = rung.features.intersect(available);
        if rungs.last().map(|r| r.features) == Some(features) {
            continue;
        }
        rungs.push(Rung {
            name: rung.name,
            features,
        });
    }
    rungs
}

/// One engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub rung: String,
    pub features: FeatureSet,
    pub outcome: RenderOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// A successful render and how it was reached.
#[derive(Debug, Clone)]
pub struct DegradedRender {
    pub artifact: PathBuf,
    pub bytes: u64,
    pub rung: String,
    pub features: FeatureSet,
    pub timeline: Timeline,
    pub attempts: Vec<AttemptRecord>,
}

impl DegradedRender {
    /// Whether any decoration was dropped to get here.
    pub fn is_degraded(&self) -> bool {
        self.attempts.len() > 1
    }
}

/// A rung's timeline and plan, without running anything.
#[derive(Debug, Clone)]
pub struct RungPreview {
    pub rung: Rung,
    pub timeline: Timeline,
    pub plan: RenderPlan,
}

/// Drives the ladder against a [`RenderEngine`].
pub struct DegradationController {
    planner: TimelinePlanner,
    builder: PlanBuilder,
    engine: Arc<dyn RenderEngine>,
    end_card_secs: f64,
}

impl DegradationController {
    pub fn new(
        planner: TimelinePlanner,
        builder: PlanBuilder,
        engine: Arc<dyn RenderEngine>,
        end_card_secs: f64,
    ) -> Self {
        Self {
            planner,
            builder,
            engine,
            end_card_secs,
        }
    }

    /// Timeline and plan for one rung.
    pub fn plan_rung(&self, assets: &JobAssets, features: FeatureSet) -> StoryreelResult<(Timeline, RenderPlan)> {
        let style = if features.crossfade {
            TransitionStyle::Crossfade
        } else {
            TransitionStyle::Cut
        };
        let planner = self.planner.clone().with_style(style).with_motion(features.motion);
        let end_card = features.end_card.then_some(self.end_card_secs);
        let timeline = planner.plan(assets.narration_secs(), assets.images.len(), end_card)?;
        let plan = self.builder.build(&timeline, assets, features)?;
        Ok((timeline, plan))
    }

    /// Plans for every rung that would be tried, in order.
    pub fn preview(&self, assets: &JobAssets, available: FeatureSet) -> StoryreelResult<Vec<RungPreview>> {
        ladder(available)
            .into_iter()
            .map(|rung| {
                let (timeline, plan) = self.plan_rung(assets, rung.features)?;
                Ok(RungPreview {
                    rung,
                    timeline,
                    plan,
                })
            })
            .collect()
    }

    /// Render, stepping down the ladder until the engine succeeds.
    pub async fn render_with_degradation(
        &self,
        job_id: &str,
        assets: &JobAssets,
        available: FeatureSet,
        output: &Path,
    ) -> StoryreelResult<DegradedRender> {
        let rungs = ladder(available);
        let mut attempts = Vec::new();
        let mut last_diagnostic = String::from("no rung attempted");
        let mut next = Some(0usize);

        while let Some(i) = next {
            let rung = rungs[i];
            let (timeline, plan) = match self.plan_rung(assets, rung.features) {
                Ok(planned) => planned,
                // Later rungs carry fewer features and may still plan.
                Err(e) if i + 1 < rungs.len() => {
                    warn!(job_id, rung = rung.name, "Rung could not be planned: {e}");
                    next = Some(i + 1);
                    continue;
                }
                Err(e) => return Err(e),
            };

            info!(
                job_id,
                rung = rung.name,
                features = %plan.features,
                engine = self.engine.name(),
                "Render attempt"
            );
            let started_at = Utc::now();
            let clock = Instant::now();
            let outcome = self.engine.execute(&plan, output).await;
            let elapsed_ms = clock.elapsed().as_millis() as u64;

            attempts.push(AttemptRecord {
                rung: rung.name.to_string(),
                features: plan.features,
                outcome: outcome.clone(),
                started_at,
                elapsed_ms,
            });

            next = match outcome {
                RenderOutcome::Success { artifact, bytes } => {
                    info!(job_id, rung = rung.name, bytes, elapsed_ms, "Render succeeded");
                    return Ok(DegradedRender {
                        artifact,
                        bytes,
                        rung: rung.name.to_string(),
                        features: plan.features,
                        timeline,
                        attempts,
                    });
                }
                RenderOutcome::Recoverable {
                    feature,
                    diagnostic,
                } => {
                    warn!(job_id, rung = rung.name, %feature, "Recoverable engine failure: {diagnostic}");
                    last_diagnostic = diagnostic;
                    next_without(&rungs, i, feature)
                }
                RenderOutcome::Fatal { diagnostic } => {
                    warn!(job_id, rung = rung.name, "Engine failure: {diagnostic}");
                    last_diagnostic = diagnostic;
                    (i + 1 < rungs.len()).then_some(i + 1)
                }
            };
        }

        Err(StoryreelError::engine_fatal(format!(
            "all {} attempts failed; last error: {last_diagnostic}",
            attempts.len()
        )))
    }
}

/// First rung after `current` that does not carry `feature`.
fn next_without(rungs: &[Rung], current: usize, feature: Feature) -> Option<usize> {
    rungs
        .iter()
        .enumerate()
        .skip(current + 1)
        .find(|(_, r)| !r.features.has(feature))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(rungs: &[Rung]) -> Vec<&'static str> {
        rungs.iter().map(|r| r.name).collect()
    }

    #[test]
    fn test_full_ladder() {
        let rungs = ladder(FeatureSet::FULL);
        assert_eq!(names(&rungs), ["full", "no_overlay", "no_ambience", "minimal"]);
        assert_eq!(rungs[3].features, FeatureSet::MINIMAL);
    }

    #[test]
    fn test_ladder_collapses_missing_assets() {
        let available = FeatureSet {
            overlay: false,
            ambience: false,
            ..FeatureSet::FULL
        };
        let rungs = ladder(available);
        assert_eq!(names(&rungs), ["full", "minimal"]);
        assert!(!rungs[0].features.overlay);
    }

    #[test]
    fn test_ladder_is_monotonic() {
        let rungs = ladder(FeatureSet::FULL);
        for pair in rungs.windows(2) {
            assert!(pair[1].features.is_subset_of(&pair[0].features));
        }
    }

    #[test]
    fn test_ladder_of_minimal_is_single_rung() {
        assert_eq!(names(&ladder(FeatureSet::MINIMAL)), ["full"]);
    }

    #[test]
    fn test_next_without_skips_rungs_keeping_feature() {
        let rungs = ladder(FeatureSet::FULL);
        assert_eq!(next_without(&rungs, 0, Feature::Overlay), Some(1));
        assert_eq!(next_without(&rungs, 0, Feature::Ambience), Some(2));
        assert_eq!(next_without(&rungs, 0, Feature::Motion), Some(3));
        assert_eq!(next_without(&rungs, 3, Feature::Motion), None);
    }
}
