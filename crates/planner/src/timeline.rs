//! Timeline planning.
//!
//! Reconciles a fixed narration duration with a variable number of images:
//! every image gets the same scene length, floored at a minimum so short
//! narrations never produce degenerate scenes. When the floor kicks in the
//! scenes overrun the story window and the visual tail is trimmed later;
//! `SceneSpec::visible_secs` records what survives that trim. Crossfades
//! overlap neighbors, so the last scene is stretched until the merged track
//! reaches the end of the story window.

use storyreel_common::config::TimelineConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_job_model::timeline::{
    EndCardSpec, MotionPreset, SceneSpec, Timeline, TransitionStyle,
};

/// Timeline planner with fixed configuration.
#[derive(Debug, Clone)]
pub struct TimelinePlanner {
    min_scene_secs: f64,
    min_fade_secs: f64,
    max_fade_secs: f64,
    fade_ratio: f64,
    edge_fade_secs: f64,
    fps: u32,
    style: TransitionStyle,
    motion: bool,
}

impl Default for TimelinePlanner {
    fn default() -> Self {
        Self::from_config(&TimelineConfig::default())
    }
}

impl TimelinePlanner {
    pub fn from_config(config: &TimelineConfig) -> Self {
        Self {
            min_scene_secs: config.min_scene_secs,
            min_fade_secs: config.min_fade_secs,
            max_fade_secs: config.max_fade_secs,
            fade_ratio: config.fade_ratio,
            edge_fade_secs: config.edge_fade_secs,
            fps: config.fps.max(1),
            style: if config.crossfade {
                TransitionStyle::Crossfade
            } else {
                TransitionStyle::Cut
            },
            motion: true,
        }
    }

    /// Same planner with a different join style.
    pub fn with_style(mut self, style: TransitionStyle) -> Self {
        self.style = style;
        self
    }

    /// Same planner with motion presets enabled or replaced by `Static`.
    pub fn with_motion(mut self, motion: bool) -> Self {
        self.motion = motion;
        self
    }

    pub fn style(&self) -> TransitionStyle {
        self.style
    }

    pub fn min_scene_secs(&self) -> f64 {
        self.min_scene_secs
    }

    /// Compute the timeline.
    ///
    /// `end_card_secs` reserves time at the end of the narration for a
    /// closing still. Fails when the remaining story window is not positive.
    pub fn plan(
        &self,
        narration_secs: f64,
        image_count: usize,
        end_card_secs: Option<f64>,
    ) -> StoryreelResult<Timeline> {
        if !narration_secs.is_finite() || narration_secs <= 0.0 {
            return Err(StoryreelError::timeline(format!(
                "narration duration must be positive, got {narration_secs}"
            )));
        }
        if image_count == 0 {
            return Err(StoryreelError::timeline("at least one image is required"));
        }

        let end_card_secs = end_card_secs.filter(|secs| *secs > 0.0);
        let story_secs = narration_secs - end_card_secs.unwrap_or(0.0);
        if !story_secs.is_finite() || story_secs <= 0.0 {
            return Err(StoryreelError::timeline(format!(
                "story duration {story_secs:.3}s is not positive (narration {narration_secs:.3}s, end card {:.3}s)",
                end_card_secs.unwrap_or(0.0)
            )));
        }

        let n = image_count;
        let scene_secs = (story_secs / n as f64).max(self.min_scene_secs);

        // A single scene has nothing to blend with.
        let crossfade_secs = if self.style == TransitionStyle::Crossfade && n > 1 {
            (self.fade_ratio * scene_secs)
                .clamp(self.min_fade_secs, self.max_fade_secs)
                .min(scene_secs / 2.0)
        } else {
            0.0
        };
        let edge_fade_secs = self.edge_fade_secs.clamp(0.0, scene_secs / 2.0);

        let offsets: Vec<f64> = (0..n)
            .map(|i| i as f64 * scene_secs - i as f64 * crossfade_secs)
            .collect();
        let durations: Vec<f64> = offsets
            .iter()
            .enumerate()
            .map(|(i, offset)| {
                if i + 1 == n {
                    // Overlaps shorten the merged track; the last scene covers the gap.
                    scene_secs.max(story_secs - offset)
                } else {
                    scene_secs
                }
            })
            .collect();

        let scenes = (0..n)
            .map(|i| {
                let (fade_in, fade_out) = self.fade_flags(i, n);
                let start = offsets[i].min(story_secs);
                let end = match offsets.get(i + 1) {
                    Some(next) => *next,
                    None => offsets[i] + durations[i],
                }
                .min(story_secs);
                SceneSpec {
                    index: i,
                    duration_secs: durations[i],
                    visible_secs: (end - start).max(0.0),
                    offset_secs: offsets[i],
                    motion: if self.motion {
                        MotionPreset::for_scene(i)
                    } else {
                        MotionPreset::Static
                    },
                    fade_in,
                    fade_out,
                }
            })
            .collect::<Vec<_>>();

        if offsets[n - 1] + durations[n - 1] > story_secs + 1e-9 {
            tracing::debug!(
                story_secs,
                scene_secs,
                images = n,
                "Scene floor exceeds story window; visual tail will be trimmed"
            );
        }

        Ok(Timeline {
            scenes,
            story_secs,
            output_secs: narration_secs,
            scene_secs,
            crossfade_secs,
            edge_fade_secs,
            style: self.style,
            end_card: end_card_secs.map(|duration_secs| EndCardSpec {
                duration_secs,
                offset_secs: story_secs,
            }),
            fps: self.fps,
        })
    }

    /// Fade-in/out flags for scene `i` of `n`.
    ///
    /// Crossfades only need fades at the outer edges. Cuts dip through black:
    /// the first scene fades in, the last fades out, middle scenes do both.
    fn fade_flags(&self, i: usize, n: usize) -> (bool, bool) {
        if n == 1 {
            return (true, true);
        }
        let first = i == 0;
        let last = i == n - 1;
        match self.style {
            TransitionStyle::Crossfade => (first, last),
            TransitionStyle::Cut => (!last, !first),
        }
    }
}
