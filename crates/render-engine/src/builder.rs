//! Render plan construction.
//!
//! Scenes are transformed one per image, merged, padded or trimmed to the
//! story window, optionally followed by the end card, then finished to the
//! narration length. Overlay and ambience are layered last. A feature that is
//! disabled or has no validated asset leaves no trace in the plan.

use storyreel_common::config::{AppConfig, Resolution};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_job_model::{
    FeatureSet, JobAssets, MotionPreset, MotionRamp, Timeline, TransitionStyle,
};
use storyreel_planner::{motion_ramp, MotionSettings};

use crate::graph::{
    AudioMixNode, InputMode, InputRole, InputSpec, MergeMode, MergeNode, Node, OverlayNode,
    PadTrimNode, RenderPlan, StreamRef, TransformNode,
};

/// Frames of slack added to every pad so rounding never leaves the trim short.
const PAD_SLACK_FRAMES: f64 = 2.0;

/// Builds [`RenderPlan`]s for one output canvas.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    width: u32,
    height: u32,
    oversample: f64,
    overlay_opacity: f64,
    ambience_volume: f64,
    motion: MotionSettings,
}

impl PlanBuilder {
    pub fn new(canvas: Resolution, config: &AppConfig) -> Self {
        Self {
            width: even(canvas.width),
            height: even(canvas.height),
            oversample: config.render.oversample.max(1.0),
            overlay_opacity: config.render.overlay_opacity,
            ambience_volume: config.render.ambience_volume,
            motion: MotionSettings::from_config(&config.timeline),
        }
    }

    /// Builder for an aspect ratio known to the canvas table.
    pub fn for_aspect(aspect: &str, config: &AppConfig) -> StoryreelResult<Self> {
        let canvas = config
            .resolution_for(aspect)
            .ok_or_else(|| StoryreelError::config(format!("no canvas for aspect {aspect}")))?;
        Ok(Self::new(canvas, config))
    }

    pub fn canvas(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Build a plan for `timeline` using the assets allowed by `features`.
    pub fn build(
        &self,
        timeline: &Timeline,
        assets: &JobAssets,
        features: FeatureSet,
    ) -> StoryreelResult<RenderPlan> {
        if assets.images.len() != timeline.scene_count() {
            return Err(StoryreelError::plan(format!(
                "{} images for {} scenes",
                assets.images.len(),
                timeline.scene_count()
            )));
        }
        if timeline.scenes.is_empty() {
            return Err(StoryreelError::plan("timeline has no scenes"));
        }

        let overlay = assets.optional.overlay.as_ref().filter(|_| features.overlay);
        let ambience = assets.optional.ambience.as_ref().filter(|_| features.ambience);
        let end_card = match (&timeline.end_card, &assets.optional.end_card) {
            (Some(spec), Some(asset)) if features.end_card => Some((spec, asset)),
            _ => None,
        };
        let crossfade = timeline.style == TransitionStyle::Crossfade
            && timeline.transition_count() > 0
            && features.crossfade;
        let motion = features.motion;

        let fps = timeline.fps.max(1);
        let mut inputs = Vec::new();
        let mut nodes = Vec::new();

        // Scenes
        let mut scene_streams = Vec::with_capacity(timeline.scene_count());
        for (scene, image) in timeline.scenes.iter().zip(&assets.images) {
            let preset = if motion { scene.motion } else { MotionPreset::Static };
            let ramp = motion_ramp(preset, &self.motion);
            let mode = if ramp.is_still() {
                InputMode::StillLoop {
                    fps,
                    duration_secs: scene.duration_secs,
                }
            } else {
                InputMode::Once
            };
            let index = push_input(&mut inputs, InputRole::Scene(scene.index), image.path(), mode);
            let label = format!("s{}", scene.index);
            nodes.push(Node::Transform(TransformNode {
                label: label.clone(),
                source: StreamRef::video(index),
                width: self.width,
                height: self.height,
                oversample: self.oversample,
                fps,
                duration_secs: scene.duration_secs,
                frames: timeline.frames_for(scene.duration_secs),
                motion: ramp,
                fade_in_secs: scene.fade_in.then_some(timeline.edge_fade_secs).filter(|d| *d > 0.0),
                fade_out_secs: scene
                    .fade_out
                    .then_some(timeline.edge_fade_secs)
                    .filter(|d| *d > 0.0),
            }));
            scene_streams.push(StreamRef::node(label));
        }

        let narration_index = push_input(
            &mut inputs,
            InputRole::Narration,
            assets.narration.path(),
            InputMode::Once,
        );

        // Merge
        let merged_secs = if crossfade {
            timeline.merged_secs()
        } else {
            timeline.rendered_secs()
        };
        let mut visual = if scene_streams.len() == 1 {
            scene_streams.remove(0)
        } else {
            let mode = if crossfade {
                MergeMode::Crossfade {
                    duration_secs: timeline.crossfade_secs,
                    offsets: timeline.scenes[1..].iter().map(|s| s.offset_secs).collect(),
                }
            } else {
                MergeMode::Concat
            };
            nodes.push(Node::Merge(MergeNode {
                label: "scenes".to_string(),
                inputs: scene_streams,
                mode,
            }));
            StreamRef::node("scenes")
        };

        // End card
        if let Some((spec, asset)) = end_card {
            nodes.push(pad_trim("story", visual, merged_secs, timeline.story_secs, fps));
            let index = push_input(
                &mut inputs,
                InputRole::EndCard,
                asset.path(),
                InputMode::StillLoop {
                    fps,
                    duration_secs: spec.duration_secs,
                },
            );
            let fade_in = timeline.edge_fade_secs.min(spec.duration_secs / 2.0);
            nodes.push(Node::Transform(TransformNode {
                label: "card".to_string(),
                source: StreamRef::video(index),
                width: self.width,
                height: self.height,
                oversample: self.oversample,
                fps,
                duration_secs: spec.duration_secs,
                frames: timeline.frames_for(spec.duration_secs),
                motion: MotionRamp::STILL,
                fade_in_secs: Some(fade_in).filter(|d| *d > 0.0),
                fade_out_secs: None,
            }));
            nodes.push(Node::Merge(MergeNode {
                label: "with_card".to_string(),
                inputs: vec![StreamRef::node("story"), StreamRef::node("card")],
                mode: MergeMode::Concat,
            }));
            visual = StreamRef::node("with_card");
            let joined_secs = timeline.story_secs + spec.duration_secs;
            nodes.push(pad_trim("visual", visual, joined_secs, timeline.output_secs, fps));
        } else {
            nodes.push(pad_trim("visual", visual, merged_secs, timeline.output_secs, fps));
        }
        let mut video_out = StreamRef::node("visual");

        // Overlay
        if let Some(asset) = overlay {
            let index = push_input(&mut inputs, InputRole::Overlay, asset.path(), InputMode::Looped);
            nodes.push(Node::OverlayComposite(OverlayNode {
                label: "composited".to_string(),
                base: video_out,
                overlay: StreamRef::video(index),
                width: self.width,
                height: self.height,
                opacity: self.overlay_opacity,
                duration_secs: timeline.output_secs,
            }));
            video_out = StreamRef::node("composited");
        }

        // Ambience
        let mut audio_out = StreamRef::audio(narration_index);
        if let Some(asset) = ambience {
            let index = push_input(&mut inputs, InputRole::Ambience, asset.path(), InputMode::Looped);
            nodes.push(Node::AudioMix(AudioMixNode {
                label: "mixed".to_string(),
                narration: audio_out,
                ambience: StreamRef::audio(index),
                volume: self.ambience_volume,
                duration_secs: timeline.output_secs,
            }));
            audio_out = StreamRef::node("mixed");
        }

        let plan = RenderPlan {
            inputs,
            nodes,
            video_out,
            audio_out,
            width: self.width,
            height: self.height,
            fps,
            output_secs: timeline.output_secs,
            features: FeatureSet {
                overlay: overlay.is_some(),
                ambience: ambience.is_some(),
                end_card: end_card.is_some(),
                crossfade,
                motion,
            },
        };
        plan.validate()?;

        tracing::debug!(
            inputs = plan.inputs.len(),
            nodes = plan.nodes.len(),
            features = %plan.features,
            output_secs = plan.output_secs,
            "Render plan built"
        );

        Ok(plan)
    }
}

fn push_input(
    inputs: &mut Vec<InputSpec>,
    role: InputRole,
    path: &std::path::Path,
    mode: InputMode,
) -> usize {
    inputs.push(InputSpec {
        role,
        path: path.to_path_buf(),
        mode,
    });
    inputs.len() - 1
}

fn pad_trim(label: &str, input: StreamRef, source_secs: f64, target_secs: f64, fps: u32) -> Node {
    let shortfall = (target_secs - source_secs).max(0.0);
    // Sub-frame differences are rounding noise; the trim absorbs them.
    let pad_secs = if shortfall * fps as f64 >= 0.5 {
        shortfall + PAD_SLACK_FRAMES / fps as f64
    } else {
        0.0
    };
    Node::PadTrim(PadTrimNode {
        label: label.to_string(),
        input,
        pad_secs,
        duration_secs: target_secs,
    })
}

fn even(v: u32) -> u32 {
    (v.max(2) / 2) * 2
}
