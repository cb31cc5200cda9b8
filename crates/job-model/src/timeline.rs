//! Timeline types: the per-scene schedule of a render.
//!
//! A timeline is computed once from the narration duration and image count
//! and then consumed by the plan builder. Times are seconds from the start
//! of the output.

use serde::{Deserialize, Serialize};

/// Pan/zoom applied to a still image (Ken Burns effect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPreset {
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
    /// No camera movement.
    Static,
}

impl MotionPreset {
    /// Presets assigned to scenes in rotation.
    pub const CYCLE: [MotionPreset; 6] = [
        MotionPreset::ZoomIn,
        MotionPreset::ZoomOut,
        MotionPreset::PanLeft,
        MotionPreset::PanRight,
        MotionPreset::PanUp,
        MotionPreset::PanDown,
    ];

    /// Deterministic preset for a scene index.
    pub fn for_scene(index: usize) -> Self {
        Self::CYCLE[index % Self::CYCLE.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MotionPreset::ZoomIn => "zoom_in",
            MotionPreset::ZoomOut => "zoom_out",
            MotionPreset::PanLeft => "pan_left",
            MotionPreset::PanRight => "pan_right",
            MotionPreset::PanUp => "pan_up",
            MotionPreset::PanDown => "pan_down",
            MotionPreset::Static => "static",
        }
    }
}

/// A value moving linearly from `from` to `to` over a scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub from: f64,
    pub to: f64,
}

impl Ramp {
    pub const fn new(from: f64, to: f64) -> Self {
        Self { from, to }
    }

    pub const fn hold(value: f64) -> Self {
        Self {
            from: value,
            to: value,
        }
    }

    /// Value at `progress` in `[0, 1]`.
    pub fn at(&self, progress: f64) -> f64 {
        let t = progress.clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    pub fn is_constant(&self) -> bool {
        (self.to - self.from).abs() < 1e-12
    }
}

/// Parametric camera path for one scene.
///
/// `zoom` is the magnification (1.0 = whole frame). `x` and `y` position the
/// crop window as a fraction of the available travel: 0.0 is the left/top
/// edge, 0.5 centered, 1.0 the right/bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionRamp {
    pub zoom: Ramp,
    pub x: Ramp,
    pub y: Ramp,
}

impl MotionRamp {
    /// Centered, unzoomed frame for the whole scene.
    pub const STILL: MotionRamp = MotionRamp {
        zoom: Ramp::hold(1.0),
        x: Ramp::hold(0.5),
        y: Ramp::hold(0.5),
    };

    pub fn is_still(&self) -> bool {
        self.zoom.is_constant() && self.x.is_constant() && self.y.is_constant()
    }
}

/// How consecutive scenes are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    /// Overlapping opacity blend between neighbors.
    Crossfade,
    /// Straight concatenation; boundaries dip through black.
    Cut,
}

/// One scene per input image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneSpec {
    /// Position in the input image list.
    pub index: usize,

    /// Rendered clip length. Never below the configured minimum.
    pub duration_secs: f64,

    /// Share of the story window this scene occupies after trimming.
    pub visible_secs: f64,

    /// Start of the scene in the merged visual track.
    pub offset_secs: f64,

    /// Camera motion.
    pub motion: MotionPreset,

    /// Fade in from black at the scene start.
    pub fade_in: bool,

    /// Fade out to black at the scene end.
    pub fade_out: bool,
}

impl SceneSpec {
    pub fn end_secs(&self) -> f64 {
        self.offset_secs + self.duration_secs
    }
}

/// The closing still appended after the narrated scenes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EndCardSpec {
    pub duration_secs: f64,

    /// Where the end card starts in the output (equals the story duration).
    pub offset_secs: f64,
}

/// Ordered scene schedule for one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Scenes in image order.
    pub scenes: Vec<SceneSpec>,

    /// Narrated portion covered by scenes.
    pub story_secs: f64,

    /// Final output length; always the narration duration.
    pub output_secs: f64,

    /// Per-scene share of the story window, floored at the minimum. A
    /// crossfaded last scene runs longer to cover the overlaps.
    pub scene_secs: f64,

    /// Crossfade window between neighbors (0 for cuts and single scenes).
    pub crossfade_secs: f64,

    /// Fade-in/out length used at boundaries.
    pub edge_fade_secs: f64,

    /// Join style.
    pub style: TransitionStyle,

    /// Closing still, if used.
    pub end_card: Option<EndCardSpec>,

    /// Output frame rate.
    pub fps: u32,
}

impl Timeline {
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Number of crossfade transitions in the merged track.
    pub fn transition_count(&self) -> usize {
        if self.crossfade_secs > 0.0 && self.scenes.len() > 1 {
            self.scenes.len() - 1
        } else {
            0
        }
    }

    /// Sum of rendered scene durations.
    pub fn rendered_secs(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration_secs).sum()
    }

    /// Sum of visible scene shares; equals `story_secs`.
    pub fn visible_secs(&self) -> f64 {
        self.scenes.iter().map(|s| s.visible_secs).sum()
    }

    /// Length of the merged scene track before padding or trimming.
    pub fn merged_secs(&self) -> f64 {
        self.rendered_secs() - self.transition_count() as f64 * self.crossfade_secs
    }

    /// Scene offsets, in order.
    pub fn offsets(&self) -> Vec<f64> {
        self.scenes.iter().map(|s| s.offset_secs).collect()
    }

    /// Frames needed to cover `secs` at the timeline frame rate.
    pub fn frames_for(&self, secs: f64) -> u64 {
        (secs * self.fps as f64).round().max(1.0) as u64
    }
}
