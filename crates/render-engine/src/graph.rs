//! Declarative composition graph.
//!
//! A [`RenderPlan`] lists engine inputs and a dependency-ordered sequence of
//! nodes. Nodes carry semantic parameters only; turning them into filter text
//! is the serializer's job, so one plan can target several engine dialects.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_job_model::{Feature, FeatureSet, MotionRamp};

/// What an engine input is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role", content = "scene")]
pub enum InputRole {
    Scene(usize),
    Narration,
    EndCard,
    Overlay,
    Ambience,
}

impl InputRole {
    /// The optional feature this input belongs to, if any.
    pub fn feature(self) -> Option<Feature> {
        match self {
            InputRole::Overlay => Some(Feature::Overlay),
            InputRole::Ambience => Some(Feature::Ambience),
            InputRole::EndCard => Some(Feature::EndCard),
            InputRole::Scene(_) | InputRole::Narration => None,
        }
    }
}

/// How the engine should read an input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum InputMode {
    /// Read once as-is.
    Once,
    /// A still repeated at `fps` for `duration_secs`.
    StillLoop { fps: u32, duration_secs: f64 },
    /// Loop the whole file indefinitely; downstream nodes trim it.
    Looped,
}

/// One engine input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub role: InputRole,
    pub path: PathBuf,
    pub mode: InputMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
}

/// A stream consumed by a node: an input stream or an earlier node's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRef {
    Input { index: usize, kind: StreamKind },
    Node(String),
}

impl StreamRef {
    pub fn video(index: usize) -> Self {
        StreamRef::Input {
            index,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(index: usize) -> Self {
        StreamRef::Input {
            index,
            kind: StreamKind::Audio,
        }
    }

    pub fn node(label: impl Into<String>) -> Self {
        StreamRef::Node(label.into())
    }

    /// Stream specifier as used by `-map` (no brackets).
    pub fn map_spec(&self) -> String {
        match self {
            StreamRef::Input { index, kind } => {
                let k = match kind {
                    StreamKind::Video => "v",
                    StreamKind::Audio => "a",
                };
                format!("{index}:{k}")
            }
            StreamRef::Node(label) => format!("[{label}]"),
        }
    }
}

impl fmt::Display for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamRef::Node(label) => write!(f, "[{label}]"),
            input => write!(f, "[{}]", input.map_spec()),
        }
    }
}

/// Still image to animated, normalized scene clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformNode {
    pub label: String,
    pub source: StreamRef,
    pub width: u32,
    pub height: u32,
    /// Working canvas multiplier for motion, reduces zoompan jitter.
    pub oversample: f64,
    pub fps: u32,
    pub duration_secs: f64,
    pub frames: u64,
    /// Camera path; `MotionRamp::STILL` renders a static frame.
    pub motion: MotionRamp,
    pub fade_in_secs: Option<f64>,
    pub fade_out_secs: Option<f64>,
}

/// How a merge joins its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum MergeMode {
    /// Pairwise blends; `offsets[i]` is where input `i + 1` starts blending in.
    Crossfade { duration_secs: f64, offsets: Vec<f64> },
    Concat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeNode {
    pub label: String,
    pub inputs: Vec<StreamRef>,
    pub mode: MergeMode,
}

/// Extend a video track by cloning its last frame, then cut it to length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadTrimNode {
    pub label: String,
    pub input: StreamRef,
    pub pad_secs: f64,
    pub duration_secs: f64,
}

/// Translucent looping video over the base track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayNode {
    pub label: String,
    pub base: StreamRef,
    pub overlay: StreamRef,
    pub width: u32,
    pub height: u32,
    pub opacity: f64,
    pub duration_secs: f64,
}

/// Narration mixed with a quiet looping ambience bed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMixNode {
    pub label: String,
    pub narration: StreamRef,
    pub ambience: StreamRef,
    pub volume: f64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "node")]
pub enum Node {
    Transform(TransformNode),
    Merge(MergeNode),
    PadTrim(PadTrimNode),
    OverlayComposite(OverlayNode),
    AudioMix(AudioMixNode),
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Transform(n) => &n.label,
            Node::Merge(n) => &n.label,
            Node::PadTrim(n) => &n.label,
            Node::OverlayComposite(n) => &n.label,
            Node::AudioMix(n) => &n.label,
        }
    }

    pub fn inputs(&self) -> Vec<&StreamRef> {
        match self {
            Node::Transform(n) => vec![&n.source],
            Node::Merge(n) => n.inputs.iter().collect(),
            Node::PadTrim(n) => vec![&n.input],
            Node::OverlayComposite(n) => vec![&n.base, &n.overlay],
            Node::AudioMix(n) => vec![&n.narration, &n.ambience],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Transform(_) => "transform",
            Node::Merge(_) => "merge",
            Node::PadTrim(_) => "pad_trim",
            Node::OverlayComposite(_) => "overlay_composite",
            Node::AudioMix(_) => "audio_mix",
        }
    }
}

/// A complete, engine-neutral render plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub inputs: Vec<InputSpec>,
    pub nodes: Vec<Node>,
    pub video_out: StreamRef,
    pub audio_out: StreamRef,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Final length; equals the narration duration.
    pub output_secs: f64,
    /// Features actually present in this plan.
    pub features: FeatureSet,
}

impl RenderPlan {
    pub fn node(&self, label: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.label() == label)
    }

    pub fn has_node_kind(&self, kind_name: &str) -> bool {
        self.nodes.iter().any(|n| n.kind_name() == kind_name)
    }

    /// Index of the first input with `role`.
    pub fn input_index(&self, role: InputRole) -> Option<usize> {
        self.inputs.iter().position(|i| i.role == role)
    }

    /// Check structural invariants.
    ///
    /// - node labels are unique
    /// - every node input is an existing input stream or an earlier node
    /// - every node output is consumed exactly once, either by a later node
    ///   or as a plan output
    pub fn validate(&self) -> StoryreelResult<()> {
        let mut defined: HashSet<&str> = HashSet::new();
        let mut consumed: HashSet<&str> = HashSet::new();

        for node in &self.nodes {
            for input in node.inputs() {
                self.check_ref(input, &defined)?;
                if let StreamRef::Node(label) = input {
                    if !consumed.insert(label.as_str()) {
                        return Err(StoryreelError::plan(format!(
                            "node output [{label}] consumed more than once"
                        )));
                    }
                }
            }
            if let Node::Merge(merge) = node {
                check_merge(merge)?;
            }
            if !defined.insert(node.label()) {
                return Err(StoryreelError::plan(format!(
                    "duplicate node label [{}]",
                    node.label()
                )));
            }
        }

        for out in [&self.video_out, &self.audio_out] {
            self.check_ref(out, &defined)?;
            if let StreamRef::Node(label) = out {
                if !consumed.insert(label.as_str()) {
                    return Err(StoryreelError::plan(format!(
                        "plan output [{label}] is also consumed by a node"
                    )));
                }
            }
        }

        if let Some(dangling) = defined.iter().find(|l| !consumed.contains(*l)) {
            return Err(StoryreelError::plan(format!(
                "node output [{dangling}] is never used"
            )));
        }

        if !self.output_secs.is_finite() || self.output_secs <= 0.0 {
            return Err(StoryreelError::plan(format!(
                "output duration {} is not positive",
                self.output_secs
            )));
        }

        Ok(())
    }

    fn check_ref(&self, stream: &StreamRef, defined: &HashSet<&str>) -> StoryreelResult<()> {
        match stream {
            StreamRef::Input { index, .. } if *index < self.inputs.len() => Ok(()),
            StreamRef::Input { index, .. } => Err(StoryreelError::plan(format!(
                "input #{index} does not exist ({} inputs)",
                self.inputs.len()
            ))),
            StreamRef::Node(label) if defined.contains(label.as_str()) => Ok(()),
            StreamRef::Node(label) => Err(StoryreelError::plan(format!(
                "[{label}] is referenced before it is defined"
            ))),
        }
    }
}

fn check_merge(merge: &MergeNode) -> StoryreelResult<()> {
    if merge.inputs.len() < 2 {
        return Err(StoryreelError::plan(format!(
            "merge [{}] needs at least two inputs",
            merge.label
        )));
    }
    if let MergeMode::Crossfade { offsets, .. } = &merge.mode {
        if offsets.len() + 1 != merge.inputs.len() {
            return Err(StoryreelError::plan(format!(
                "merge [{}] has {} offsets for {} inputs",
                merge.label,
                offsets.len(),
                merge.inputs.len()
            )));
        }
    }
    Ok(())
}
