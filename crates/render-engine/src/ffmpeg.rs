//! ffmpeg execution adapter.
//!
//! [`FfmpegSerializer`] turns a [`RenderPlan`] into an argument vector for a
//! specific ffmpeg dialect. [`FfmpegEngine`] runs it and classifies the
//! result into a [`RenderOutcome`].

use std::fmt::Write as _;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use storyreel_common::config::RenderConfig;
use storyreel_job_model::{Feature, MotionRamp, RenderOutcome};

use crate::graph::{
    AudioMixNode, InputMode, MergeMode, MergeNode, Node, OverlayNode, PadTrimNode, RenderPlan,
    TransformNode,
};

/// ffmpeg versions differ in a few filter options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineDialect {
    /// ffmpeg 5 and later.
    #[default]
    Ffmpeg5,
    /// ffmpeg 4.x: `amix` has no `normalize` option.
    Ffmpeg4,
}

impl EngineDialect {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ffmpeg5" | "5" | "ffmpeg6" | "ffmpeg7" => Some(EngineDialect::Ffmpeg5),
            "ffmpeg4" | "4" => Some(EngineDialect::Ffmpeg4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineDialect::Ffmpeg5 => "ffmpeg5",
            EngineDialect::Ffmpeg4 => "ffmpeg4",
        }
    }
}

/// Output encoding parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub preset: String,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl EncodeSettings {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            preset: config.preset.clone(),
            video_bitrate_kbps: config.video_bitrate_kbps.max(500),
            audio_bitrate_kbps: config.audio_bitrate_kbps.max(64),
        }
    }
}

/// Plan → ffmpeg argv.
#[derive(Debug, Clone, Default)]
pub struct FfmpegSerializer {
    dialect: EngineDialect,
    encode: EncodeSettings,
}

impl FfmpegSerializer {
    pub fn new(dialect: EngineDialect, encode: EncodeSettings) -> Self {
        Self { dialect, encode }
    }

    pub fn dialect(&self) -> EngineDialect {
        self.dialect
    }

    /// Full argument vector, excluding the binary name.
    pub fn to_args(&self, plan: &RenderPlan, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        for input in &plan.inputs {
            match input.mode {
                InputMode::Once => {}
                InputMode::StillLoop { fps, duration_secs } => {
                    args.push("-loop".to_string());
                    args.push("1".to_string());
                    args.push("-framerate".to_string());
                    args.push(fps.to_string());
                    args.push("-t".to_string());
                    args.push(secs(duration_secs));
                }
                InputMode::Looped => {
                    args.push("-stream_loop".to_string());
                    args.push("-1".to_string());
                }
            }
            args.push("-i".to_string());
            args.push(input.path.display().to_string());
        }

        args.push("-filter_complex".to_string());
        args.push(self.filter_graph(plan));
        args.push("-map".to_string());
        args.push(plan.video_out.map_spec());
        args.push("-map".to_string());
        args.push(plan.audio_out.map_spec());
        args.push("-r".to_string());
        args.push(plan.fps.to_string());

        let video_bitrate = format!("{}k", self.encode.video_bitrate_kbps);
        let audio_bitrate = format!("{}k", self.encode.audio_bitrate_kbps);
        let codec: [&str; 14] = [
            "-c:v",
            "libx264",
            "-preset",
            self.encode.preset.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-b:v",
            video_bitrate.as_str(),
            "-c:a",
            "aac",
            "-b:a",
            audio_bitrate.as_str(),
            "-movflags",
            "+faststart",
        ];
        args.extend(codec.iter().map(|s| s.to_string()));
        args.push(output.display().to_string());
        args
    }

    /// The `-filter_complex` text: every node chain joined by `;`.
    pub fn filter_graph(&self, plan: &RenderPlan) -> String {
        plan.nodes
            .iter()
            .flat_map(|node| self.node_chains(node))
            .collect::<Vec<_>>()
            .join(";")
    }

    fn node_chains(&self, node: &Node) -> Vec<String> {
        match node {
            Node::Transform(n) => vec![transform_chain(n)],
            Node::Merge(n) => merge_chains(n),
            Node::PadTrim(n) => vec![pad_trim_chain(n)],
            Node::OverlayComposite(n) => overlay_chains(n),
            Node::AudioMix(n) => vec![self.audio_mix_chain(n)],
        }
    }

    fn audio_mix_chain(&self, n: &AudioMixNode) -> String {
        let bed = format!("{}_bed", n.label);
        let mut amix = Filter::new("amix")
            .opt("inputs", "2")
            .opt("duration", "first")
            .opt("dropout_transition", "0");
        if self.dialect == EngineDialect::Ffmpeg5 {
            amix = amix.opt("normalize", "0");
        }
        format!(
            "{amb}{vol},{trim},{pts}[{bed}];{narr}[{bed}]{amix}[{label}]",
            amb = n.ambience,
            vol = Filter::new("volume").opt("volume", num(n.volume)),
            trim = Filter::new("atrim").opt("duration", secs(n.duration_secs)),
            pts = Filter::new("asetpts").arg("PTS-STARTPTS"),
            narr = n.narration,
            label = n.label,
        )
    }
}

fn transform_chain(n: &TransformNode) -> String {
    let mut filters = Vec::new();

    if n.motion.is_still() {
        filters.push(
            Filter::new("scale")
                .opt("w", n.width.to_string())
                .opt("h", n.height.to_string())
                .opt("force_original_aspect_ratio", "increase"),
        );
        filters.push(
            Filter::new("crop")
                .opt("w", n.width.to_string())
                .opt("h", n.height.to_string()),
        );
        filters.push(Filter::new("setsar").arg("1"));
        filters.push(Filter::new("fps").opt("fps", n.fps.to_string()));
    } else {
        let work_w = even_scaled(n.width, n.oversample);
        let work_h = even_scaled(n.height, n.oversample);
        filters.push(
            Filter::new("scale")
                .opt("w", work_w.to_string())
                .opt("h", work_h.to_string())
                .opt("force_original_aspect_ratio", "increase"),
        );
        filters.push(
            Filter::new("crop")
                .opt("w", work_w.to_string())
                .opt("h", work_h.to_string()),
        );
        filters.push(Filter::new("setsar").arg("1"));
        let (z, x, y) = zoompan_exprs(&n.motion, n.frames);
        filters.push(
            Filter::new("zoompan")
                .opt("z", z)
                .opt("x", x)
                .opt("y", y)
                .opt("d", n.frames.to_string())
                .opt("s", format!("{}x{}", n.width, n.height))
                .opt("fps", n.fps.to_string()),
        );
    }

    filters.push(Filter::new("format").opt("pix_fmts", "yuv420p"));
    filters.push(Filter::new("trim").opt("duration", secs(n.duration_secs)));
    filters.push(Filter::new("setpts").arg("PTS-STARTPTS"));
    if let Some(d) = n.fade_in_secs {
        filters.push(
            Filter::new("fade")
                .opt("t", "in")
                .opt("st", "0")
                .opt("d", secs(d)),
        );
    }
    if let Some(d) = n.fade_out_secs {
        filters.push(
            Filter::new("fade")
                .opt("t", "out")
                .opt("st", secs((n.duration_secs - d).max(0.0)))
                .opt("d", secs(d)),
        );
    }

    format!("{}{}[{}]", n.source, join_filters(&filters), n.label)
}

/// zoompan expressions for a linear camera ramp over `frames` frames.
fn zoompan_exprs(ramp: &MotionRamp, frames: u64) -> (String, String, String) {
    let span = frames.saturating_sub(1).max(1);
    let lerp = |from: f64, to: f64| {
        if (to - from).abs() < 1e-12 {
            num(from)
        } else {
            format!("{}+({})*on/{span}", num(from), num(to - from))
        }
    };
    let z = lerp(ramp.zoom.from, ramp.zoom.to);
    let x = format!("(iw-iw/zoom)*({})", lerp(ramp.x.from, ramp.x.to));
    let y = format!("(ih-ih/zoom)*({})", lerp(ramp.y.from, ramp.y.to));
    (z, x, y)
}

fn merge_chains(n: &MergeNode) -> Vec<String> {
    match &n.mode {
        MergeMode::Concat => {
            let inputs: String = n.inputs.iter().map(|s| s.to_string()).collect();
            vec![format!(
                "{inputs}{}[{}]",
                Filter::new("concat")
                    .opt("n", n.inputs.len().to_string())
                    .opt("v", "1")
                    .opt("a", "0"),
                n.label
            )]
        }
        MergeMode::Crossfade {
            duration_secs,
            offsets,
        } => {
            let Some(first) = n.inputs.first() else {
                return Vec::new();
            };
            let mut chains = Vec::with_capacity(offsets.len());
            let mut acc = first.to_string();
            for (i, (next, offset)) in n.inputs[1..].iter().zip(offsets).enumerate() {
                let is_last = i + 2 == n.inputs.len();
                let out = if is_last {
                    n.label.clone()
                } else {
                    format!("{}_x{}", n.label, i + 1)
                };
                chains.push(format!(
                    "{acc}{next}{}[{out}]",
                    Filter::new("xfade")
                        .opt("transition", "fade")
                        .opt("duration", secs(*duration_secs))
                        .opt("offset", secs(*offset))
                ));
                acc = format!("[{out}]");
            }
            chains
        }
    }
}

fn pad_trim_chain(n: &PadTrimNode) -> String {
    let mut filters = Vec::new();
    if n.pad_secs > 0.0 {
        filters.push(
            Filter::new("tpad")
                .opt("stop_mode", "clone")
                .opt("stop_duration", secs(n.pad_secs)),
        );
    }
    filters.push(Filter::new("trim").opt("duration", secs(n.duration_secs)));
    filters.push(Filter::new("setpts").arg("PTS-STARTPTS"));
    format!("{}{}[{}]", n.input, join_filters(&filters), n.label)
}

fn overlay_chains(n: &OverlayNode) -> Vec<String> {
    let layer = format!("{}_layer", n.label);
    let prep = [
        Filter::new("scale")
            .opt("w", n.width.to_string())
            .opt("h", n.height.to_string())
            .opt("force_original_aspect_ratio", "increase"),
        Filter::new("crop")
            .opt("w", n.width.to_string())
            .opt("h", n.height.to_string()),
        Filter::new("setsar").arg("1"),
        Filter::new("format").opt("pix_fmts", "rgba"),
        Filter::new("colorchannelmixer").opt("aa", num(n.opacity)),
        Filter::new("trim").opt("duration", secs(n.duration_secs)),
        Filter::new("setpts").arg("PTS-STARTPTS"),
    ];
    let composite = [
        Filter::new("overlay")
            .opt("x", "0")
            .opt("y", "0")
            .opt("shortest", "1")
            .opt("format", "auto"),
        Filter::new("format").opt("pix_fmts", "yuv420p"),
    ];
    vec![
        format!("{}{}[{layer}]", n.overlay, join_filters(&prep)),
        format!(
            "{}[{layer}]{}[{}]",
            n.base,
            join_filters(&composite),
            n.label
        ),
    ]
}

/// One filter invocation with escaped options.
#[derive(Debug, Clone)]
struct Filter {
    name: &'static str,
    args: Vec<(Option<&'static str>, String)>,
}

impl Filter {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    fn opt(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.args.push((Some(key), value.into()));
        self
    }

    fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push((None, value.into()));
        self
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)?;
        for (i, (key, value)) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            if let Some(key) = key {
                write!(f, "{key}=")?;
            }
            f.write_str(&escape_option(value))?;
        }
        Ok(())
    }
}

fn join_filters(filters: &[Filter]) -> String {
    let mut out = String::new();
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{filter}");
    }
    out
}

/// Escape a filter option value for use inside `-filter_complex`.
///
/// Two levels apply: the option parser (`\`, `'`, `:`) and then the graph
/// parser (`\`, `'`, `[`, `]`, `,`, `;`).
pub fn escape_option(value: &str) -> String {
    let mut level1 = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            level1.push('\\');
        }
        level1.push(c);
    }
    let mut level2 = String::with_capacity(level1.len());
    for c in level1.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            level2.push('\\');
        }
        level2.push(c);
    }
    level2
}

fn secs(v: f64) -> String {
    format!("{v:.3}")
}

fn num(v: f64) -> String {
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn even_scaled(v: u32, factor: f64) -> u32 {
    let scaled = (v as f64 * factor).round() as u32;
    (scaled.max(2) / 2) * 2
}

/// Executes render plans.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Run one plan, writing the artifact to `output`. Never panics on
    /// engine failure; every failure is a classified outcome.
    async fn execute(&self, plan: &RenderPlan, output: &Path) -> RenderOutcome;

    /// Check if this engine is usable on the system.
    async fn is_available(&self) -> bool;

    /// Engine name.
    fn name(&self) -> &str;
}

/// [`RenderEngine`] backed by the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: String,
    serializer: FfmpegSerializer,
    min_artifact_bytes: u64,
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<String>, serializer: FfmpegSerializer, min_artifact_bytes: u64) -> Self {
        Self {
            binary: binary.into(),
            serializer,
            min_artifact_bytes,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        let dialect = EngineDialect::parse(&config.dialect).unwrap_or_else(|| {
            tracing::warn!(dialect = %config.dialect, "Unknown engine dialect; using ffmpeg5");
            EngineDialect::Ffmpeg5
        });
        Self::new(
            config.ffmpeg_path.clone(),
            FfmpegSerializer::new(dialect, EncodeSettings::from_config(config)),
            config.min_artifact_bytes,
        )
    }

    pub fn serializer(&self) -> &FfmpegSerializer {
        &self.serializer
    }
}

#[async_trait]
impl RenderEngine for FfmpegEngine {
    async fn execute(&self, plan: &RenderPlan, output: &Path) -> RenderOutcome {
        let args = self.serializer.to_args(plan, output);
        let _ = tokio::fs::remove_file(output).await;

        tracing::debug!(binary = %self.binary, args = ?args, "Running ffmpeg");
        let started = Instant::now();
        let result = tokio::process::Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) => {
                return RenderOutcome::Fatal {
                    diagnostic: format!("failed to start {}: {e}", self.binary),
                }
            }
        };

        let stderr = String::from_utf8_lossy(&out.stderr);
        let artifact_bytes = tokio::fs::metadata(output).await.ok().map(|m| m.len());
        tracing::info!(
            status = %out.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            artifact_bytes = ?artifact_bytes,
            "ffmpeg finished"
        );

        classify_outcome(
            plan,
            out.status.success(),
            &stderr,
            output,
            artifact_bytes,
            self.min_artifact_bytes,
        )
    }

    async fn is_available(&self) -> bool {
        tokio::process::Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Classify one engine run.
///
/// A failure is recoverable only when the diagnostic can be pinned on one
/// optional feature still present in the plan.
pub fn classify_outcome(
    plan: &RenderPlan,
    exited_ok: bool,
    stderr: &str,
    output: &Path,
    artifact_bytes: Option<u64>,
    min_artifact_bytes: u64,
) -> RenderOutcome {
    if exited_ok {
        return match artifact_bytes {
            Some(bytes) if bytes >= min_artifact_bytes.max(1) => RenderOutcome::Success {
                artifact: output.to_path_buf(),
                bytes,
            },
            Some(bytes) => RenderOutcome::Fatal {
                diagnostic: format!("engine exited cleanly but artifact is only {bytes} bytes"),
            },
            None => RenderOutcome::Fatal {
                diagnostic: "engine exited cleanly but produced no artifact".to_string(),
            },
        };
    }

    let diagnostic = stderr_tail(stderr, 20);
    match implicated_feature(plan, stderr) {
        Some(feature) => RenderOutcome::Recoverable {
            feature,
            diagnostic,
        },
        None => RenderOutcome::Fatal {
            diagnostic: if diagnostic.is_empty() {
                "engine failed without diagnostics".to_string()
            } else {
                diagnostic
            },
        },
    }
}

/// The optional feature a diagnostic names, if any.
pub fn implicated_feature(plan: &RenderPlan, stderr: &str) -> Option<Feature> {
    for (index, input) in plan.inputs.iter().enumerate() {
        let Some(feature) = input.role.feature() else {
            continue;
        };
        let path = input.path.display().to_string();
        let named = (!path.is_empty() && stderr.contains(&path))
            || stderr.contains(&format!("#{index}:"))
            || stderr.contains(&format!("in#{index}"))
            || stderr.contains(&format!("Input #{index},"));
        if named {
            return Some(feature);
        }
    }

    if plan.features.crossfade && stderr.contains("xfade") {
        return Some(Feature::Crossfade);
    }
    if plan.features.motion && stderr.contains("zoompan") {
        return Some(Feature::Motion);
    }
    None
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InputRole, InputSpec, StreamRef};
    use storyreel_job_model::FeatureSet;

    fn still_transform(label: &str, index: usize) -> Node {
        Node::Transform(TransformNode {
            label: label.to_string(),
            source: StreamRef::video(index),
            width: 1080,
            height: 1920,
            oversample: 1.5,
            fps: 30,
            duration_secs: 3.0,
            frames: 90,
            motion: MotionRamp::STILL,
            fade_in_secs: Some(0.5),
            fade_out_secs: None,
        })
    }

    fn sample_plan() -> RenderPlan {
        RenderPlan {
            inputs: vec![
                InputSpec {
                    role: InputRole::Scene(0),
                    path: "/w/image-000.jpg".into(),
                    mode: InputMode::StillLoop {
                        fps: 30,
                        duration_secs: 3.0,
                    },
                },
                InputSpec {
                    role: InputRole::Narration,
                    path: "/w/narration.mp3".into(),
                    mode: InputMode::Once,
                },
                InputSpec {
                    role: InputRole::Ambience,
                    path: "/w/ambience-0.mp3".into(),
                    mode: InputMode::Looped,
                },
            ],
            nodes: vec![
                still_transform("s0", 0),
                Node::PadTrim(PadTrimNode {
                    label: "visual".into(),
                    input: StreamRef::node("s0"),
                    pad_secs: 1.0,
                    duration_secs: 4.0,
                }),
                Node::AudioMix(AudioMixNode {
                    label: "mixed".into(),
                    narration: StreamRef::audio(1),
                    ambience: StreamRef::audio(2),
                    volume: 0.2,
                    duration_secs: 4.0,
                }),
            ],
            video_out: StreamRef::node("visual"),
            audio_out: StreamRef::node("mixed"),
            width: 1080,
            height: 1920,
            fps: 30,
            output_secs: 4.0,
            features: FeatureSet {
                ambience: true,
                ..FeatureSet::MINIMAL
            },
        }
    }

    #[test]
    fn test_escape_option() {
        assert_eq!(escape_option("1.2"), "1.2");
        assert_eq!(escape_option("min(a,b)"), "min(a\\,b)");
        assert_eq!(escape_option("a:b"), "a\\\\:b");
        assert_eq!(escape_option("it's"), "it\\\\\\'s");
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(0.18), "0.18");
        assert_eq!(num(-0.25), "-0.25");
        assert_eq!(num(0.0), "0");
    }

    #[test]
    fn test_args_shape() {
        let plan = sample_plan();
        let args = FfmpegSerializer::default().to_args(&plan, Path::new("/w/out.mp4"));

        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 3);
        let loop_pos = args.iter().position(|a| a == "-loop").unwrap();
        assert_eq!(&args[loop_pos..loop_pos + 6], ["-loop", "1", "-framerate", "30", "-t", "3.000"]);
        let sl = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(args[sl + 3], "/w/ambience-0.mp3");

        let maps: Vec<&String> = args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && args[i - 1] == "-map")
            .map(|(_, a)| a)
            .collect();
        assert_eq!(maps, ["[visual]", "[mixed]"]);
        assert_eq!(args.last().unwrap(), "/w/out.mp4");
    }

    #[test]
    fn test_filter_graph_text() {
        let graph = FfmpegSerializer::default().filter_graph(&sample_plan());
        let chains: Vec<&str> = graph.split(';').collect();
        assert_eq!(chains.len(), 4);
        assert!(chains[0].starts_with("[0:v]scale=w=1080:h=1920:force_original_aspect_ratio=increase"));
        assert!(chains[0].contains("fade=t=in:st=0:d=0.500"));
        assert!(chains[0].ends_with("[s0]"));
        assert_eq!(
            chains[1],
            "[s0]tpad=stop_mode=clone:stop_duration=1.000,trim=duration=4.000,setpts=PTS-STARTPTS[visual]"
        );
        assert_eq!(
            chains[2],
            "[2:a]volume=volume=0.2,atrim=duration=4.000,asetpts=PTS-STARTPTS[mixed_bed]"
        );
        assert!(chains[3].contains("amix=inputs=2:duration=first:dropout_transition=0:normalize=0"));
    }

    #[test]
    fn test_ffmpeg4_omits_normalize() {
        let serializer = FfmpegSerializer::new(EngineDialect::Ffmpeg4, EncodeSettings::default());
        let graph = serializer.filter_graph(&sample_plan());
        assert!(graph.contains("amix=inputs=2:duration=first:dropout_transition=0[mixed]"));
        assert!(!graph.contains("normalize"));
    }

    #[test]
    fn test_crossfade_chain_labels() {
        let node = MergeNode {
            label: "scenes".into(),
            inputs: vec![
                StreamRef::node("s0"),
                StreamRef::node("s1"),
                StreamRef::node("s2"),
            ],
            mode: MergeMode::Crossfade {
                duration_secs: 1.0,
                offsets: vec![2.0, 4.0],
            },
        };
        let chains = merge_chains(&node);
        assert_eq!(
            chains,
            vec![
                "[s0][s1]xfade=transition=fade:duration=1.000:offset=2.000[scenes_x1]".to_string(),
                "[scenes_x1][s2]xfade=transition=fade:duration=1.000:offset=4.000[scenes]".to_string(),
            ]
        );
    }

    #[test]
    fn test_zoompan_expressions() {
        let ramp = MotionRamp {
            zoom: storyreel_job_model::Ramp::new(1.0, 1.2),
            x: storyreel_job_model::Ramp::hold(0.5),
            y: storyreel_job_model::Ramp::hold(0.5),
        };
        let (z, x, y) = zoompan_exprs(&ramp, 91);
        assert_eq!(z, "1+(0.2)*on/90");
        assert_eq!(x, "(iw-iw/zoom)*(0.5)");
        assert_eq!(y, "(ih-ih/zoom)*(0.5)");
    }

    #[test]
    fn test_classify_success_and_small_artifact() {
        let plan = sample_plan();
        let out = Path::new("/w/out.mp4");
        assert!(classify_outcome(&plan, true, "", out, Some(50_000), 1024).is_success());
        assert!(matches!(
            classify_outcome(&plan, true, "", out, Some(10), 1024),
            RenderOutcome::Fatal { .. }
        ));
        assert!(matches!(
            classify_outcome(&plan, true, "", out, None, 1024),
            RenderOutcome::Fatal { .. }
        ));
    }

    #[test]
    fn test_classify_names_optional_input() {
        let plan = sample_plan();
        let out = Path::new("/w/out.mp4");

        let by_path = classify_outcome(
            &plan,
            false,
            "/w/ambience-0.mp3: Invalid data found when processing input",
            out,
            None,
            1024,
        );
        assert_eq!(
            by_path,
            RenderOutcome::Recoverable {
                feature: Feature::Ambience,
                diagnostic: "/w/ambience-0.mp3: Invalid data found when processing input".into(),
            }
        );

        let by_stream = classify_outcome(
            &plan,
            false,
            "Error while decoding stream #2:0: Invalid data",
            out,
            None,
            1024,
        );
        assert!(matches!(
            by_stream,
            RenderOutcome::Recoverable {
                feature: Feature::Ambience,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_required_input_is_fatal() {
        let plan = sample_plan();
        let outcome = classify_outcome(
            &plan,
            false,
            "/w/narration.mp3: No such file or directory",
            Path::new("/w/out.mp4"),
            None,
            1024,
        );
        assert!(matches!(outcome, RenderOutcome::Fatal { .. }));
    }

    #[test]
    fn test_filter_attribution_requires_feature() {
        let mut plan = sample_plan();
        let stderr = "[Parsed_xfade_3 @ 0x55] First input link main timebase do not match";
        assert_eq!(implicated_feature(&plan, stderr), None);
        plan.features.crossfade = true;
        assert_eq!(implicated_feature(&plan, stderr), Some(Feature::Crossfade));
    }

    #[test]
    fn test_dialect_parse() {
        assert_eq!(EngineDialect::parse("FFmpeg4"), Some(EngineDialect::Ffmpeg4));
        assert_eq!(EngineDialect::parse("ffmpeg5"), Some(EngineDialect::Ffmpeg5));
        assert_eq!(EngineDialect::parse("gstreamer"), None);
    }
}
