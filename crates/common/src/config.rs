//! Application configuration.
//!
//! Values come from `config.json` (falling back to defaults) and are then
//! overridden by `STORYREEL_*` environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Theme asset library settings.
    pub assets: AssetsConfig,

    /// Timeline planning parameters.
    pub timeline: TimelineConfig,

    /// Render plan and engine settings.
    pub render: RenderConfig,

    /// Download retry policy.
    pub fetch: FetchConfig,

    /// Accepted aspect ratios and their output resolution.
    pub canvas: BTreeMap<String, Resolution>,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Where theme-mapped ambience and overlay assets live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Base locator joined with candidate ids (URL prefix or directory).
    pub asset_base: String,

    /// Optional JSON file replacing the built-in theme rule table.
    pub theme_rules_path: Option<PathBuf>,

    /// Ambience id tried after every theme candidate failed.
    pub default_ambience: Option<String>,

    /// Overlay id tried after every theme candidate failed.
    pub default_overlay: Option<String>,

    /// End card image id, used when a request asks for one.
    pub end_card: Option<String>,

    /// Directories request images and narration may be read from. Empty
    /// means request media must be `http(s)` URLs.
    pub upload_roots: Vec<PathBuf>,
}

/// Parameters of the timeline planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Floor for every scene's rendered duration.
    pub min_scene_secs: f64,

    /// Lower bound of the crossfade window.
    pub min_fade_secs: f64,

    /// Upper bound of the crossfade window.
    pub max_fade_secs: f64,

    /// Crossfade length as a fraction of the scene duration.
    pub fade_ratio: f64,

    /// Fade-in/out length applied at scene boundaries.
    pub edge_fade_secs: f64,

    /// Length of the closing end card.
    pub end_card_secs: f64,

    /// Crossfade between scenes (`false` = straight cuts).
    pub crossfade: bool,

    /// Output frame rate.
    pub fps: u32,

    /// Maximum zoom reached by the Ken Burns presets.
    pub zoom_factor: f64,

    /// Fraction of the available travel covered by pan presets.
    pub pan_ratio: f64,
}

/// Render plan and engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Engine binary.
    pub ffmpeg_path: String,

    /// Probe binary used by asset validation.
    pub ffprobe_path: String,

    /// Engine dialect (`ffmpeg5` or `ffmpeg4`).
    pub dialect: String,

    /// Overlay alpha. Kept within 0.10 - 0.25.
    pub overlay_opacity: f64,

    /// Ambience gain relative to narration. Kept within 0.15 - 0.25.
    pub ambience_volume: f64,

    /// Pre-scale factor applied before zoompan to reduce jitter.
    pub oversample: f64,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// x264 preset.
    pub preset: String,

    /// Artifacts smaller than this are treated as failed renders.
    pub min_artifact_bytes: u64,
}

/// Download retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per locator (including the first).
    pub max_attempts: u32,

    /// First backoff delay; doubles after each failed attempt.
    pub backoff_base_ms: u64,

    /// Per-request timeout.
    pub timeout_secs: u64,
}

/// Output resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut canvas = BTreeMap::new();
        canvas.insert(
            "16:9".to_string(),
            Resolution {
                width: 1920,
                height: 1080,
            },
        );
        canvas.insert(
            "9:16".to_string(),
            Resolution {
                width: 1080,
                height: 1920,
            },
        );
        Self {
            assets: AssetsConfig::default(),
            timeline: TimelineConfig::default(),
            render: RenderConfig::default(),
            fetch: FetchConfig::default(),
            canvas,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            asset_base: "assets".to_string(),
            theme_rules_path: None,
            default_ambience: Some("ambience/soft-room.mp3".to_string()),
            default_overlay: None,
            end_card: Some("endcard/endcard.png".to_string()),
            upload_roots: Vec::new(),
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_scene_secs: 3.0,
            min_fade_secs: 0.3,
            max_fade_secs: 1.0,
            fade_ratio: 0.35,
            edge_fade_secs: 0.5,
            end_card_secs: 3.0,
            crossfade: true,
            fps: 30,
            zoom_factor: 1.2,
            pan_ratio: 0.1,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            dialect: "ffmpeg5".to_string(),
            overlay_opacity: 0.18,
            ambience_volume: 0.2,
            oversample: 1.5,
            video_bitrate_kbps: 6000,
            audio_bitrate_kbps: 192,
            preset: "veryfast".to_string(),
            min_artifact_bytes: 1024,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 250,
            timeout_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

pub const OVERLAY_OPACITY_RANGE: (f64, f64) = (0.10, 0.25);
pub const AMBIENCE_VOLUME_RANGE: (f64, f64) = (0.15, 0.25);

impl AppConfig {
    /// Load config from the standard location, apply environment overrides,
    /// and sanitize the result.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        let mut config = Self::read_file(config_path).unwrap_or_default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.sanitize();
        config
    }

    fn read_file(config_path: &Path) -> Option<Self> {
        if !config_path.exists() {
            return None;
        }
        match std::fs::read_to_string(config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                None
            }
        }
    }

    /// Apply `STORYREEL_*` overrides using the given variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base) = lookup("STORYREEL_ASSET_BASE") {
            self.assets.asset_base = base;
        }
        if let Some(path) = lookup("STORYREEL_FFMPEG") {
            self.render.ffmpeg_path = path;
        }
        if let Some(path) = lookup("STORYREEL_FFPROBE") {
            self.render.ffprobe_path = path;
        }
        override_parsed(&lookup, "STORYREEL_MIN_SCENE_SECS", &mut self.timeline.min_scene_secs);
        override_parsed(&lookup, "STORYREEL_MIN_FADE_SECS", &mut self.timeline.min_fade_secs);
        override_parsed(&lookup, "STORYREEL_MAX_FADE_SECS", &mut self.timeline.max_fade_secs);
        override_parsed(&lookup, "STORYREEL_CROSSFADE", &mut self.timeline.crossfade);
        override_parsed(&lookup, "STORYREEL_OVERLAY_OPACITY", &mut self.render.overlay_opacity);
        override_parsed(&lookup, "STORYREEL_AMBIENCE_VOLUME", &mut self.render.ambience_volume);
        override_parsed(&lookup, "STORYREEL_FETCH_ATTEMPTS", &mut self.fetch.max_attempts);
    }

    /// Clamp tunables into their documented ranges.
    pub fn sanitize(&mut self) {
        let (lo, hi) = OVERLAY_OPACITY_RANGE;
        if !(lo..=hi).contains(&self.render.overlay_opacity) {
            tracing::warn!(
                value = self.render.overlay_opacity,
                "Overlay opacity outside {lo}-{hi}, clamping"
            );
            self.render.overlay_opacity = clamp_or(self.render.overlay_opacity, lo, hi);
        }

        let (lo, hi) = AMBIENCE_VOLUME_RANGE;
        if !(lo..=hi).contains(&self.render.ambience_volume) {
            tracing::warn!(
                value = self.render.ambience_volume,
                "Ambience volume outside {lo}-{hi}, clamping"
            );
            self.render.ambience_volume = clamp_or(self.render.ambience_volume, lo, hi);
        }

        let timeline = &mut self.timeline;
        if !(timeline.min_scene_secs.is_finite() && timeline.min_scene_secs > 0.0) {
            timeline.min_scene_secs = TimelineConfig::default().min_scene_secs;
        }
        if timeline.min_fade_secs > timeline.max_fade_secs {
            std::mem::swap(&mut timeline.min_fade_secs, &mut timeline.max_fade_secs);
        }
        timeline.min_fade_secs = timeline.min_fade_secs.max(0.0);
        timeline.fps = timeline.fps.max(1);
        timeline.zoom_factor = timeline.zoom_factor.max(1.0);
        timeline.pan_ratio = timeline.pan_ratio.clamp(0.0, 1.0);

        self.fetch.max_attempts = self.fetch.max_attempts.max(1);
        self.render.oversample = self.render.oversample.max(1.0);
    }

    /// Resolution for an aspect ratio key such as `"16:9"`.
    pub fn resolution_for(&self, aspect: &str) -> Option<Resolution> {
        self.canvas.get(aspect).copied()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparsable config override"),
    }
}

fn clamp_or(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("storyreel").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_canvas_mapping() {
        let config = AppConfig::default();
        assert_eq!(
            config.resolution_for("16:9"),
            Some(Resolution {
                width: 1920,
                height: 1080
            })
        );
        assert_eq!(
            config.resolution_for("9:16"),
            Some(Resolution {
                width: 1080,
                height: 1920
            })
        );
        assert_eq!(config.resolution_for("4:3"), None);
    }

    #[test]
    fn test_env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("STORYREEL_ASSET_BASE", "https://cdn.example.com/themes"),
            ("STORYREEL_MIN_SCENE_SECS", "2.5"),
            ("STORYREEL_CROSSFADE", "false"),
            ("STORYREEL_FETCH_ATTEMPTS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.assets.asset_base, "https://cdn.example.com/themes");
        assert!((config.timeline.min_scene_secs - 2.5).abs() < 1e-9);
        assert!(!config.timeline.crossfade);
        // Unparsable value leaves the default in place
        assert_eq!(config.fetch.max_attempts, 3);
    }

    #[test]
    fn test_sanitize_clamps_mix_levels() {
        let mut config = AppConfig::default();
        config.render.overlay_opacity = 0.9;
        config.render.ambience_volume = 0.01;
        config.timeline.min_fade_secs = 2.0;
        config.timeline.max_fade_secs = 0.5;
        config.sanitize();

        assert!((config.render.overlay_opacity - 0.25).abs() < 1e-9);
        assert!((config.render.ambience_volume - 0.15).abs() < 1e-9);
        assert!(config.timeline.min_fade_secs <= config.timeline.max_fade_secs);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"render": {"overlay_opacity": 0.12}}"#).unwrap();

        let config = AppConfig::read_file(&path).unwrap();
        assert!((config.render.overlay_opacity - 0.12).abs() < 1e-9);
        assert_eq!(config.render.ffmpeg_path, "ffmpeg");
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.canvas.len(), 2);
    }

    #[test]
    fn test_invalid_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(AppConfig::read_file(&path).is_none());
    }
}
