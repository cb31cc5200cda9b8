//! Ken Burns motion presets.
//!
//! Each preset maps to a [`MotionRamp`]: zoom and crop-window position as
//! linear functions of scene progress. Ramps are monotonic and start and end
//! exactly at the configured bounds, so neighboring scenes never jump.

use serde::{Deserialize, Serialize};
use storyreel_common::config::TimelineConfig;
use storyreel_job_model::timeline::{MotionPreset, MotionRamp, Ramp};

/// Bounds shared by every preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSettings {
    /// Magnification reached by zoom presets and held by pan presets.
    pub zoom_factor: f64,

    /// Horizontal/vertical distance covered by pan presets, as a fraction of
    /// the frame size.
    pub pan_ratio: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            zoom_factor: 1.2,
            pan_ratio: 0.1,
        }
    }
}

impl MotionSettings {
    pub fn from_config(config: &TimelineConfig) -> Self {
        Self {
            zoom_factor: config.zoom_factor.max(1.0),
            pan_ratio: config.pan_ratio.clamp(0.0, 1.0),
        }
    }

    /// Half-width of the pan sweep in travel units, centered on 0.5.
    ///
    /// At zoom `z` the crop window can move `1 - 1/z` of the frame, so a pan
    /// of `pan_ratio` frame widths covers `pan_ratio / (1 - 1/z)` of it.
    fn pan_half_span(&self) -> f64 {
        let travel = 1.0 - 1.0 / self.zoom_factor;
        if travel <= 1e-9 {
            return 0.0;
        }
        (self.pan_ratio / travel / 2.0).min(0.5)
    }
}

/// Camera path for a preset.
pub fn motion_ramp(preset: MotionPreset, settings: &MotionSettings) -> MotionRamp {
    let z = settings.zoom_factor;
    let span = settings.pan_half_span();
    let centered = Ramp::hold(0.5);

    match preset {
        MotionPreset::ZoomIn => MotionRamp {
            zoom: Ramp::new(1.0, z),
            x: centered,
            y: centered,
        },
        MotionPreset::ZoomOut => MotionRamp {
            zoom: Ramp::new(z, 1.0),
            x: centered,
            y: centered,
        },
        // Panning left moves the view left: the window slides from right to left.
        MotionPreset::PanLeft => MotionRamp {
            zoom: Ramp::hold(z),
            x: Ramp::new(0.5 + span, 0.5 - span),
            y: centered,
        },
        MotionPreset::PanRight => MotionRamp {
            zoom: Ramp::hold(z),
            x: Ramp::new(0.5 - span, 0.5 + span),
            y: centered,
        },
        MotionPreset::PanUp => MotionRamp {
            zoom: Ramp::hold(z),
            x: centered,
            y: Ramp::new(0.5 + span, 0.5 - span),
        },
        MotionPreset::PanDown => MotionRamp {
            zoom: Ramp::hold(z),
            x: centered,
            y: Ramp::new(0.5 - span, 0.5 + span),
        },
        MotionPreset::Static => MotionRamp::STILL,
    }
}
