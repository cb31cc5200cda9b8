//! StoryReel Planner
//!
//! Turns a narration duration and an image count into a render schedule:
//! - **Timeline:** Scene durations, offsets, crossfades, and fades
//! - **Motion:** Parametric pan/zoom paths for each motion preset
//!
//! This crate is pure computation — no I/O, no engine dependencies.
//! All inputs are data; all outputs are data.

pub mod motion;
pub mod timeline;

pub use motion::{motion_ramp, MotionSettings};
pub use timeline::TimelinePlanner;
