//! StoryReel Render Engine
//!
//! Turns a planned timeline and validated assets into a video, stepping
//! down through simpler plans when the compositing engine fails.
//!
//! # Pipeline Architecture
//!
//! ```text
//! image-000.jpg ──► Transform ─┐
//! image-001.jpg ──► Transform ─┼── Merge (xfade | concat)
//! image-NNN.jpg ──► Transform ─┘         │
//!                                        ├── PadTrim (story)
//! end_card.png ──► Transform ────────────┤
//!                                        ├── PadTrim (narration length)
//! overlay.mp4 ───────────────────────────┤
//!                                        ├── OverlayComposite
//! narration.mp3 ──┐                      │
//!                 ├── AudioMix           │
//! ambience.mp3 ───┘       │              │
//!                         ▼              ▼
//!                     Encode (H.264 + AAC)
//!                                │
//!                                ▼
//!                            output.mp4
//! ```
//!
//! Plans are declarative ([`graph`]), built by [`builder`], serialized and
//! executed by [`ffmpeg`], and retried along the ladder in [`degrade`].

pub mod admission;
pub mod builder;
pub mod degrade;
pub mod ffmpeg;
pub mod graph;
pub mod service;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use builder::PlanBuilder;
pub use degrade::{ladder, AttemptRecord, DegradationController, DegradedRender, Rung, RungPreview};
pub use ffmpeg::{EncodeSettings, EngineDialect, FfmpegEngine, FfmpegSerializer, RenderEngine};
pub use graph::{InputRole, InputSpec, Node, RenderPlan, StreamRef};
pub use service::{JobStatus, LogStatusSink, RenderService, RenderedArtifact, StatusSink};
