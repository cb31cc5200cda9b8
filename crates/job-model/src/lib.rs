//! StoryReel Job Model
//!
//! Defines the core data contracts for narrated slideshow jobs:
//! - **Request:** The inbound job description (images, narration, theme)
//! - **Media:** Logical media references and validated assets
//! - **Timeline:** Per-scene durations, offsets, motion, and fades
//! - **Features:** The optional feature set a render plan carries
//! - **Outcome:** The classified result of one render attempt
//!
//! All durations are in seconds as `f64`.

pub mod features;
pub mod media;
pub mod outcome;
pub mod request;
pub mod timeline;

pub use features::*;
pub use media::*;
pub use outcome::*;
pub use request::*;
pub use timeline::*;
