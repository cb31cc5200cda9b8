//! StoryReel Assets
//!
//! Everything between a locator and a validated asset:
//! - **Fetch:** Download or copy media with bounded retries
//! - **Probe:** Container inspection through `ffprobe`
//! - **Validate:** Magic-byte and decodability checks per media kind
//! - **Themes:** Declarative theme → candidate rule table
//! - **Resolver:** Candidate selection with fallback to defaults or nothing
//!
//! Optional assets never fail a job; only images and narration do.

pub mod fetch;
pub mod probe;
pub mod resolver;
pub mod themes;
pub mod validate;

pub use fetch::{AssetFetcher, FetchedMedia, HttpFetcher, RetryPolicy};
pub use probe::{FfprobeProbe, MediaProbe, ProbeReport};
pub use resolver::AssetResolver;
pub use themes::{ThemeMatch, ThemeRule, ThemeRuleTable};
pub use validate::{AssetValidator, ContainerFormat, InvalidAsset};
