//! Media fetching.
//!
//! `http(s)` locators are streamed to disk; `file://` URLs and bare paths are
//! copied. Transport failures and 5xx/429 responses are retried with
//! exponential backoff; other 4xx responses and missing local files are not.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use storyreel_common::config::FetchConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_job_model::MediaRef;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A media reference materialized on local disk.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// The reference with `local_path` set.
    pub media: MediaRef,
    /// Bytes written to disk.
    pub size: u64,
}

/// Materializes media references into a working directory.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch `media` and write it to `dest`.
    async fn fetch(&self, media: &MediaRef, dest: &Path) -> StoryreelResult<FetchedMedia>;
}

/// Retry schedule for a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Delay before attempt `attempt` (1-based); doubles after each failure.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

/// One failed attempt.
#[derive(Debug)]
struct AttemptError {
    message: String,
    retryable: bool,
}

impl AttemptError {
    fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Where a locator points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Http(String),
    Local(PathBuf),
}

fn classify_locator(locator: &str) -> Source {
    let lower = locator.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Source::Http(locator.to_string())
    } else if let Some(rest) = locator.strip_prefix("file://") {
        Source::Local(PathBuf::from(rest))
    } else {
        Source::Local(PathBuf::from(locator))
    }
}

/// Filesystem path a locator reads from, or `None` for `http(s)` locators.
pub fn local_source(locator: &str) -> Option<PathBuf> {
    match classify_locator(locator) {
        Source::Http(_) => None,
        Source::Local(path) => Some(path),
    }
}

/// Fetcher for `http(s)`, `file://`, and plain filesystem locators.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> StoryreelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("storyreel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoryreelError::config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            policy: RetryPolicy::from_config(config),
        })
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt(&self, source: &Source, dest: &Path) -> Result<u64, AttemptError> {
        match source {
            Source::Http(url) => {
                let mut response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| AttemptError::retryable(format!("request failed: {e}")))?;

                let status = response.status();
                if !status.is_success() {
                    let message = format!("HTTP {status}");
                    return Err(if status.is_server_error() || status.as_u16() == 429 {
                        AttemptError::retryable(message)
                    } else {
                        AttemptError::permanent(message)
                    });
                }

                let write_failed = |e: std::io::Error| {
                    AttemptError::retryable(format!("write {}: {e}", dest.display()))
                };
                let mut file = tokio::fs::File::create(dest).await.map_err(write_failed)?;
                let mut size = 0u64;
                while let Some(chunk) = response
                    .chunk()
                    .await
                    .map_err(|e| AttemptError::retryable(format!("body read failed: {e}")))?
                {
                    file.write_all(&chunk).await.map_err(write_failed)?;
                    size += chunk.len() as u64;
                }
                file.flush().await.map_err(write_failed)?;
                Ok(size)
            }
            Source::Local(path) => tokio::fs::copy(path, dest).await.map_err(|e| {
                let message = format!("read {}: {e}", path.display());
                if e.kind() == std::io::ErrorKind::NotFound {
                    AttemptError::permanent(message)
                } else {
                    AttemptError::retryable(message)
                }
            }),
        }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, media: &MediaRef, dest: &Path) -> StoryreelResult<FetchedMedia> {
        let source = classify_locator(&media.locator);
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.policy.max_attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&source, dest).await {
                Ok(size) => {
                    debug!(
                        kind = %media.kind,
                        locator = %media.locator,
                        bytes = size,
                        attempt,
                        "Fetched media"
                    );
                    return Ok(FetchedMedia {
                        media: media.clone().materialized(dest),
                        size,
                    });
                }
                Err(err) => {
                    warn!(
                        kind = %media.kind,
                        locator = %media.locator,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        "Fetch attempt failed: {}",
                        err.message
                    );
                    last_error = err.message;
                    if !err.retryable {
                        break;
                    }
                }
            }
        }

        // Drop whatever a failed download left behind.
        let _ = tokio::fs::remove_file(dest).await;
        Err(StoryreelError::fetch_failed(&media.locator, last_error))
    }
}

/// Local file name for a fetched media reference.
pub fn local_file_name(media: &MediaRef, stem: &str) -> String {
    match media.extension_hint() {
        Some(ext) => format!("{stem}.{}", ext.to_ascii_lowercase()),
        None => format!("{stem}.bin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_job_model::MediaKind;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetchConfig {
            max_attempts: 3,
            backoff_base_ms: 1,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(250));
        assert_eq!(policy.delay_before(3), Duration::from_millis(500));
        assert_eq!(policy.delay_before(4), Duration::from_millis(1000));
    }

    #[test]
    fn test_classify_locator() {
        assert_eq!(
            classify_locator("HTTPS://cdn.example.com/a.jpg"),
            Source::Http("HTTPS://cdn.example.com/a.jpg".to_string())
        );
        assert_eq!(
            classify_locator("file:///srv/a.jpg"),
            Source::Local(PathBuf::from("/srv/a.jpg"))
        );
        assert_eq!(
            classify_locator("assets/a.jpg"),
            Source::Local(PathBuf::from("assets/a.jpg"))
        );
    }

    #[test]
    fn test_local_source() {
        assert_eq!(local_source("https://cdn.example.com/a.jpg"), None);
        assert_eq!(local_source("file:///srv/a.jpg"), Some(PathBuf::from("/srv/a.jpg")));
        assert_eq!(local_source("a.jpg"), Some(PathBuf::from("a.jpg")));
    }

    #[test]
    fn test_local_file_name() {
        let media = MediaRef::new(MediaKind::Image, "https://x.test/p/Photo.JPG?sig=1");
        assert_eq!(local_file_name(&media, "image-000"), "image-000.jpg");
        let media = MediaRef::new(MediaKind::Narration, "https://x.test/voice");
        assert_eq!(local_file_name(&media, "narration"), "narration.bin");
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.mp3");
        std::fs::write(&src, b"ID3payload").unwrap();

        let media = MediaRef::new(MediaKind::Narration, format!("file://{}", src.display()));
        let dest = dir.path().join("narration.mp3");
        let fetched = fetcher().fetch(&media, &dest).await.unwrap();

        assert_eq!(fetched.size, 10);
        assert_eq!(fetched.media.local_path.as_deref(), Some(dest.as_path()));
        assert_eq!(std::fs::read(&dest).unwrap(), b"ID3payload");
    }

    #[tokio::test]
    async fn test_missing_local_file_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaRef::new(MediaKind::Overlay, dir.path().join("nope.mp4").display().to_string());
        let err = fetcher()
            .fetch(&media, &dir.path().join("overlay.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "AssetFetchFailed");
        assert!(!dir.path().join("overlay.mp4").exists());
    }
}
