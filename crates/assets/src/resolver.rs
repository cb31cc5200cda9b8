//! Optional asset resolution.
//!
//! Ambience, overlay, and end card are best-effort: every failure is logged
//! and the resolver moves on to the next candidate, ending with `None`.
//! Request media (images, narration) is required and may only come from
//! `http(s)` URLs or the configured upload roots.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_common::config::AssetsConfig;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_job_model::{MediaKind, MediaRef, ValidatedAsset};
use tracing::{debug, info, warn};

use crate::fetch::{local_file_name, local_source, AssetFetcher};
use crate::themes::ThemeRuleTable;
use crate::validate::AssetValidator;

/// Fetches and validates media, choosing among theme candidates.
#[derive(Clone)]
pub struct AssetResolver {
    fetcher: Arc<dyn AssetFetcher>,
    validator: AssetValidator,
    table: ThemeRuleTable,
    asset_base: String,
    default_ambience: Option<String>,
    default_overlay: Option<String>,
    end_card: Option<String>,
    upload_roots: Vec<PathBuf>,
}

impl AssetResolver {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        validator: AssetValidator,
        table: ThemeRuleTable,
        config: &AssetsConfig,
    ) -> Self {
        Self {
            fetcher,
            validator,
            table,
            asset_base: config.asset_base.clone(),
            default_ambience: config.default_ambience.clone(),
            default_overlay: config.default_overlay.clone(),
            end_card: config.end_card.clone(),
            upload_roots: config.upload_roots.clone(),
        }
    }

    pub fn table(&self) -> &ThemeRuleTable {
        &self.table
    }

    /// Turn an asset id into a locator under the asset base.
    ///
    /// Ids that are already URLs or absolute paths are returned unchanged.
    pub fn locate(&self, id: &str) -> String {
        let lower = id.to_ascii_lowercase();
        if lower.starts_with("http://")
            || lower.starts_with("https://")
            || lower.starts_with("file://")
            || Path::new(id).is_absolute()
        {
            return id.to_string();
        }

        let base = self.asset_base.trim_end_matches('/');
        if base.is_empty() {
            return id.to_string();
        }
        let base_lower = base.to_ascii_lowercase();
        if base_lower.starts_with("http://") || base_lower.starts_with("https://") {
            format!("{base}/{}", id.trim_start_matches('/'))
        } else {
            Path::new(base).join(id).display().to_string()
        }
    }

    /// Candidate locators in the order they will be tried.
    ///
    /// Theme candidates come first in per-job rotated order, then the
    /// configured default for the kind.
    pub fn candidate_locators(
        &self,
        job_id: &str,
        theme: Option<&str>,
        kind: MediaKind,
    ) -> Vec<String> {
        let mut ids = self.table.ordered_candidates(job_id, theme, kind);
        let fallback = match kind {
            MediaKind::Ambience => self.default_ambience.as_ref(),
            MediaKind::Overlay => self.default_overlay.as_ref(),
            _ => None,
        };
        if let Some(default) = fallback {
            if !ids.contains(default) {
                ids.push(default.clone());
            }
        }
        ids.iter().map(|id| self.locate(id)).collect()
    }

    /// Fetch `media` into `dest` and validate it.
    pub async fn acquire(&self, media: &MediaRef, dest: &Path) -> StoryreelResult<ValidatedAsset> {
        let fetched = self.fetcher.fetch(media, dest).await?;
        let validator = self.validator.clone();
        let validated = tokio::task::spawn_blocking(move || validator.validate_file(&fetched.media))
        .await
        .map_err(|e| StoryreelError::Other(anyhow::anyhow!("validation task failed: {e}")))??;
        Ok(validated)
    }

    /// Like [`acquire`](Self::acquire) for media named by a request.
    ///
    /// Local locators are refused unless they resolve inside an upload root.
    pub async fn acquire_upload(
        &self,
        media: &MediaRef,
        dest: &Path,
    ) -> StoryreelResult<ValidatedAsset> {
        self.check_upload_source(&media.locator).await?;
        self.acquire(media, dest).await
    }

    async fn check_upload_source(&self, locator: &str) -> StoryreelResult<()> {
        let Some(path) = local_source(locator) else {
            return Ok(());
        };
        let resolved = tokio::fs::canonicalize(&path).await.map_err(|e| {
            StoryreelError::fetch_failed(locator, format!("read {}: {e}", path.display()))
        })?;
        for root in &self.upload_roots {
            match tokio::fs::canonicalize(root).await {
                Ok(root) if resolved.starts_with(&root) => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!(root = %root.display(), "Upload root unavailable: {e}"),
            }
        }
        Err(StoryreelError::fetch_failed(
            locator,
            "local files are only read from configured upload roots",
        ))
    }

    /// Pick the first usable theme candidate for `kind`, or nothing.
    pub async fn resolve_theme_asset(
        &self,
        job_id: &str,
        theme: Option<&str>,
        kind: MediaKind,
        workdir: &Path,
    ) -> Option<ValidatedAsset> {
        let candidates = self.candidate_locators(job_id, theme, kind);
        if candidates.is_empty() {
            debug!(job_id, %kind, theme = ?theme, "No candidates configured");
            return None;
        }

        for (i, locator) in candidates.iter().enumerate() {
            let media = MediaRef::new(kind, locator.as_str());
            let dest = workdir.join(local_file_name(&media, &format!("{kind}-{i}")));
            match self.acquire(&media, &dest).await {
                Ok(asset) => {
                    info!(job_id, %kind, locator = %locator, "Resolved optional asset");
                    return Some(asset);
                }
                Err(e) => {
                    warn!(job_id, %kind, locator = %locator, "Skipping candidate: {e}");
                    let _ = tokio::fs::remove_file(&dest).await;
                }
            }
        }

        warn!(job_id, %kind, "No usable candidate; continuing without it");
        None
    }

    /// Fetch and validate the configured end card, or nothing.
    pub async fn resolve_end_card(&self, job_id: &str, workdir: &Path) -> Option<ValidatedAsset> {
        let id = self.end_card.as_deref()?;
        let media = MediaRef::new(MediaKind::EndCard, self.locate(id));
        let dest = workdir.join(local_file_name(&media, "end_card"));
        match self.acquire(&media, &dest).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!(job_id, locator = %media.locator, "End card unavailable: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{MediaProbe, ProbeReport};
    use crate::themes::ThemeRule;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::fetch::FetchedMedia;

    struct AudioProbe;

    impl MediaProbe for AudioProbe {
        fn probe(&self, _path: &Path) -> StoryreelResult<ProbeReport> {
            Ok(ProbeReport {
                duration_secs: Some(30.0),
                audio_streams: 1,
                ..Default::default()
            })
        }
    }

    /// Serves canned bytes per locator and records every request.
    #[derive(Default)]
    struct MapFetcher {
        blobs: HashMap<String, Vec<u8>>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AssetFetcher for MapFetcher {
        async fn fetch(&self, media: &MediaRef, dest: &Path) -> StoryreelResult<FetchedMedia> {
            self.requested.lock().unwrap().push(media.locator.clone());
            let bytes = self
                .blobs
                .get(&media.locator)
                .cloned()
                .ok_or_else(|| StoryreelError::fetch_failed(&media.locator, "HTTP 404"))?;
            std::fs::write(dest, &bytes)?;
            Ok(FetchedMedia {
                media: media.clone().materialized(dest),
                size: bytes.len() as u64,
            })
        }
    }

    fn config() -> AssetsConfig {
        AssetsConfig {
            asset_base: "https://assets.example.com/lib/".to_string(),
            theme_rules_path: None,
            default_ambience: Some("ambience/default.mp3".to_string()),
            default_overlay: None,
            end_card: Some("endcard/card.png".to_string()),
            upload_roots: Vec::new(),
        }
    }

    fn table() -> ThemeRuleTable {
        ThemeRuleTable {
            rules: vec![ThemeRule {
                name: "rain".into(),
                keywords: vec!["storm".into()],
                ambience: vec!["ambience/a.mp3".into(), "ambience/b.mp3".into()],
                overlay: vec!["overlay/streaks.mp4".into()],
            }],
            default: ThemeRule {
                name: "default".into(),
                keywords: vec![],
                ambience: vec![],
                overlay: vec![],
            },
        }
    }

    fn resolver(fetcher: Arc<MapFetcher>) -> AssetResolver {
        AssetResolver::new(
            fetcher,
            AssetValidator::new(Arc::new(AudioProbe)),
            table(),
            &config(),
        )
    }

    #[test]
    fn test_locate() {
        let r = resolver(Arc::new(MapFetcher::default()));
        assert_eq!(
            r.locate("ambience/a.mp3"),
            "https://assets.example.com/lib/ambience/a.mp3"
        );
        assert_eq!(r.locate("https://x.test/y.mp3"), "https://x.test/y.mp3");
        assert_eq!(r.locate("/srv/y.mp3"), "/srv/y.mp3");
    }

    #[test]
    fn test_candidates_end_with_default() {
        let r = resolver(Arc::new(MapFetcher::default()));
        let c = r.candidate_locators("job-1", Some("Storm chasers"), MediaKind::Ambience);
        assert_eq!(c.len(), 3);
        assert_eq!(c[2], "https://assets.example.com/lib/ambience/default.mp3");

        // Overlay has no configured default and the default bucket is empty.
        assert!(r
            .candidate_locators("job-1", Some("unknown"), MediaKind::Overlay)
            .is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_past_broken_candidates() {
        let default = "https://assets.example.com/lib/ambience/default.mp3".to_string();
        let mut fetcher = MapFetcher::default();
        // Theme candidates are missing or garbage; only the default is usable.
        fetcher.blobs.insert(
            "https://assets.example.com/lib/ambience/a.mp3".into(),
            b"<html>oops</html>".to_vec(),
        );
        fetcher
            .blobs
            .insert(default.clone(), b"ID3\x04\0\0\0\0\0\0".to_vec());
        let fetcher = Arc::new(fetcher);
        let r = resolver(fetcher.clone());

        let dir = tempfile::tempdir().unwrap();
        let asset = r
            .resolve_theme_asset("job-1", Some("rain"), MediaKind::Ambience, dir.path())
            .await
            .unwrap();
        assert_eq!(asset.locator(), default);
        assert_eq!(asset.duration_secs(), Some(30.0));
        assert_eq!(fetcher.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_nothing_usable_is_none() {
        let fetcher = Arc::new(MapFetcher::default());
        let r = resolver(fetcher);
        let dir = tempfile::tempdir().unwrap();
        assert!(r
            .resolve_theme_asset("job-1", Some("rain"), MediaKind::Overlay, dir.path())
            .await
            .is_none());
        assert!(r.resolve_end_card("job-1", dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_uploads_outside_roots_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(uploads.join("voice.mp3"), b"ID3\x04\0\0\0\0\0\0").unwrap();
        std::fs::write(dir.path().join("secret.mp3"), b"ID3\x04\0\0\0\0\0\0").unwrap();

        let mut cfg = config();
        cfg.upload_roots = vec![uploads.clone()];
        let r = AssetResolver::new(
            Arc::new(crate::fetch::HttpFetcher::new(&Default::default()).unwrap()),
            AssetValidator::new(Arc::new(AudioProbe)),
            table(),
            &cfg,
        );
        let work = tempfile::tempdir().unwrap();

        let inside = MediaRef::new(
            MediaKind::Narration,
            uploads.join("voice.mp3").display().to_string(),
        );
        let asset = r
            .acquire_upload(&inside, &work.path().join("narration.mp3"))
            .await
            .unwrap();
        assert_eq!(asset.duration_secs(), Some(30.0));

        let escaping = format!("file://{}/../secret.mp3", uploads.display());
        for locator in [escaping, dir.path().join("secret.mp3").display().to_string()] {
            let media = MediaRef::new(MediaKind::Narration, locator);
            let err = r
                .acquire_upload(&media, &work.path().join("stolen.mp3"))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "AssetFetchFailed");
            assert!(!work.path().join("stolen.mp3").exists());
        }
    }

    #[tokio::test]
    async fn test_remote_uploads_skip_root_check() {
        let mut fetcher = MapFetcher::default();
        fetcher.blobs.insert(
            "https://cdn.example.com/voice.mp3".into(),
            b"ID3\x04\0\0\0\0\0\0".to_vec(),
        );
        let r = resolver(Arc::new(fetcher));
        let dir = tempfile::tempdir().unwrap();
        let media = MediaRef::new(MediaKind::Narration, "https://cdn.example.com/voice.mp3");
        assert!(r
            .acquire_upload(&media, &dir.path().join("narration.mp3"))
            .await
            .is_ok());
    }
}
