//! Job service: one request in, one video out.
//!
//! ```text
//! validate request ─► admit ─► workdir ─┬─ fetch + validate images, narration
//!                                       └─ resolve ambience, overlay, end card
//!                                                  │
//!                                      degradation controller
//!                                                  │
//!                                      move artifact to destination
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;
use storyreel_assets::fetch::local_file_name;
use storyreel_assets::{
    AssetResolver, AssetValidator, FfprobeProbe, HttpFetcher, ThemeRuleTable,
};
use storyreel_common::config::{AppConfig, Resolution};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_job_model::{
    FeatureSet, JobAssets, JobSpec, MediaKind, OptionalAssets, RenderRequest,
};
use storyreel_planner::TimelinePlanner;
use tracing::{info, warn};

use crate::admission::AdmissionGate;
use crate::builder::PlanBuilder;
use crate::degrade::{AttemptRecord, DegradationController};
use crate::ffmpeg::{FfmpegEngine, RenderEngine};

/// Externally visible job state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Accepted,
    Rendering { features: FeatureSet },
    Completed { artifact: PathBuf, rung: String },
    Failed { kind: &'static str, message: String },
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Accepted => "accepted",
            JobStatus::Rendering { .. } => "rendering",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

/// Receives job state transitions.
pub trait StatusSink: Send + Sync {
    fn update(&self, job_id: &str, status: &JobStatus);
}

/// Status sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn update(&self, job_id: &str, status: &JobStatus) {
        match status {
            JobStatus::Failed { kind, message } => {
                warn!(job_id, status = status.label(), kind, "Job failed: {message}")
            }
            other => info!(job_id, status = other.label(), "Job status changed"),
        }
    }
}

/// A delivered render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedArtifact {
    pub job_id: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub duration_secs: f64,
    pub rung: String,
    pub features: FeatureSet,
    pub attempts: Vec<AttemptRecord>,
}

/// Runs render jobs end to end, one at a time.
pub struct RenderService {
    config: AppConfig,
    resolver: AssetResolver,
    engine: Arc<dyn RenderEngine>,
    gate: AdmissionGate,
    status: Arc<dyn StatusSink>,
}

impl RenderService {
    pub fn new(
        config: AppConfig,
        resolver: AssetResolver,
        engine: Arc<dyn RenderEngine>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            config,
            resolver,
            engine,
            gate: AdmissionGate::new(),
            status,
        }
    }

    /// Service wired to ffmpeg, ffprobe, and HTTP fetching.
    pub fn from_config(config: AppConfig) -> StoryreelResult<Self> {
        let table = match &config.assets.theme_rules_path {
            Some(path) => ThemeRuleTable::load(path)?,
            None => ThemeRuleTable::builtin(),
        };
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        let validator =
            AssetValidator::new(Arc::new(FfprobeProbe::new(config.render.ffprobe_path.clone())));
        let resolver = AssetResolver::new(fetcher, validator, table, &config.assets);
        let engine = Arc::new(FfmpegEngine::from_config(&config.render));
        Ok(Self::new(config, resolver, engine, Arc::new(LogStatusSink)))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    /// Render `request` and deliver the video to `destination`.
    pub async fn render(
        &self,
        request: &RenderRequest,
        destination: &Path,
    ) -> StoryreelResult<RenderedArtifact> {
        let spec = request
            .validate()
            .map_err(|e| StoryreelError::input_missing(e.field()))?;
        let canvas = self
            .config
            .resolution_for(spec.aspect_ratio.as_str())
            .ok_or_else(|| StoryreelError::input_missing("aspectRatio"))?;

        let _permit = self.gate.try_admit()?;
        self.status.update(&spec.job_id, &JobStatus::Accepted);

        let result = match tempfile::Builder::new().prefix("storyreel-").tempdir() {
            Ok(workdir) => self.run(&spec, canvas, workdir.path(), destination).await,
            Err(e) => Err(StoryreelError::Io(e)),
        };

        match &result {
            Ok(artifact) => self.status.update(
                &spec.job_id,
                &JobStatus::Completed {
                    artifact: artifact.path.clone(),
                    rung: artifact.rung.clone(),
                },
            ),
            Err(e) => self.status.update(
                &spec.job_id,
                &JobStatus::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                },
            ),
        }
        result
    }

    async fn run(
        &self,
        spec: &JobSpec,
        canvas: Resolution,
        workdir: &Path,
        destination: &Path,
    ) -> StoryreelResult<RenderedArtifact> {
        let mut assets = self.gather(spec, workdir).await?;
        let narration_secs = assets.narration_secs();

        let end_card_secs = self.config.timeline.end_card_secs;
        if assets.optional.end_card.is_some() && narration_secs <= end_card_secs {
            warn!(
                job_id = %spec.job_id,
                narration_secs,
                end_card_secs,
                "Narration too short for an end card; dropping it"
            );
            assets.optional.end_card = None;
        }

        let available = FeatureSet {
            overlay: assets.optional.overlay.is_some(),
            ambience: assets.optional.ambience.is_some(),
            end_card: assets.optional.end_card.is_some(),
            crossfade: self.config.timeline.crossfade,
            motion: true,
        };
        self.status.update(
            &spec.job_id,
            &JobStatus::Rendering {
                features: available,
            },
        );

        let controller = DegradationController::new(
            TimelinePlanner::from_config(&self.config.timeline),
            PlanBuilder::new(canvas, &self.config),
            self.engine.clone(),
            end_card_secs,
        );
        let output = workdir.join("render.mp4");
        let rendered = controller
            .render_with_degradation(&spec.job_id, &assets, available, &output)
            .await?;

        deliver(&rendered.artifact, destination).await?;
        info!(
            job_id = %spec.job_id,
            destination = %destination.display(),
            bytes = rendered.bytes,
            rung = %rendered.rung,
            attempts = rendered.attempts.len(),
            "Render delivered"
        );

        Ok(RenderedArtifact {
            job_id: spec.job_id.clone(),
            path: destination.to_path_buf(),
            bytes: rendered.bytes,
            duration_secs: narration_secs,
            rung: rendered.rung,
            features: rendered.features,
            attempts: rendered.attempts,
        })
    }

    /// Fetch required inputs and resolve optional assets concurrently.
    async fn gather(&self, spec: &JobSpec, workdir: &Path) -> StoryreelResult<JobAssets> {
        let images = try_join_all(spec.images.iter().enumerate().map(|(i, media)| {
            let dest = workdir.join(local_file_name(media, &format!("image-{i:03}")));
            async move { self.resolver.acquire_upload(media, &dest).await }
        }));
        let narration_dest = workdir.join(local_file_name(&spec.narration, "narration"));
        let narration = self.resolver.acquire_upload(&spec.narration, &narration_dest);

        let theme = spec.theme.as_deref();
        let ambience =
            self.resolver
                .resolve_theme_asset(&spec.job_id, theme, MediaKind::Ambience, workdir);
        let overlay =
            self.resolver
                .resolve_theme_asset(&spec.job_id, theme, MediaKind::Overlay, workdir);
        let end_card = async {
            if spec.use_end_card {
                self.resolver.resolve_end_card(&spec.job_id, workdir).await
            } else {
                None
            }
        };

        let (images, narration, ambience, overlay, end_card) =
            tokio::join!(images, narration, ambience, overlay, end_card);

        let images = images?;
        let narration = narration?;
        if narration.duration_secs().map_or(true, |d| d <= 0.0) {
            return Err(StoryreelError::asset_invalid(
                narration.locator(),
                "narration has no usable duration",
            ));
        }

        Ok(JobAssets {
            images,
            narration,
            optional: OptionalAssets {
                ambience,
                overlay,
                end_card,
            },
        })
    }
}

/// Move the artifact out of the working directory.
async fn deliver(artifact: &Path, destination: &Path) -> StoryreelResult<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(artifact, destination).await.is_err() {
        // Rename fails across filesystems.
        tokio::fs::copy(artifact, destination).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(JobStatus::Failed {
            kind: "EngineFatal",
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "EngineFatal");
        assert_eq!(JobStatus::Accepted.label(), "accepted");
    }
}
