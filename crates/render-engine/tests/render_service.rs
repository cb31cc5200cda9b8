use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storyreel_assets::{
    AssetFetcher, AssetResolver, AssetValidator, FetchedMedia, HttpFetcher, MediaProbe,
    ProbeReport, ThemeRule, ThemeRuleTable,
};
use storyreel_common::config::{AppConfig, FetchConfig};
use storyreel_common::error::StoryreelResult;
use storyreel_job_model::{MediaRef, RenderOutcome, RenderRequest};
use storyreel_render_engine::{
    InputRole, JobStatus, RenderEngine, RenderPlan, RenderService, StatusSink, StreamRef,
};
use tempfile::TempDir;

const MP3: &[u8] = b"ID3\x04\0\0\0\0\0\0payload";
const MP4: &[u8] = b"\0\0\0\x20ftypisom\0\0\x02\0payload";

/// Probe that trusts file extensions and reports a fixed narration length.
struct ExtensionProbe {
    audio_secs: f64,
}

impl MediaProbe for ExtensionProbe {
    fn probe(&self, path: &Path) -> StoryreelResult<ProbeReport> {
        let is_video = path.extension().and_then(|e| e.to_str()) == Some("mp4");
        Ok(if is_video {
            ProbeReport {
                duration_secs: Some(8.0),
                video_streams: 1,
                width: Some(1280),
                height: Some(720),
                ..Default::default()
            }
        } else {
            ProbeReport {
                duration_secs: Some(self.audio_secs),
                audio_streams: 1,
                ..Default::default()
            }
        })
    }
}

/// Counts fetches before delegating to the real fetcher.
struct CountingFetcher {
    inner: HttpFetcher,
    calls: AtomicUsize,
}

#[async_trait]
impl AssetFetcher for CountingFetcher {
    async fn fetch(&self, media: &MediaRef, dest: &Path) -> StoryreelResult<FetchedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(media, dest).await
    }
}

/// Engine that writes a dummy artifact and records plans.
#[derive(Default)]
struct RecordingEngine {
    plans: Mutex<Vec<RenderPlan>>,
}

#[async_trait]
impl RenderEngine for RecordingEngine {
    async fn execute(&self, plan: &RenderPlan, output: &Path) -> RenderOutcome {
        self.plans.lock().unwrap().push(plan.clone());
        let bytes = vec![0u8; 8192];
        match std::fs::write(output, &bytes) {
            Ok(()) => RenderOutcome::Success {
                artifact: output.to_path_buf(),
                bytes: bytes.len() as u64,
            },
            Err(e) => RenderOutcome::Fatal {
                diagnostic: e.to_string(),
            },
        }
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Default)]
struct RecordingSink {
    statuses: Mutex<Vec<String>>,
}

impl StatusSink for RecordingSink {
    fn update(&self, _job_id: &str, status: &JobStatus) {
        self.statuses.lock().unwrap().push(status.label().to_string());
    }
}

struct Harness {
    _dir: TempDir,
    uploads: PathBuf,
    out_dir: PathBuf,
    service: RenderService,
    fetcher: Arc<CountingFetcher>,
    engine: Arc<RecordingEngine>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(narration_secs: f64) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = dir.path().join("library");
        let uploads = dir.path().join("uploads");
        let out_dir = dir.path().join("out");
        for sub in ["ambience", "overlay", "endcard"] {
            std::fs::create_dir_all(library.join(sub)).unwrap();
        }
        std::fs::create_dir_all(&uploads).unwrap();

        std::fs::write(library.join("ambience/rain.mp3"), MP3).unwrap();
        std::fs::write(library.join("ambience/garbage.mp3"), b"<html>502</html>").unwrap();
        std::fs::write(library.join("overlay/streaks.mp4"), MP4).unwrap();
        write_png(&library.join("endcard/card.png"));
        std::fs::write(uploads.join("voice.mp3"), MP3).unwrap();
        for i in 0..10 {
            write_png(&uploads.join(format!("photo-{i}.png")));
        }

        let mut config = AppConfig::default();
        config.assets.asset_base = library.display().to_string();
        config.assets.default_ambience = None;
        config.assets.default_overlay = None;
        config.assets.end_card = Some("endcard/card.png".to_string());
        config.assets.upload_roots = vec![uploads.clone()];

        let table = ThemeRuleTable {
            rules: vec![
                ThemeRule {
                    name: "rain".into(),
                    keywords: vec!["rainy".into()],
                    ambience: vec!["ambience/rain.mp3".into()],
                    overlay: vec!["overlay/unreachable.mp4".into()],
                },
                ThemeRule {
                    name: "storm".into(),
                    keywords: vec![],
                    ambience: vec!["ambience/garbage.mp3".into()],
                    overlay: vec!["overlay/streaks.mp4".into()],
                },
            ],
            default: ThemeRule {
                name: "default".into(),
                keywords: vec![],
                ambience: vec![],
                overlay: vec![],
            },
        };

        let fetcher = Arc::new(CountingFetcher {
            inner: HttpFetcher::new(&FetchConfig {
                max_attempts: 1,
                backoff_base_ms: 1,
                timeout_secs: 5,
            })
            .unwrap(),
            calls: AtomicUsize::new(0),
        });
        let validator = AssetValidator::new(Arc::new(ExtensionProbe {
            audio_secs: narration_secs,
        }));
        let resolver = AssetResolver::new(fetcher.clone(), validator, table, &config.assets);
        let engine = Arc::new(RecordingEngine::default());
        let sink = Arc::new(RecordingSink::default());
        let service = RenderService::new(config, resolver, engine.clone(), sink.clone());

        Self {
            _dir: dir,
            uploads,
            out_dir,
            service,
            fetcher,
            engine,
            sink,
        }
    }

    fn request(&self, images: usize, theme: Option<&str>, end_card: bool) -> RenderRequest {
        let images: Vec<String> = (0..images)
            .map(|i| self.uploads.join(format!("photo-{i}.png")).display().to_string())
            .collect();
        let json = serde_json::json!({
            "jobId": "job-77",
            "images": images,
            "narrationAudio": self.uploads.join("voice.mp3").display().to_string(),
            "aspectRatio": "9:16",
            "theme": theme,
            "useEndCard": end_card,
        });
        RenderRequest::from_json(&json.to_string()).expect("request json")
    }

    fn last_plan(&self) -> RenderPlan {
        self.engine
            .plans
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("engine was called")
    }
}

fn write_png(path: &Path) {
    image::RgbaImage::from_pixel(8, 6, image::Rgba([200, 120, 40, 255]))
        .save(path)
        .expect("png written");
}

#[tokio::test]
async fn missing_narration_fails_before_any_download() {
    let h = Harness::new(18.0);
    let mut request = h.request(3, Some("rain"), false);
    request.narration_audio = None;

    let err = h
        .service
        .render(&request, &h.out_dir.join("video.mp4"))
        .await
        .expect_err("narration is required");

    assert_eq!(err.kind(), "InputMissing");
    assert_eq!(err.status_code(), 400);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
    assert!(h.engine.plans.lock().unwrap().is_empty());
    assert!(h.sink.statuses.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_overlay_renders_without_overlay() {
    let h = Harness::new(18.0);
    let destination = h.out_dir.join("video.mp4");
    let artifact = h
        .service
        .render(&h.request(6, Some("Rainy evening"), false), &destination)
        .await
        .expect("render should succeed");

    assert!(destination.exists());
    assert_eq!(artifact.path, destination);
    assert_eq!(artifact.attempts.len(), 1);
    assert!(!artifact.features.overlay);
    assert!(artifact.features.ambience);

    let plan = h.last_plan();
    assert!(!plan.has_node_kind("overlay_composite"));
    assert!(plan.has_node_kind("audio_mix"));
    assert!(plan.input_index(InputRole::Overlay).is_none());
    assert_eq!((plan.width, plan.height), (1080, 1920));

    assert_eq!(
        *h.sink.statuses.lock().unwrap(),
        ["accepted", "rendering", "completed"]
    );
}

#[tokio::test]
async fn invalid_ambience_is_dropped_but_overlay_kept() {
    let h = Harness::new(18.0);
    let artifact = h
        .service
        .render(&h.request(4, Some("storm"), false), &h.out_dir.join("storm.mp4"))
        .await
        .expect("render should succeed");

    assert!(artifact.features.overlay);
    assert!(!artifact.features.ambience);
    let plan = h.last_plan();
    assert!(!plan.has_node_kind("audio_mix"));
    assert!(plan.has_node_kind("overlay_composite"));
    assert!(matches!(plan.audio_out, StreamRef::Input { .. }));
}

#[tokio::test]
async fn short_narration_trims_visuals_and_keeps_narration_whole() {
    let h = Harness::new(2.0);
    h.service
        .render(&h.request(10, None, false), &h.out_dir.join("short.mp4"))
        .await
        .expect("render should succeed");

    let plan = h.last_plan();
    assert_eq!(plan.output_secs, 2.0);
    let narration = plan
        .input_index(InputRole::Narration)
        .expect("narration input");
    assert_eq!(plan.audio_out, StreamRef::audio(narration));
    match plan.node("visual") {
        Some(storyreel_render_engine::Node::PadTrim(node)) => {
            assert_eq!(node.duration_secs, 2.0)
        }
        other => panic!("expected visual pad/trim, got {other:?}"),
    }
}

#[tokio::test]
async fn end_card_dropped_when_narration_too_short() {
    let h = Harness::new(2.5);
    let artifact = h
        .service
        .render(&h.request(2, None, true), &h.out_dir.join("card.mp4"))
        .await
        .expect("render should succeed");

    assert!(!artifact.features.end_card);
    assert!(h.last_plan().input_index(InputRole::EndCard).is_none());
}

#[tokio::test]
async fn end_card_used_when_requested() {
    let h = Harness::new(15.0);
    let artifact = h
        .service
        .render(&h.request(3, None, true), &h.out_dir.join("card.mp4"))
        .await
        .expect("render should succeed");

    assert!(artifact.features.end_card);
    let plan = h.last_plan();
    assert!(plan.input_index(InputRole::EndCard).is_some());
    assert!(plan.node("card").is_some());
}

#[tokio::test]
async fn second_job_is_rejected_while_busy() {
    let h = Harness::new(18.0);
    let _held = h.service.gate().try_admit().expect("first admission");

    let err = h
        .service
        .render(&h.request(2, None, false), &h.out_dir.join("busy.mp4"))
        .await
        .expect_err("gate is held");
    assert_eq!(err.kind(), "Busy");
    assert_eq!(err.status_code(), 503);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn broken_image_fails_the_job() {
    let h = Harness::new(18.0);
    std::fs::write(h.uploads.join("photo-1.png"), b"not an image").unwrap();

    let err = h
        .service
        .render(&h.request(3, None, false), &h.out_dir.join("broken.mp4"))
        .await
        .expect_err("images are required");
    assert_eq!(err.kind(), "AssetInvalid");
    assert!(err.is_client_error());
    assert_eq!(
        h.sink.statuses.lock().unwrap().last().map(String::as_str),
        Some("failed")
    );
}

#[tokio::test]
async fn local_narration_outside_upload_roots_is_refused() {
    let h = Harness::new(18.0);
    let library = h.uploads.parent().expect("harness root").join("library");
    let mut request = h.request(3, None, false);
    request.narration_audio = Some(library.join("ambience/rain.mp3").display().to_string());

    let err = h
        .service
        .render(&request, &h.out_dir.join("video.mp4"))
        .await
        .expect_err("library files are not uploads");

    assert_eq!(err.kind(), "AssetFetchFailed");
    assert!(h.engine.plans.lock().unwrap().is_empty());
    assert!(!h.out_dir.join("video.mp4").exists());
}

#[tokio::test]
async fn default_crossfade_render_covers_the_narration_without_padding() {
    let h = Harness::new(18.0);
    h.service
        .render(&h.request(6, None, false), &h.out_dir.join("story.mp4"))
        .await
        .expect("render should succeed");

    let plan = h.last_plan();
    assert!(plan.features.crossfade);
    match plan.node("visual") {
        Some(storyreel_render_engine::Node::PadTrim(node)) => {
            assert_eq!(node.pad_secs, 0.0);
            assert_eq!(node.duration_secs, 18.0);
        }
        other => panic!("expected visual pad/trim, got {other:?}"),
    }
}
