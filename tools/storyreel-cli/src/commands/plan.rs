//! Show the timeline and engine invocation for each ladder rung.
//!
//! Nothing is fetched or probed: locators stand in for local paths and the
//! first theme candidate is assumed to resolve.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_common::config::AppConfig;
use storyreel_job_model::{
    FeatureSet, JobAssets, JobSpec, MediaKind, MediaRef, OptionalAssets, Timeline,
    ValidatedAsset,
};
use storyreel_planner::TimelinePlanner;
use storyreel_render_engine::{DegradationController, FfmpegEngine, PlanBuilder};

use super::{load_request, load_theme_table};

pub fn run(
    config: AppConfig,
    request: PathBuf,
    narration_secs: f64,
) -> anyhow::Result<()> {
    if !(narration_secs.is_finite() && narration_secs > 0.0) {
        anyhow::bail!("--narration-secs must be positive, got {narration_secs}");
    }

    let spec = load_request(&request)?.validate()?;
    let assets = stand_in_assets(&config, &spec, narration_secs)?;

    let end_card_secs = config.timeline.end_card_secs;
    let available = FeatureSet {
        overlay: assets.optional.overlay.is_some(),
        ambience: assets.optional.ambience.is_some(),
        end_card: assets.optional.end_card.is_some() && narration_secs > end_card_secs,
        crossfade: config.timeline.crossfade,
        motion: true,
    };

    let engine = Arc::new(FfmpegEngine::from_config(&config.render));
    let serializer = engine.serializer().clone();
    let controller = DegradationController::new(
        TimelinePlanner::from_config(&config.timeline),
        PlanBuilder::for_aspect(spec.aspect_ratio.as_str(), &config)?,
        engine,
        end_card_secs,
    );

    println!(
        "Job {} ({}, {} images, narration {:.2}s)",
        spec.job_id,
        spec.aspect_ratio,
        spec.images.len(),
        narration_secs
    );
    println!("Available features: {available}");

    let output = Path::new("output.mp4");
    for (i, preview) in controller.preview(&assets, available)?.iter().enumerate() {
        println!();
        println!(
            "Rung {} [{}]: {}",
            i + 1,
            preview.rung.name,
            preview.plan.features
        );
        print_timeline(&preview.timeline);
        println!("  Graph nodes: {}", preview.plan.nodes.len());
        println!("  Command:");
        println!("    {}", config.render.ffmpeg_path);
        for arg in serializer.to_args(&preview.plan, output) {
            println!("      {arg}");
        }
    }

    Ok(())
}

fn print_timeline(timeline: &Timeline) {
    println!(
        "  Timeline: {} scenes x {:.2}s, crossfade {:.2}s, story {:.2}s, output {:.2}s",
        timeline.scenes.len(),
        timeline.scene_secs,
        timeline.crossfade_secs,
        timeline.story_secs,
        timeline.output_secs
    );
    for scene in &timeline.scenes {
        println!(
            "    #{:<3} at {:>7.2}s for {:.2}s ({})",
            scene.index,
            scene.offset_secs,
            scene.duration_secs,
            scene.motion.as_str()
        );
    }
    if let Some(card) = &timeline.end_card {
        println!(
            "    end card at {:>7.2}s for {:.2}s",
            card.offset_secs, card.duration_secs
        );
    }
}

fn stand_in_assets(
    config: &AppConfig,
    spec: &JobSpec,
    narration_secs: f64,
) -> anyhow::Result<JobAssets> {
    let stand_in = |kind: MediaKind, locator: &str, secs: Option<f64>| {
        ValidatedAsset::new(
            MediaRef::new(kind, locator),
            PathBuf::from(locator),
            secs,
            None,
        )
    };

    let table = load_theme_table(config)?;
    let first_candidate = |kind: MediaKind, fallback: &Option<String>| {
        table
            .ordered_candidates(&spec.job_id, spec.theme.as_deref(), kind)
            .into_iter()
            .next()
            .or_else(|| fallback.clone())
            .map(|id| stand_in(kind, &id, None))
    };

    let end_card = if spec.use_end_card {
        config
            .assets
            .end_card
            .as_deref()
            .map(|id| stand_in(MediaKind::EndCard, id, None))
    } else {
        None
    };

    Ok(JobAssets {
        images: spec
            .images
            .iter()
            .map(|image| stand_in(MediaKind::Image, &image.locator, None))
            .collect(),
        narration: stand_in(
            MediaKind::Narration,
            &spec.narration.locator,
            Some(narration_secs),
        ),
        optional: OptionalAssets {
            ambience: first_candidate(MediaKind::Ambience, &config.assets.default_ambience),
            overlay: first_candidate(MediaKind::Overlay, &config.assets.default_overlay),
            end_card,
        },
    })
}
