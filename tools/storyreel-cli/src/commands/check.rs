//! Check engine availability and configuration.

use std::path::PathBuf;

use storyreel_assets::FfprobeProbe;
use storyreel_common::config::AppConfig;
use storyreel_render_engine::{FfmpegEngine, RenderEngine};

pub async fn run(config: AppConfig, config_path: PathBuf) -> anyhow::Result<()> {
    println!("StoryReel System Check");
    println!("{}", "=".repeat(50));

    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[WARN] Config: {} not found, using defaults", config_path.display());
    }

    let engine = FfmpegEngine::from_config(&config.render);
    let engine_ok = engine.is_available().await;
    if engine_ok {
        println!(
            "[OK] Engine: {} ({})",
            config.render.ffmpeg_path,
            engine.serializer().dialect().as_str()
        );
    } else {
        println!("[FAIL] Engine: {} not runnable", config.render.ffmpeg_path);
    }

    let probe_ok = FfprobeProbe::new(config.render.ffprobe_path.clone()).is_available();
    if probe_ok {
        println!("[OK] Probe: {}", config.render.ffprobe_path);
    } else {
        println!("[FAIL] Probe: {} not runnable", config.render.ffprobe_path);
    }

    println!("[OK] Asset base: {}", config.assets.asset_base);
    match &config.assets.theme_rules_path {
        Some(path) => match super::load_theme_table(&config) {
            Ok(table) => println!("[OK] Theme rules: {} ({} rules)", path.display(), table.rules.len()),
            Err(e) => println!("[FAIL] Theme rules: {e}"),
        },
        None => println!("[OK] Theme rules: built-in"),
    }
    for (aspect, res) in &config.canvas {
        println!("     canvas {aspect}: {}x{}", res.width, res.height);
    }

    println!();
    if engine_ok && probe_ok {
        println!("Engine and probe are available. StoryReel is ready.");
    } else {
        println!("Some required tools are missing. See above for fixes.");
    }

    Ok(())
}
