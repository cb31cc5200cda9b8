//! Render a request to video.

use std::path::PathBuf;

use storyreel_common::config::AppConfig;
use storyreel_render_engine::RenderService;

pub async fn run(
    config: AppConfig,
    request: PathBuf,
    output: PathBuf,
    json: bool,
) -> anyhow::Result<()> {
    let request = super::load_request(&request)?;
    let service = RenderService::from_config(config)?;

    if !service.engine().is_available().await {
        anyhow::bail!(
            "Render engine '{}' not found (set render.ffmpeg_path or STORYREEL_FFMPEG)",
            service.config().render.ffmpeg_path
        );
    }

    if !json {
        println!("Rendering job {}", request.job_id.as_deref().unwrap_or("<missing>"));
        println!("  Output: {}", output.display());
    }

    let artifact = match service.render(&request, &output).await {
        Ok(artifact) => artifact,
        Err(e) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "failed",
                        "kind": e.kind(),
                        "code": e.status_code(),
                        "message": e.to_string(),
                    })
                );
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        return Ok(());
    }

    for attempt in &artifact.attempts {
        println!(
            "  [{}] {:<12} {:<40} {} ms",
            attempt.outcome.label(),
            attempt.rung,
            attempt.features.to_string(),
            attempt.elapsed_ms
        );
        if let Some(diagnostic) = attempt.outcome.diagnostic() {
            for line in diagnostic.lines().take(3) {
                println!("      {line}");
            }
        }
    }
    println!(
        "Render complete: {} ({} bytes, {:.2}s, features: {})",
        artifact.path.display(),
        artifact.bytes,
        artifact.duration_secs,
        artifact.features
    );

    Ok(())
}
