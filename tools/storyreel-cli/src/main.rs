//! StoryReel CLI: render and inspect narrated slideshows.
//!
//! Usage:
//!   storyreel render <REQUEST> -o <OUT>   Render a request to video
//!   storyreel plan <REQUEST>              Show timeline and engine commands per ladder rung
//!   storyreel themes <THEME>              Show how a theme resolves
//!   storyreel check                       Check engine and config

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storyreel_common::config::{config_file_path, AppConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "storyreel",
    about = "Narrated slideshow renderer with graceful degradation",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a request JSON file to video
    Render {
        /// Path to the request JSON
        request: PathBuf,

        /// Output video path
        #[arg(short, long, default_value = "output.mp4")]
        output: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Directory local request images and narration may be read from
        /// (repeatable; added to `assets.upload_roots`)
        #[arg(long = "upload-root", value_name = "DIR")]
        upload_roots: Vec<PathBuf>,
    },

    /// Plan a request without fetching assets or running the engine
    Plan {
        /// Path to the request JSON
        request: PathBuf,

        /// Narration length to plan for (seconds)
        #[arg(long)]
        narration_secs: f64,
    },

    /// Show the rule and candidates a theme resolves to
    Themes {
        /// Free-text theme
        theme: String,

        /// Job id used for candidate ordering
        #[arg(long, default_value = "preview")]
        job_id: String,
    },

    /// Check engine availability and configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config_file_path);
    let mut config = AppConfig::load_from(&config_path);
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    storyreel_common::logging::init_logging(&config.logging);
    tracing::debug!(config = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::Render {
            request,
            output,
            json,
            upload_roots,
        } => {
            config.assets.upload_roots.extend(upload_roots);
            commands::render::run(config, request, output, json).await
        }
        Commands::Plan {
            request,
            narration_secs,
        } => commands::plan::run(config, request, narration_secs),
        Commands::Themes { theme, job_id } => commands::themes::run(config, theme, job_id),
        Commands::Check => commands::check::run(config, config_path).await,
    }
}
