//! Show how a theme resolves.

use storyreel_assets::themes::{normalize_theme, MatchKind};
use storyreel_common::config::AppConfig;
use storyreel_job_model::MediaKind;

pub fn run(config: AppConfig, theme: String, job_id: String) -> anyhow::Result<()> {
    let table = super::load_theme_table(&config)?;
    let matched = table.match_theme(Some(&theme));

    println!("Theme: \"{}\" (normalized: \"{}\")", theme, normalize_theme(&theme));
    let how = match matched.how {
        MatchKind::Exact => "exact name",
        MatchKind::Keyword => "keyword",
        MatchKind::Default => "no match, default bucket",
    };
    println!("Rule:  {} ({how})", matched.rule.name);

    for (kind, fallback) in [
        (MediaKind::Ambience, &config.assets.default_ambience),
        (MediaKind::Overlay, &config.assets.default_overlay),
    ] {
        let ordered = table.ordered_candidates(&job_id, Some(&theme), kind);
        println!();
        println!("{kind} candidates for job {job_id}:");
        if ordered.is_empty() {
            println!("  (none)");
        }
        for (i, id) in ordered.iter().enumerate() {
            println!("  {}. {id}", i + 1);
        }
        if let Some(default) = fallback.as_ref().filter(|d| !ordered.contains(*d)) {
            println!("  then default: {default}");
        }
    }

    Ok(())
}
