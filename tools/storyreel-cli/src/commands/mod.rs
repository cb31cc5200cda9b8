pub mod check;
pub mod plan;
pub mod render;
pub mod themes;

use std::path::Path;

use storyreel_assets::ThemeRuleTable;
use storyreel_common::config::AppConfig;
use storyreel_job_model::RenderRequest;

pub(crate) fn load_request(path: &Path) -> anyhow::Result<RenderRequest> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read request {}: {e}", path.display()))?;
    RenderRequest::from_json(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid request {}: {e}", path.display()))
}

pub(crate) fn load_theme_table(config: &AppConfig) -> anyhow::Result<ThemeRuleTable> {
    match &config.assets.theme_rules_path {
        Some(path) => Ok(ThemeRuleTable::load(path)?),
        None => Ok(ThemeRuleTable::builtin()),
    }
}
