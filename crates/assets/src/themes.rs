//! Theme rule table.
//!
//! Maps a free-text theme to ordered candidate lists for ambience and
//! overlay. Rules are data; matching is exact-name first, then keyword
//! containment in rule order, then the default bucket.

use std::path::Path;

use serde::{Deserialize, Serialize};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_job_model::MediaKind;

/// One named theme and its candidate assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRule {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub ambience: Vec<String>,
    #[serde(default)]
    pub overlay: Vec<String>,
}

impl ThemeRule {
    fn new(name: &str, keywords: &[&str], ambience: &[&str], overlay: &[&str]) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            name: name.to_string(),
            keywords: owned(keywords),
            ambience: owned(ambience),
            overlay: owned(overlay),
        }
    }

    /// Candidate asset ids for a kind; empty for kinds themes don't cover.
    pub fn candidates(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Ambience => &self.ambience,
            MediaKind::Overlay => &self.overlay,
            _ => &[],
        }
    }
}

/// How a theme was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Keyword,
    Default,
}

/// Result of matching a theme against the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeMatch<'a> {
    pub rule: &'a ThemeRule,
    pub how: MatchKind,
}

/// Ordered theme rules plus a default bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRuleTable {
    pub rules: Vec<ThemeRule>,
    pub default: ThemeRule,
}

impl Default for ThemeRuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThemeRuleTable {
    /// The rule table shipped with the renderer.
    pub fn builtin() -> Self {
        let rules = vec![
            ThemeRule::new(
                "rain",
                &["rain", "storm", "drizzle", "monsoon", "thunder"],
                &["ambience/rain-light.mp3", "ambience/rain-heavy.mp3"],
                &["overlay/rain-streaks.mp4"],
            ),
            ThemeRule::new(
                "night",
                &["night", "moon", "star", "midnight", "dream"],
                &["ambience/night-crickets.mp3"],
                &["overlay/starfield.mp4"],
            ),
            ThemeRule::new(
                "ocean",
                &["ocean", "sea", "beach", "wave", "coast", "island"],
                &["ambience/ocean-waves.mp3", "ambience/seagulls.mp3"],
                &["overlay/light-leaks.mp4"],
            ),
            ThemeRule::new(
                "forest",
                &["forest", "nature", "wood", "jungle", "garden"],
                &["ambience/forest-birds.mp3", "ambience/wind-leaves.mp3"],
                &["overlay/dust-motes.mp4"],
            ),
            ThemeRule::new(
                "city",
                &["city", "urban", "street", "traffic", "downtown"],
                &["ambience/city-traffic.mp3", "ambience/cafe-murmur.mp3"],
                &["overlay/film-grain.mp4"],
            ),
            ThemeRule::new(
                "vintage",
                &["vintage", "retro", "memory", "memories", "nostalgia"],
                &["ambience/vinyl-crackle.mp3"],
                &["overlay/film-grain.mp4", "overlay/dust-scratches.mp4"],
            ),
            ThemeRule::new(
                "winter",
                &["winter", "snow", "christmas", "frost"],
                &["ambience/winter-wind.mp3"],
                &["overlay/snowfall.mp4"],
            ),
            ThemeRule::new(
                "cozy",
                &["cozy", "fire", "campfire", "fireplace", "warm"],
                &["ambience/fireplace.mp3"],
                &["overlay/embers.mp4"],
            ),
        ];

        Self {
            rules,
            default: ThemeRule::new("default", &[], &["ambience/soft-room.mp3"], &[]),
        }
    }

    /// Load a rule table from a JSON file.
    pub fn load(path: &Path) -> StoryreelResult<Self> {
        if !path.exists() {
            return Err(StoryreelError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let table: Self = serde_json::from_str(&content).map_err(|e| {
            StoryreelError::config(format!("invalid theme rules {}: {e}", path.display()))
        })?;
        Ok(table)
    }

    /// Match a theme. Absent or blank themes get the default bucket.
    pub fn match_theme(&self, theme: Option<&str>) -> ThemeMatch<'_> {
        let normalized = theme.map(normalize_theme).unwrap_or_default();
        if normalized.is_empty() {
            return self.default_match();
        }

        if let Some(rule) = self.rules.iter().find(|r| normalize_theme(&r.name) == normalized) {
            return ThemeMatch {
                rule,
                how: MatchKind::Exact,
            };
        }

        let keyword_hit = self.rules.iter().find(|r| {
            r.keywords
                .iter()
                .map(|k| normalize_theme(k))
                .any(|k| !k.is_empty() && normalized.contains(&k))
        });
        if let Some(rule) = keyword_hit {
            return ThemeMatch {
                rule,
                how: MatchKind::Keyword,
            };
        }

        self.default_match()
    }

    fn default_match(&self) -> ThemeMatch<'_> {
        ThemeMatch {
            rule: &self.default,
            how: MatchKind::Default,
        }
    }

    /// Candidates for a job in deterministic per-job order.
    ///
    /// The list starts at `fnv1a64(job_id:kind) % len` and wraps around, so a
    /// job always sees the same order while different jobs spread across the
    /// pool.
    pub fn ordered_candidates(
        &self,
        job_id: &str,
        theme: Option<&str>,
        kind: MediaKind,
    ) -> Vec<String> {
        let candidates = self.match_theme(theme).rule.candidates(kind);
        rotate_for_job(candidates, job_id, kind)
    }
}

fn rotate_for_job(candidates: &[String], job_id: &str, kind: MediaKind) -> Vec<String> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let seed = fnv1a64(format!("{job_id}:{}", kind.as_str()).as_bytes());
    let start = (seed % candidates.len() as u64) as usize;
    candidates[start..]
        .iter()
        .chain(candidates[..start].iter())
        .cloned()
        .collect()
}

/// Lowercase, trim, and collapse internal whitespace.
pub fn normalize_theme(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 64-bit FNV-1a.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
