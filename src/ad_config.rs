use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Position of the preroll break.
pub const PREROLL: f64 = 0.0;

/// Position of the postroll break.
pub const POSTROLL: f64 = -1.0;

// --- Ad references ---

/// A single ad as named in configuration. The creative itself is fetched
/// and rendered by the ad plugin controller, never by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRef {
    pub id: String,
    /// Ad tag or creative URI handed to the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl AdRef {
    pub fn new(id: impl Into<String>) -> Self {
        AdRef {
            id: id.into(),
            uri: None,
        }
    }

    pub fn with_uri(id: impl Into<String>, uri: impl Into<String>) -> Self {
        AdRef {
            id: id.into(),
            uri: Some(uri.into()),
        }
    }
}

// --- Break kinds ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakKind {
    Preroll,
    Midroll,
    Postroll,
}

impl BreakKind {
    /// Classify a break position: `0` = preroll, `-1` = postroll, `> 0` = midroll.
    pub fn from_position(position: f64) -> Self {
        if position == POSTROLL {
            BreakKind::Postroll
        } else if position == PREROLL {
            BreakKind::Preroll
        } else {
            BreakKind::Midroll
        }
    }
}

impl fmt::Display for BreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakKind::Preroll => write!(f, "preroll"),
            BreakKind::Midroll => write!(f, "midroll"),
            BreakKind::Postroll => write!(f, "postroll"),
        }
    }
}

// --- Configuration ---

/// One ad break as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdBreakConfig {
    /// Seconds into the content; `0` = preroll, `-1` = postroll.
    pub position: f64,
    #[serde(default)]
    pub ads: Vec<AdRef>,
}

/// Ad configuration exposed by the playback source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdScheduleConfig {
    #[serde(default)]
    pub breaks: Vec<AdBreakConfig>,
    /// Playback resumes past this point; breaks in `[0, play_ads_after_time]`
    /// are treated as already played. Absent = nothing is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_ads_after_time: Option<f64>,
}

impl AdScheduleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper to append a break.
    pub fn with_break(mut self, position: f64, ads: Vec<AdRef>) -> Self {
        self.breaks.push(AdBreakConfig { position, ads });
        self
    }

    pub fn with_play_ads_after(mut self, seconds: f64) -> Self {
        self.play_ads_after_time = Some(seconds);
        self
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: AdScheduleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data)
    }

    /// Persist configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject positions that are neither `0`, `-1`, nor a positive number
    /// of seconds, and non-finite thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for b in &self.breaks {
            let valid = b.position.is_finite() && (b.position >= 0.0 || b.position == POSTROLL);
            if !valid {
                return Err(ConfigError::InvalidPosition(b.position));
            }
        }
        match self.play_ads_after_time {
            Some(t) if !t.is_finite() => Err(ConfigError::InvalidThreshold(t)),
            _ => Ok(()),
        }
    }

    /// Build the configured break list for a playback session.
    ///
    /// Breaks are sorted ascending by position (so a postroll sorts first)
    /// and duplicate positions keep their first occurrence.
    pub fn ingest(&self) -> Vec<ConfiguredAdBreak> {
        let mut breaks: Vec<ConfiguredAdBreak> = self
            .breaks
            .iter()
            .map(|b| ConfiguredAdBreak {
                position: b.position,
                ads: b.ads.clone(),
                played: self.skips(b.position),
            })
            .collect();
        breaks.sort_by(|a, b| a.position.total_cmp(&b.position));
        breaks.dedup_by(|later, earlier| later.position == earlier.position);
        breaks
    }

    fn skips(&self, position: f64) -> bool {
        self.play_ads_after_time
            .is_some_and(|after| position >= 0.0 && position <= after)
    }
}

// --- Session state ---

/// A configured break for the current session. Only `played` changes, and
/// only from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfiguredAdBreak {
    position: f64,
    ads: Vec<AdRef>,
    played: bool,
}

impl ConfiguredAdBreak {
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn ads(&self) -> &[AdRef] {
        &self.ads
    }

    pub fn is_played(&self) -> bool {
        self.played
    }

    pub fn kind(&self) -> BreakKind {
        BreakKind::from_position(self.position)
    }

    pub(crate) fn mark_played(&mut self) {
        self.played = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ads(ids: &[&str]) -> Vec<AdRef> {
        ids.iter().map(|id| AdRef::new(*id)).collect()
    }

    #[test]
    fn break_kind_from_position() {
        assert_eq!(BreakKind::from_position(0.0), BreakKind::Preroll);
        assert_eq!(BreakKind::from_position(-1.0), BreakKind::Postroll);
        assert_eq!(BreakKind::from_position(12.5), BreakKind::Midroll);
        assert_eq!(BreakKind::Midroll.to_string(), "midroll");
    }

    #[test]
    fn ingest_sorts_ascending() {
        let config = AdScheduleConfig::new()
            .with_break(20.0, ads(&["c"]))
            .with_break(-1.0, ads(&["d"]))
            .with_break(0.0, ads(&["a"]))
            .with_break(10.0, ads(&["b"]));
        let positions: Vec<f64> = config.ingest().iter().map(|b| b.position()).collect();
        assert_eq!(positions, vec![-1.0, 0.0, 10.0, 20.0]);
    }

    #[test]
    fn ingest_preplays_breaks_before_resume_point() {
        let config = AdScheduleConfig::new()
            .with_break(0.0, ads(&["a"]))
            .with_break(10.0, ads(&["b"]))
            .with_break(20.0, ads(&["c"]))
            .with_break(-1.0, ads(&["d"]))
            .with_play_ads_after(5.0);
        let breaks = config.ingest();
        let played: Vec<(f64, bool)> = breaks.iter().map(|b| (b.position(), b.is_played())).collect();
        assert_eq!(
            played,
            vec![(-1.0, false), (0.0, true), (10.0, false), (20.0, false)]
        );
    }

    #[test]
    fn ingest_without_threshold_plays_nothing() {
        let config = AdScheduleConfig::new()
            .with_break(0.0, ads(&["a"]))
            .with_break(5.0, ads(&["b"]));
        assert!(config.ingest().iter().all(|b| !b.is_played()));
    }

    #[test]
    fn ingest_threshold_is_inclusive() {
        let config = AdScheduleConfig::new()
            .with_break(10.0, ads(&["a"]))
            .with_play_ads_after(10.0);
        assert!(config.ingest()[0].is_played());
    }

    #[test]
    fn ingest_collapses_duplicate_positions() {
        let config = AdScheduleConfig::new()
            .with_break(10.0, ads(&["first"]))
            .with_break(10.0, ads(&["second"]));
        let breaks = config.ingest();
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].ads()[0].id, "first");
    }

    #[test]
    fn from_json_applies_defaults() {
        let config = AdScheduleConfig::from_json(r#"{"breaks":[{"position":0}]}"#).unwrap();
        assert_eq!(config.breaks.len(), 1);
        assert!(config.breaks[0].ads.is_empty());
        assert!(config.play_ads_after_time.is_none());

        let empty = AdScheduleConfig::from_json("{}").unwrap();
        assert!(empty.breaks.is_empty());
    }

    #[test]
    fn from_json_rejects_bad_positions() {
        let err = AdScheduleConfig::from_json(r#"{"breaks":[{"position":-5}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPosition(p) if p == -5.0));
        assert!(AdScheduleConfig::from_json("not json").is_err());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ads.json");
        let config = AdScheduleConfig::new()
            .with_break(0.0, vec![AdRef::with_uri("pre", "https://ads.example/pre.xml")])
            .with_break(-1.0, ads(&["post"]))
            .with_play_ads_after(3.0);
        config.save(&path).unwrap();
        let loaded = AdScheduleConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = AdScheduleConfig::load(Path::new("does-not-exist.json")).unwrap_err();
        assert!(err.to_string().contains("does-not-exist.json"));
    }
}
