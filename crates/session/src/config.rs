use std::path::Path;

use layers::heatmap::HeatmapConfig;
use layers::markers::RetentionPolicy;
use serde::{Deserialize, Serialize};
use viewstate::{PersistedView, VIEW_STATE_TTL_DAYS};

use crate::dispatcher::CompletionOrder;

pub const DEFAULT_FEED_URL: &str = "http://localhost/nuke/nuke_request.php";
/// Longest accepted view-state lifetime, about a century.
pub const MAX_STATE_TTL_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config read failed: {msg}"),
            ConfigError::Parse(msg) => write!(f, "config parse failed: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub feed_url: String,
    /// Used when neither the page query nor the persisted state say otherwise.
    pub default_view: PersistedView,
    pub width_px: u32,
    pub height_px: u32,
    pub retention: RetentionPolicy,
    pub completion: CompletionOrder,
    pub heatmap: HeatmapConfig,
    pub state_ttl_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            default_view: PersistedView::new(2.76, 46.88, 6),
            width_px: 1024,
            height_px: 768,
            retention: RetentionPolicy::default(),
            completion: CompletionOrder::default(),
            heatmap: HeatmapConfig::default(),
            state_ttl_days: VIEW_STATE_TTL_DAYS,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Apply `NUKEMAP_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `NUKEMAP_*` overrides from `lookup`. Unset keys keep their value;
    /// set but unparsable ones are an error.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("NUKEMAP_FEED_URL") {
            self.feed_url = v;
        }
        override_parsed(&lookup, "NUKEMAP_DEFAULT_LON", &mut self.default_view.lon)?;
        override_parsed(&lookup, "NUKEMAP_DEFAULT_LAT", &mut self.default_view.lat)?;
        override_parsed(&lookup, "NUKEMAP_DEFAULT_ZOOM", &mut self.default_view.zoom)?;
        override_parsed(&lookup, "NUKEMAP_WIDTH", &mut self.width_px)?;
        override_parsed(&lookup, "NUKEMAP_HEIGHT", &mut self.height_px)?;
        override_parsed(&lookup, "NUKEMAP_HEAT_RADIUS_M", &mut self.heatmap.radius_m)?;
        override_parsed(&lookup, "NUKEMAP_STATE_TTL_DAYS", &mut self.state_ttl_days)?;
        if let Some(v) = lookup("NUKEMAP_RETENTION") {
            self.retention = parse_tag(&v, "NUKEMAP_RETENTION")?;
        }
        if let Some(v) = lookup("NUKEMAP_COMPLETION") {
            self.completion = parse_tag(&v, "NUKEMAP_COMPLETION")?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width_px == 0 || self.height_px == 0 {
            return Err(ConfigError::Invalid("viewport size must be non-zero".into()));
        }
        if self.default_view.zoom >= foundation::math::ZOOM_LEVELS {
            return Err(ConfigError::Invalid(format!(
                "default zoom {} out of range",
                self.default_view.zoom
            )));
        }
        if self.heatmap.min_zoom > self.heatmap.max_zoom {
            return Err(ConfigError::Invalid("heatmap min_zoom > max_zoom".into()));
        }
        if !(self.heatmap.radius_m.is_finite() && self.heatmap.radius_m >= 0.0) {
            return Err(ConfigError::Invalid("heatmap radius_m must be >= 0".into()));
        }
        if !(1..=MAX_STATE_TTL_DAYS).contains(&self.state_ttl_days) {
            return Err(ConfigError::Invalid(format!(
                "state_ttl_days must be within 1..={MAX_STATE_TTL_DAYS}"
            )));
        }
        Ok(())
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(());
    };
    *slot = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}={raw}")))?;
    Ok(())
}

/// Parse a serde unit-variant tag such as `zoom_out`.
fn parse_tag<T: serde::de::DeserializeOwned>(raw: &str, key: &str) -> Result<T, ConfigError> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_string()))
        .map_err(|_| ConfigError::Invalid(format!("{key}={raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn defaults_match_reference_configuration() {
        let c = SessionConfig::default();
        assert_eq!(c.default_view, PersistedView::new(2.76, 46.88, 6));
        assert_eq!(c.heatmap.radius_m, 100_000.0);
        assert_eq!((c.heatmap.min_zoom, c.heatmap.max_zoom), (4, 9));
        assert_eq!(c.retention, RetentionPolicy::ZoomOut);
        assert_eq!(c.completion, CompletionOrder::LastCompletedWins);
        assert_eq!(c.state_ttl_days, 30);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = SessionConfig::from_json_str(
            r#"{ "feed_url": "http://feed.test/q", "retention": "never",
                 "heatmap": { "max_zoom": 12 } }"#,
        )
        .unwrap();
        assert_eq!(c.feed_url, "http://feed.test/q");
        assert_eq!(c.retention, RetentionPolicy::Never);
        assert_eq!(c.heatmap.max_zoom, 12);
        assert_eq!(c.heatmap.min_zoom, 4);
        assert_eq!(c.width_px, 1024);
    }

    #[test]
    fn rejects_bad_json_and_bad_values() {
        assert!(matches!(
            SessionConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SessionConfig::from_json_str(r#"{ "width_px": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_json_str(r#"{ "heatmap": { "min_zoom": 10 } }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn state_ttl_is_bounded() {
        for raw in ["0", "-1", "36501", "9223372036854775807"] {
            let json = format!(r#"{{ "state_ttl_days": {raw} }}"#);
            assert!(
                matches!(SessionConfig::from_json_str(&json), Err(ConfigError::Invalid(_))),
                "ttl {raw}"
            );
        }
        let c = SessionConfig::from_json_str(r#"{ "state_ttl_days": 36500 }"#).unwrap();
        assert_eq!(c.state_ttl_days, MAX_STATE_TTL_DAYS);

        let mut c = SessionConfig::default();
        let err = c.apply_overrides(|k| {
            (k == "NUKEMAP_STATE_TTL_DAYS").then(|| "9223372036854775807".to_string())
        });
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_overrides() {
        let env: BTreeMap<&str, &str> = [
            ("NUKEMAP_FEED_URL", "http://other/feed"),
            ("NUKEMAP_DEFAULT_ZOOM", "8"),
            ("NUKEMAP_RETENTION", "zoom_in"),
            ("NUKEMAP_COMPLETION", "drop_superseded"),
        ]
        .into_iter()
        .collect();
        let mut c = SessionConfig::default();
        c.apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(c.feed_url, "http://other/feed");
        assert_eq!(c.default_view.zoom, 8);
        assert_eq!(c.retention, RetentionPolicy::ZoomIn);
        assert_eq!(c.completion, CompletionOrder::DropSuperseded);

        let err = c
            .apply_overrides(|k| (k == "NUKEMAP_WIDTH").then(|| "wide".to_string()))
            .unwrap_err();
        assert_eq!(err, ConfigError::Invalid("NUKEMAP_WIDTH=wide".into()));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nukemap.json");
        std::fs::write(&path, r#"{ "width_px": 640, "height_px": 480 }"#).unwrap();
        let c = SessionConfig::load(&path).unwrap();
        assert_eq!((c.width_px, c.height_px), (640, 480));
        assert!(matches!(
            SessionConfig::load(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
