use serde::{Deserialize, Serialize};
use std::path::Path;
use timeline::{coords, DEFAULT_HISTORY_DEPTH};

use crate::{Result, StudioError};

/// Session tunables, read from a camelCase JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudioConfig {
    pub pixels_per_second: f64,
    pub min_pixels_per_second: f64,
    pub max_pixels_per_second: f64,
    pub history_depth: usize,
    /// Distance from a viewport edge that starts drag auto-scroll, in px.
    pub auto_scroll_margin: f64,
    /// Pixels scrolled per animation frame.
    pub auto_scroll_speed: f64,
    pub width_increment: f64,
    pub min_timeline_width: f64,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            pixels_per_second: coords::DEFAULT_PIXELS_PER_SECOND,
            min_pixels_per_second: coords::MIN_PIXELS_PER_SECOND,
            max_pixels_per_second: coords::MAX_PIXELS_PER_SECOND,
            history_depth: DEFAULT_HISTORY_DEPTH,
            auto_scroll_margin: 50.0,
            auto_scroll_speed: 10.0,
            width_increment: 500.0,
            min_timeline_width: 1200.0,
        }
    }
}

impl StudioConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: StudioConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("pixelsPerSecond", self.pixels_per_second),
            ("minPixelsPerSecond", self.min_pixels_per_second),
            ("maxPixelsPerSecond", self.max_pixels_per_second),
            ("widthIncrement", self.width_increment),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(StudioError::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.min_pixels_per_second > self.max_pixels_per_second {
            return Err(StudioError::InvalidConfig(
                "minPixelsPerSecond exceeds maxPixelsPerSecond".to_string(),
            ));
        }
        if self.pixels_per_second < self.min_pixels_per_second || self.pixels_per_second > self.max_pixels_per_second {
            return Err(StudioError::InvalidConfig(format!(
                "pixelsPerSecond {} outside [{}, {}]",
                self.pixels_per_second, self.min_pixels_per_second, self.max_pixels_per_second
            )));
        }
        if self.history_depth == 0 {
            return Err(StudioError::InvalidConfig("historyDepth must be at least 1".to_string()));
        }
        if self.auto_scroll_margin < 0.0 || self.auto_scroll_speed < 0.0 || self.min_timeline_width < 0.0 {
            return Err(StudioError::InvalidConfig(
                "auto-scroll and width settings must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = StudioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_depth, 50);
        assert_eq!(config.pixels_per_second, 100.0);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"historyDepth": 10, "autoScrollMargin": 80}}"#).unwrap();

        let config = StudioConfig::load(file.path()).unwrap();
        assert_eq!(config.history_depth, 10);
        assert_eq!(config.auto_scroll_margin, 80.0);
        assert_eq!(config.width_increment, 500.0);
    }

    #[test]
    fn test_rejects_inverted_zoom_bounds() {
        let config = StudioConfig {
            min_pixels_per_second: 500.0,
            ..StudioConfig::default()
        };
        assert!(matches!(config.validate(), Err(StudioError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StudioConfig::load_or_default(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, StudioConfig::default());
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(StudioConfig::load(file.path()), Err(StudioError::ConfigParse(_))));
    }
}
