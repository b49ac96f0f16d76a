//! Engine configuration loaded from TOML

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::curriculum::DEFAULT_TOTAL_LEARNING_HOURS;
use crate::error::{Error, Result};
use crate::hover::{ChartArea, DEFAULT_PROXIMITY_PX};
use crate::models::Visibility;
use crate::scroll_spy::{DEFAULT_HYSTERESIS, MAX_HYSTERESIS};

pub const CONFIG_ENV_VAR: &str = "CAREER_PROGRESS_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound of the hours axis.
    pub total_learning_hours: f64,
    /// Maximum vertical distance between pointer and line for a tooltip.
    pub proximity_px: f64,
    pub chart_width: f64,
    pub chart_height: f64,
    /// Delay before a scrolled-to section becomes active.
    pub hysteresis_ms: u64,
    /// Include draft posts (preview roles).
    pub preview: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            total_learning_hours: DEFAULT_TOTAL_LEARNING_HOURS,
            proximity_px: DEFAULT_PROXIMITY_PX,
            chart_width: 800.0,
            chart_height: 400.0,
            hysteresis_ms: DEFAULT_HYSTERESIS.as_millis() as u64,
            preview: false,
        }
    }
}

impl EngineConfig {
    /// Resolution order: explicit path, then `CAREER_PROGRESS_CONFIG`, then defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.total_learning_hours.is_finite() && self.total_learning_hours > 0.0) {
            return Err(Error::Config(
                "total_learning_hours must be a positive number".to_string(),
            ));
        }
        if !(self.proximity_px.is_finite() && self.proximity_px >= 0.0) {
            return Err(Error::Config("proximity_px must not be negative".to_string()));
        }
        if self.chart_width <= 0.0 || self.chart_height <= 0.0 {
            return Err(Error::Config("chart dimensions must be positive".to_string()));
        }
        if self.hysteresis() > MAX_HYSTERESIS {
            return Err(Error::Config(format!(
                "hysteresis_ms must be at most {}",
                MAX_HYSTERESIS.as_millis()
            )));
        }
        Ok(())
    }

    pub fn chart(&self) -> ChartArea {
        ChartArea {
            width: self.chart_width,
            height: self.chart_height,
            proximity_px: self.proximity_px,
        }
    }

    pub fn hysteresis(&self) -> Duration {
        Duration::from_millis(self.hysteresis_ms)
    }

    pub fn visibility(&self) -> Visibility {
        if self.preview {
            Visibility::Preview
        } else {
            Visibility::Learner
        }
    }
}
